use super::client::ContainerClient;
use crate::config::ResolvedConfig;
use crate::errors::{AppError, AppResult};
use crate::models::RemoteObjectRef;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use std::io::Cursor;
use tracing::info;

/// Name predicate applied after enumeration.
///
/// The deployments this replaces each hard-coded a different filter (keep
/// one extension, always drop spreadsheets, require a dot); here the policy
/// is explicit configuration. The default keeps everything.
#[derive(Debug, Clone, Default)]
pub struct ObjectFilter {
    /// Keep only names ending in `.{ext}` when set
    pub keep_extension: Option<String>,
    /// Drop names ending in `.{ext}` when set
    pub exclude_extension: Option<String>,
    /// Drop names containing no `.` at all
    pub require_dot: bool,
}

impl ObjectFilter {
    pub fn with_extension(ext: impl Into<String>) -> Self {
        Self {
            keep_extension: Some(ext.into()),
            ..Self::default()
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            keep_extension: config.keep_extension.clone(),
            exclude_extension: config.exclude_extension.clone(),
            require_dot: config.require_dot,
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        if self.require_dot && !name.contains('.') {
            return false;
        }
        if let Some(ext) = &self.exclude_extension {
            if name.ends_with(&format!(".{ext}")) {
                return false;
            }
        }
        if let Some(ext) = &self.keep_extension {
            if !name.ends_with(&format!(".{ext}")) {
                return false;
            }
        }
        true
    }
}

/// Enumerates all objects whose name starts with `prefix`, then applies the
/// filter predicate.
///
/// The prefix is passed through verbatim; a trailing separator is the
/// caller's responsibility. Ordering is whatever the store returns. The
/// listing is completed (all pages followed) before the result is handed to
/// the downloader.
///
/// # Errors
///
/// Returns `ListError` on transport or authorization failures and on a
/// malformed listing response.
pub async fn list_objects(
    client: &ContainerClient,
    prefix: &str,
    filter: &ObjectFilter,
) -> AppResult<Vec<RemoteObjectRef>> {
    let mut objects = Vec::new();
    let mut marker: Option<String> = None;

    loop {
        let url = client.list_page_url(prefix, marker.as_deref());
        let response = client
            .http()
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::ListError(format!("Failed to list prefix '{prefix}': {e}")))?;

        let status = response.status();
        let response = response.error_for_status().map_err(|e| {
            AppError::ListError(format!(
                "HTTP {}: Failed to list prefix '{prefix}': {e}",
                status.as_u16()
            ))
        })?;

        let body = response.bytes().await.map_err(|e| {
            AppError::ListError(format!("Failed to read listing for '{prefix}': {e}"))
        })?;

        let page = parse_listing_page(&body)?;
        objects.extend(page.objects);

        match page.next_marker {
            Some(next) if !next.is_empty() => marker = Some(next),
            _ => break,
        }
    }

    let listed = objects.len();
    objects.retain(|object| filter.matches(&object.name));

    info!(
        prefix = prefix,
        listed = listed,
        kept = objects.len(),
        "Listed objects"
    );

    Ok(objects)
}

/// The field currently being captured within the listing response.
enum ListingField {
    Name,
    ContentLength,
    ContentType,
    NextMarker,
}

#[derive(Debug)]
struct ListingPage {
    objects: Vec<RemoteObjectRef>,
    next_marker: Option<String>,
}

/// Parses one page of the store's listing XML
/// (`EnumerationResults/Blobs/Blob` entries plus an optional `NextMarker`).
fn parse_listing_page(content: &[u8]) -> AppResult<ListingPage> {
    let cursor = Cursor::new(content);
    let mut reader = Reader::from_reader(cursor);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::with_capacity(4096);
    let mut objects = Vec::new();
    let mut next_marker: Option<String> = None;

    let mut inside_blob = false;
    let mut current_field: Option<ListingField> = None;
    let mut name: Option<String> = None;
    let mut size: Option<u64> = None;
    let mut content_type: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"Blob" => {
                    inside_blob = true;
                    name = None;
                    size = None;
                    content_type = None;
                }
                b"Name" if inside_blob => current_field = Some(ListingField::Name),
                b"Content-Length" if inside_blob => {
                    current_field = Some(ListingField::ContentLength)
                }
                b"Content-Type" if inside_blob => current_field = Some(ListingField::ContentType),
                b"NextMarker" => current_field = Some(ListingField::NextMarker),
                _ => {}
            },
            Event::Text(e) => {
                let text = e
                    .decode()
                    .map_err(|e| {
                        AppError::ListError(format!("Failed to decode listing text: {e}"))
                    })?
                    .into_owned();
                match current_field {
                    Some(ListingField::Name) => name = Some(text),
                    Some(ListingField::ContentLength) => size = text.parse().ok(),
                    Some(ListingField::ContentType) => content_type = Some(text),
                    Some(ListingField::NextMarker) => next_marker = Some(text),
                    None => {}
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"Blob" => {
                    inside_blob = false;
                    if let Some(name) = name.take() {
                        objects.push(RemoteObjectRef {
                            name,
                            size: size.take(),
                            content_type: content_type.take(),
                        });
                    }
                }
                b"Name" | b"Content-Length" | b"Content-Type" | b"NextMarker" => {
                    current_field = None;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(ListingPage {
        objects,
        next_marker,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<EnumerationResults ContainerName="data">
  <Blobs>
    <Blob>
      <Name>a/1.csv</Name>
      <Properties>
        <Content-Length>42</Content-Length>
        <Content-Type>text/csv</Content-Type>
      </Properties>
    </Blob>
    <Blob>
      <Name>a/2.png</Name>
      <Properties>
        <Content-Length>7</Content-Length>
        <Content-Type>image/png</Content-Type>
      </Properties>
    </Blob>
    <Blob>
      <Name>b/readme.xlsx</Name>
    </Blob>
  </Blobs>
  <NextMarker/>
</EnumerationResults>"#;

    #[test]
    fn parse_listing_page_extracts_names_and_properties() {
        let page = parse_listing_page(LISTING_XML.as_bytes()).unwrap();
        assert_eq!(page.objects.len(), 3);
        assert_eq!(page.objects[0].name, "a/1.csv");
        assert_eq!(page.objects[0].size, Some(42));
        assert_eq!(page.objects[0].content_type.as_deref(), Some("text/csv"));
        assert_eq!(page.objects[2].name, "b/readme.xlsx");
        assert_eq!(page.objects[2].size, None);
        assert!(page.next_marker.is_none());
    }

    #[test]
    fn parse_listing_page_captures_next_marker() {
        let xml = r#"<EnumerationResults><Blobs>
            <Blob><Name>x.csv</Name></Blob>
        </Blobs><NextMarker>page-2</NextMarker></EnumerationResults>"#;
        let page = parse_listing_page(xml.as_bytes()).unwrap();
        assert_eq!(page.next_marker.as_deref(), Some("page-2"));
    }

    #[test]
    fn parse_listing_page_rejects_malformed_xml() {
        let err = parse_listing_page(b"<EnumerationResults><Blobs>").unwrap_err();
        assert!(matches!(err, AppError::ListError(_)));
    }

    #[test]
    fn filter_default_keeps_everything() {
        let filter = ObjectFilter::default();
        assert!(filter.matches("a/1.csv"));
        assert!(filter.matches("no_extension"));
    }

    #[test]
    fn filter_with_extension_restricts_to_subset() {
        let names = ["a/1.csv", "a/2.png", "b/readme.xlsx", "plain"];
        let unfiltered: Vec<_> = names
            .iter()
            .filter(|n| ObjectFilter::default().matches(n))
            .collect();
        let filtered: Vec<_> = names
            .iter()
            .filter(|n| ObjectFilter::with_extension("csv").matches(n))
            .collect();
        assert_eq!(filtered, vec![&"a/1.csv"]);
        assert!(filtered.iter().all(|n| unfiltered.contains(n)));
    }

    #[test]
    fn filter_exclude_extension_drops_spreadsheets() {
        let filter = ObjectFilter {
            exclude_extension: Some("xlsx".into()),
            ..ObjectFilter::default()
        };
        assert!(filter.matches("a/1.csv"));
        assert!(!filter.matches("b/readme.xlsx"));
    }

    #[test]
    fn filter_require_dot_drops_bare_names() {
        let filter = ObjectFilter {
            require_dot: true,
            ..ObjectFilter::default()
        };
        assert!(filter.matches("a/file.csv"));
        assert!(!filter.matches("folder_marker"));
    }
}
