//! Common test utilities for integration tests

use std::fs;
use std::io::Write;
use std::path::Path;

/// Helper function to create a test ZIP file with specified files
#[allow(dead_code)]
pub fn create_test_zip(
    zip_path: &Path,
    files: &[(&str, &[u8])],
) -> Result<(), Box<dyn std::error::Error>> {
    let file = fs::File::create(zip_path)?;
    let mut zip = zip_writer_for(file, files)?;
    zip.finish()?;
    Ok(())
}

#[allow(dead_code)]
fn zip_writer_for<W: Write + std::io::Seek>(
    writer: W,
    files: &[(&str, &[u8])],
) -> Result<zip::ZipWriter<W>, Box<dyn std::error::Error>> {
    use zip::write::FileOptions;
    use zip::ZipWriter;

    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Stored);

    for (name, content) in files {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    Ok(zip)
}

/// Builds gzip-compressed tar bytes holding the given files
#[allow(dead_code)]
pub fn tgz_bytes(files: &[(&str, &[u8])]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *content)?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Helper function to create a test tar.gz file with specified files
#[allow(dead_code)]
pub fn create_test_tgz(
    tgz_path: &Path,
    files: &[(&str, &[u8])],
) -> Result<(), Box<dyn std::error::Error>> {
    fs::write(tgz_path, tgz_bytes(files)?)?;
    Ok(())
}

/// Creates a zip archive whose single entry is a nested tar.gz archive
#[allow(dead_code)]
pub fn create_zip_with_nested_tgz(
    zip_path: &Path,
    tgz_name: &str,
    inner_files: &[(&str, &[u8])],
) -> Result<(), Box<dyn std::error::Error>> {
    let inner = tgz_bytes(inner_files)?;
    create_test_zip(zip_path, &[(tgz_name, &inner)])
}

/// Renders one page of the store's listing XML for the given object names
#[allow(dead_code)]
pub fn listing_xml(names: &[&str], next_marker: Option<&str>) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<EnumerationResults ContainerName=\"container\">\n  <Blobs>\n",
    );
    for name in names {
        body.push_str(&format!(
            "    <Blob>\n      <Name>{name}</Name>\n      <Properties>\n        <Content-Length>0</Content-Length>\n      </Properties>\n    </Blob>\n"
        ));
    }
    body.push_str("  </Blobs>\n");
    match next_marker {
        Some(marker) => body.push_str(&format!("  <NextMarker>{marker}</NextMarker>\n")),
        None => body.push_str("  <NextMarker/>\n"),
    }
    body.push_str("</EnumerationResults>\n");
    body
}
