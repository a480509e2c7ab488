use chrono::{DateTime, Duration, Utc};
use std::path::{Component, Path, PathBuf};
use url::Url;

/// Permissions carried by an access grant.
///
/// Extraction only ever needs read and list; write/delete/create are never
/// requested, so they are not representable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permissions {
    pub read: bool,
    pub list: bool,
}

impl Permissions {
    pub fn read_list() -> Self {
        Self {
            read: true,
            list: true,
        }
    }

    /// Permission letters in the service's canonical order.
    pub fn as_signed_string(&self) -> String {
        let mut s = String::with_capacity(2);
        if self.read {
            s.push('r');
        }
        if self.list {
            s.push('l');
        }
        s
    }
}

/// A short-lived, permission-scoped capability for one container.
///
/// Created fresh per extraction run and passed explicitly into client
/// constructors; it is never persisted or stored in ambient global state.
#[derive(Debug, Clone)]
pub struct AccessGrant {
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub permissions: Permissions,
    /// Fully qualified container URL with the token as its query string.
    /// Possession of this URL is equivalent to authorization.
    pub container_url: Url,
}

impl AccessGrant {
    pub fn duration(&self) -> Duration {
        self.expires_at - self.issued_at
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A single object enumerated from the remote container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObjectRef {
    /// Full path-like key, e.g. `machine_learning/reviews.zip`
    pub name: String,
    pub size: Option<u64>,
    pub content_type: Option<String>,
}

impl RemoteObjectRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
            content_type: None,
        }
    }
}

/// Derives the local mirror path for an object name under `local_root`.
///
/// The object's full relative path is reproduced beneath the root, so nested
/// remote folders survive the download. Returns `None` for names that yield
/// no usable path: empty names, names made only of separators, or names
/// containing `..`/rooted segments that would escape the local root.
pub fn mirror_path(local_root: &Path, object_name: &str) -> Option<PathBuf> {
    let relative: PathBuf = object_name
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect();

    if relative.as_os_str().is_empty() {
        return None;
    }

    // Reject anything that is not a plain file-name segment.
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }

    Some(local_root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_read_list_signed_string() {
        assert_eq!(Permissions::read_list().as_signed_string(), "rl");
    }

    #[test]
    fn test_permissions_partial_signed_string() {
        let read_only = Permissions {
            read: true,
            list: false,
        };
        assert_eq!(read_only.as_signed_string(), "r");

        let list_only = Permissions {
            read: false,
            list: true,
        };
        assert_eq!(list_only.as_signed_string(), "l");
    }

    #[test]
    fn test_grant_duration_and_expiry() {
        let issued = Utc::now();
        let grant = AccessGrant {
            issued_at: issued,
            expires_at: issued + Duration::hours(1),
            permissions: Permissions::read_list(),
            container_url: Url::parse("https://acct.blob.core.windows.net/data?sig=x").unwrap(),
        };
        assert_eq!(grant.duration(), Duration::hours(1));
        assert!(!grant.is_expired(issued));
        assert!(grant.is_expired(issued + Duration::hours(2)));
    }

    #[test]
    fn test_mirror_path_reproduces_full_relative_path() {
        let root = Path::new("data");
        let path = mirror_path(root, "machine_learning/nested/reviews.zip").unwrap();
        assert_eq!(path, Path::new("data/machine_learning/nested/reviews.zip"));
    }

    #[test]
    fn test_mirror_path_single_segment() {
        let root = Path::new("data");
        assert_eq!(
            mirror_path(root, "file.csv").unwrap(),
            Path::new("data/file.csv")
        );
    }

    #[test]
    fn test_mirror_path_collapses_duplicate_separators() {
        let root = Path::new("data");
        assert_eq!(
            mirror_path(root, "a//b.csv").unwrap(),
            Path::new("data/a/b.csv")
        );
    }

    #[test]
    fn test_mirror_path_rejects_empty_and_separator_only_names() {
        let root = Path::new("data");
        assert!(mirror_path(root, "").is_none());
        assert!(mirror_path(root, "/").is_none());
        assert!(mirror_path(root, "///").is_none());
    }

    #[test]
    fn test_mirror_path_rejects_traversal() {
        let root = Path::new("data");
        assert!(mirror_path(root, "../escape.csv").is_none());
        assert!(mirror_path(root, "a/../../escape.csv").is_none());
    }
}
