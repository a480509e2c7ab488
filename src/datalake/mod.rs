//! Container listing and mirrored download operations.
//!
//! A [`ContainerClient`] is built from an explicit access grant (see
//! [`crate::sas`]), [`list_objects`] enumerates a prefix, and
//! [`download_all`] mirrors the listed objects beneath a local root.

mod client;
mod lister;
mod mirror;

// Re-export public API
pub use client::ContainerClient;
pub use lister::{list_objects, ObjectFilter};
pub use mirror::{download_all, DownloadReport, FailedObject};
