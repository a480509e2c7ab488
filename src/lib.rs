//! lakex-cli library
//!
//! This crate provides the core functionality for the `lakex-cli` binary.
//! Keep the crate root minimal — implementation and tests live in their modules.
//!
//! ## Overview
//!
//! The library implements a credential-scoped extraction pipeline that pulls
//! datasets out of a remote object container into a local working directory:
//!
//! - [`sas`] - Issues short-lived, read/list-only access grants for the container
//! - [`datalake`] - Lists objects by prefix and mirrors them beneath a local root
//! - [`extractor`] - Unpacks the two-stage (zip, then nested tar.gz) archive job
//! - [`orchestrator`] - Runs independent extraction jobs concurrently and aggregates outcomes
//! - [`db`] - Table discovery, filtering, and per-table database CSV exports
//! - [`cli`] - Command-line interface wiring jobs together
//! - [`config`] - Pipeline configuration and environment-sourced credentials
//! - [`errors`] - Error types used throughout the application
//!
//! ## Example Usage
//!
//! Each extraction job sources its own grant, lists a folder prefix, and
//! mirrors the result:
//!
//! ```no_run
//! use lakex_cli::{config::StorageCredentials, datalake, errors::AppResult, sas};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! # async fn example() -> AppResult<()> {
//! let credentials = StorageCredentials::from_env()?;
//! let grant = sas::issue_for(&credentials, 1)?;
//! let client = datalake::ContainerClient::from_grant(&grant, Duration::from_secs(300))?;
//!
//! let filter = datalake::ObjectFilter::default();
//! let objects = datalake::list_objects(&client, "machine_learning/", &filter).await?;
//! let report = datalake::download_all(&client, &objects, Path::new("data"), 4).await?;
//! println!("downloaded {} of {}", report.succeeded, report.attempted);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod datalake;
pub mod db;
pub mod errors;
pub mod extractor;
pub mod models;
pub mod orchestrator;
pub mod sas;
pub mod ui;
