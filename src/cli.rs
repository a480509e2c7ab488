use crate::config::{DbCredentials, ResolvedConfig, ResolvedConfigFile, StorageCredentials};
use crate::datalake::{download_all, list_objects, ContainerClient, ObjectFilter};
use crate::db::{self, PgTableSource, TableFilter};
use crate::errors::{AppError, AppResult};
use crate::extractor::{extract_archives, ArchiveSpec};
use crate::orchestrator::{run_jobs, JobSpec};
use crate::sas;
use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

// CLI metadata constants
const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const APP_AUTHOR: &str = env!("CARGO_PKG_AUTHORS");
const APP_ABOUT: &str = env!("CARGO_PKG_DESCRIPTION");

/// Builds the full command-line surface.
///
/// Kept separate from [`cli`] so parsing behavior is testable without
/// touching the environment.
fn build_cli() -> Command<'static> {
    Command::new("lakex-cli")
        .version(APP_VERSION)
        .author(APP_AUTHOR)
        .about(APP_ABOUT)
        .subcommand(
            Command::new("run")
                .about("Mirror all configured source folders, unpack their archives, and export database tables")
                .after_help(
                    "Credentials are read from ACCOUNT_NAME, ACCOUNT_KEY, CONTAINER_NAME\nand DB_SERVER, DB_NAME, DB_USER, DB_PASSWORD.\nExample:\n  lakex-cli run -x csv -c 8",
                )
                .arg(
                    Arg::new("extension")
                        .short('x')
                        .long("extension")
                        .help("Keep only objects with this file extension")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("concurrent_downloads")
                        .short('c')
                        .long("concurrent-downloads")
                        .help("Objects downloaded in parallel within one job")
                        .value_parser(clap::value_parser!(usize))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("no_cleanup")
                        .long("no-cleanup")
                        .help("Keep consumed archives on disk after extraction")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("datalake")
                .about("Mirror a single source folder from the container")
                .arg(
                    Arg::new("folder")
                        .help("Source folder prefix (trailing separator included as written)")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("extension")
                        .short('x')
                        .long("extension")
                        .help("Keep only objects with this file extension")
                        .action(ArgAction::Set),
                ),
        )
        .subcommand(
            Command::new("toml")
                .about("Run using a TOML configuration file")
                .arg(
                    Arg::new("config")
                        .help("Path to the TOML config file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}

/// Parses command-line arguments and executes the requested extraction.
///
/// Subcommands:
/// - `run`: orchestrated extraction of every configured source folder plus
///   the database export job
/// - `datalake`: mirror a single source folder
/// - `toml`: run using a TOML configuration file
///
/// Returns the process exit code: 0 only if every launched job succeeded.
pub async fn cli() -> AppResult<i32> {
    let cmd = build_cli();
    let mut cmd_for_help = cmd.clone();
    let matches = cmd.get_matches();

    match matches.subcommand() {
        Some(("run", sub)) => {
            let mut config = ResolvedConfig::default();
            if let Some(ext) = sub.get_one::<String>("extension") {
                config.keep_extension = Some(ext.clone());
            }
            if let Some(&concurrency) = sub.get_one::<usize>("concurrent_downloads") {
                config.concurrent_downloads = concurrency;
            }
            let cleanup = !sub.get_flag("no_cleanup");

            let credentials = StorageCredentials::from_env()?;
            let db_credentials = DbCredentials::from_env()?;
            run_workflow(credentials, Some(db_credentials), &config, cleanup).await
        }
        Some(("datalake", sub)) => {
            let folder = sub
                .get_one::<String>("folder")
                .expect("folder is required")
                .clone();
            let mut config = ResolvedConfig::default();
            config.source_folders = vec![folder];
            if let Some(ext) = sub.get_one::<String>("extension") {
                config.keep_extension = Some(ext.clone());
            }

            let credentials = StorageCredentials::from_env()?;
            run_workflow(credentials, None, &config, true).await
        }
        Some(("toml", sub)) => {
            let config_path = sub
                .get_one::<PathBuf>("config")
                .expect("config is required");

            let file_config = ResolvedConfigFile::from_toml_file(config_path)?;
            let credentials = StorageCredentials::from_env()?;
            let db_credentials = DbCredentials::from_env()?;
            run_workflow(
                credentials,
                Some(db_credentials),
                &file_config.resolved,
                file_config.cleanup,
            )
            .await
        }
        _ => {
            cmd_for_help
                .print_help()
                .map_err(|e| AppError::IoError(format!("Failed to print help: {e}")))?;
            Ok(0)
        }
    }
}

/// Builds one extraction job per source folder, plus the database export
/// job when database credentials are supplied, and runs them to completion.
///
/// Jobs write to disjoint subtrees (distinct top-level folder names, with
/// the database exports under their own directory), so no file-level
/// locking is needed across them.
async fn run_workflow(
    credentials: StorageCredentials,
    db_credentials: Option<DbCredentials>,
    config: &ResolvedConfig,
    cleanup: bool,
) -> AppResult<i32> {
    info!(
        folders = config.source_folders.len(),
        data_dir = %config.data_dir.display(),
        db = db_credentials.is_some(),
        "Preparing extraction jobs"
    );

    let mut specs = Vec::with_capacity(config.source_folders.len() + 1);
    for folder in &config.source_folders {
        let credentials = credentials.clone();
        let config = config.clone();
        let folder = folder.clone();
        let name = folder.trim_end_matches('/').to_string();
        specs.push(JobSpec::new(name, move || {
            extraction_job(credentials, config, folder, cleanup)
        }));
    }

    if let Some(db_credentials) = db_credentials {
        let export_dir = config.db_export_dir.clone();
        let filter = TableFilter::from_config(config);
        specs.push(JobSpec::new("db", move || {
            db_export_job(db_credentials, export_dir, filter)
        }));
    }

    let report = run_jobs(specs).await;
    Ok(report.exit_code())
}

/// One execution unit: sources its own grant, lists, mirrors, and (for the
/// archive-bearing folder) runs the two-stage unpack.
///
/// Fails only on setup errors: credential issuance or an unlistable prefix.
/// Individual object failures and archive-stage failures are logged and
/// leave the job successful, so partial results stay usable.
async fn extraction_job(
    credentials: StorageCredentials,
    config: ResolvedConfig,
    folder: String,
    cleanup: bool,
) -> AppResult<()> {
    // Grants never cross execution-unit boundaries; every job signs its own.
    let grant = sas::issue_for(&credentials, config.grant_duration_hours)?;
    let client = ContainerClient::from_grant(
        &grant,
        Duration::from_secs(config.request_timeout_secs),
    )?;

    let filter = ObjectFilter::from_config(&config);
    let objects = list_objects(&client, &folder, &filter).await?;

    let report = download_all(
        &client,
        &objects,
        &config.data_dir,
        config.concurrent_downloads,
    )
    .await?;

    if report.failed_count() > 0 {
        warn!(
            folder = folder.as_str(),
            failed = report.failed_count(),
            "Some objects failed to download; job continues"
        );
    }

    if folder.trim_end_matches('/') == config.archive_folder {
        let spec = ArchiveSpec {
            folder: config.archive_folder.clone(),
            archive_name: config.archive_name.clone(),
        };
        extract_archives(&config.data_dir, &spec, cleanup).await?;
    }

    Ok(())
}

/// The database execution unit: connects, then exports one CSV per
/// discovered table under the export directory.
///
/// Fails only on setup errors (unreachable server, rejected credentials,
/// unlistable tables); per-table failures are logged and leave the job
/// successful, matching the per-object download policy.
async fn db_export_job(
    credentials: DbCredentials,
    export_dir: PathBuf,
    filter: TableFilter,
) -> AppResult<()> {
    let source = PgTableSource::connect(&credentials).await?;
    let report = db::export_tables(&source, &export_dir, &filter).await?;

    if !report.failed.is_empty() {
        warn!(
            failed = report.failed.len(),
            "Some tables failed to export; job continues"
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_command_parses_flags() {
        let matches = build_cli()
            .try_get_matches_from(vec![
                "lakex-cli",
                "run",
                "-x",
                "csv",
                "--concurrent-downloads",
                "8",
                "--no-cleanup",
            ])
            .unwrap();
        let sub = matches.subcommand_matches("run").unwrap();
        assert_eq!(sub.get_one::<String>("extension").unwrap(), "csv");
        assert_eq!(*sub.get_one::<usize>("concurrent_downloads").unwrap(), 8);
        assert!(sub.get_flag("no_cleanup"));
    }

    #[test]
    fn run_command_parses_without_arguments() {
        let matches = build_cli()
            .try_get_matches_from(vec!["lakex-cli", "run"])
            .unwrap();
        let sub = matches.subcommand_matches("run").unwrap();
        assert!(sub.get_one::<String>("extension").is_none());
        assert!(!sub.get_flag("no_cleanup"));
    }

    #[test]
    fn datalake_command_requires_folder() {
        let result = build_cli().try_get_matches_from(vec!["lakex-cli", "datalake"]);
        assert!(result.is_err());

        let matches = build_cli()
            .try_get_matches_from(vec!["lakex-cli", "datalake", "nlp_data/"])
            .unwrap();
        let sub = matches.subcommand_matches("datalake").unwrap();
        assert_eq!(sub.get_one::<String>("folder").unwrap(), "nlp_data/");
    }

    #[test]
    fn toml_command_requires_path() {
        let result = build_cli().try_get_matches_from(vec!["lakex-cli", "toml"]);
        assert!(result.is_err());

        let matches = build_cli()
            .try_get_matches_from(vec!["lakex-cli", "toml", "lakex.toml"])
            .unwrap();
        let sub = matches.subcommand_matches("toml").unwrap();
        assert_eq!(
            sub.get_one::<PathBuf>("config").unwrap(),
            &PathBuf::from("lakex.toml")
        );
    }

    #[test]
    fn unknown_flag_is_rejected() {
        let result = build_cli().try_get_matches_from(vec!["lakex-cli", "run", "--bogus"]);
        assert!(result.is_err());
    }
}
