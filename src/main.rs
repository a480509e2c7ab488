use lakex_cli::{cli, errors};

use errors::AppResult;

fn main() -> AppResult<()> {
    // Local .env files carry credentials in development; absence is fine.
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let rt =
        tokio::runtime::Runtime::new().map_err(|e| errors::AppError::IoError(e.to_string()))?;

    let exit_code = rt.block_on(cli::cli())?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}
