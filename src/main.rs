//! `tikilive-api` - serve the TikiLIVE REST API over HTTP.
//!
//! Configuration is read from every `--config-dir` in order (later
//! directories win), then from `TIKILIVE_*` environment variables, then from
//! the command line.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tikilive::Kernel;
use tikilive_config::{Settings, Validate};
use tikilive_core::logging::{LogConfig, error, info};
use tikilive_core::{Error, Result};

/// TikiLIVE REST API server
#[derive(Parser, Debug)]
#[command(name = "tikilive-api")]
#[command(version)]
#[command(about = "Serve the TikiLIVE REST API")]
struct Cli {
    /// Configuration directory; repeat to layer several
    #[arg(short = 'c', long = "config-dir", value_name = "DIR", default_value = "config")]
    config_dirs: Vec<PathBuf>,

    /// Listen address, overriding `server.address`
    #[arg(short, long, env = "TIKILIVE_SERVER_ADDRESS")]
    address: Option<String>,

    /// Expose exception details in error responses
    #[arg(long)]
    debug: bool,
}

/// Files and environment first, then the command line; validated once at the end.
fn settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load_unvalidated(&cli.config_dirs)?;
    if let Some(address) = &cli.address {
        settings.server_address = address.clone();
    }
    if cli.debug {
        settings.debug = true;
    }
    settings.validate()?;
    Ok(settings)
}

async fn run(cli: Cli) -> Result<()> {
    let settings = settings(&cli)?;
    let address: SocketAddr = settings.server_address.parse().map_err(|e| {
        Error::config(format!("Invalid listen address '{}'", settings.server_address)).caused_by(e)
    })?;

    info!(
        %address,
        config_dirs = ?cli.config_dirs,
        debug = settings.debug,
        "Starting TikiLIVE API"
    );

    Kernel::new(settings)?.serve(address).await?;

    info!("Server stopped");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _guard = match LogConfig::from_env().init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, kind = e.kind().name(), "TikiLIVE API failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_dir(application: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("application.toml"), application).unwrap();
        dir
    }

    fn cli(dir: &TempDir, extra: &[&str]) -> Cli {
        let mut args = vec!["tikilive-api", "--config-dir", dir.path().to_str().unwrap()];
        args.extend_from_slice(extra);
        Cli::parse_from(args)
    }

    #[test]
    fn test_address_flag_fixes_invalid_config_address() {
        let dir = config_dir("[server]\naddress = \"nowhere\"\n");

        assert!(settings(&cli(&dir, &[])).is_err());

        let settings = settings(&cli(&dir, &["--address", "127.0.0.1:9000"])).unwrap();
        assert_eq!(settings.server_address, "127.0.0.1:9000");
    }

    #[test]
    fn test_invalid_address_flag_is_rejected() {
        let dir = config_dir("");
        let error = settings(&cli(&dir, &["--address", "nowhere"])).unwrap_err();
        assert_eq!(error.kind(), tikilive_core::ErrorKind::Config);
    }

    #[test]
    fn test_debug_flag() {
        let dir = config_dir("debug = false\n");
        assert!(settings(&cli(&dir, &["--debug"])).unwrap().debug);
    }
}
