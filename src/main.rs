use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tavern_server::ServerConfig;
use tavern_telemetry::{LogFormat, TelemetryConfig};
use tracing::Level;

/// Live game-state sync for a tabletop session.
#[derive(Debug, Parser)]
#[command(name = "tavern", version)]
struct Cli {
    /// Address to bind.
    #[arg(long, env = "TAVERN_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on. `PORT` is honored when `TAVERN_PORT` is unset.
    #[arg(long, env = "TAVERN_PORT")]
    port: Option<u16>,

    /// Directory holding projectable images.
    #[arg(long, env = "TAVERN_IMAGES_DIR", default_value = "public/images")]
    images_dir: PathBuf,

    /// Outbound frames buffered per client before drops.
    #[arg(long, env = "TAVERN_MAX_SEND_QUEUE", default_value_t = 256)]
    max_send_queue: usize,

    /// Largest accepted upload body.
    #[arg(long, env = "TAVERN_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Only GM connections may edit the boss or drive the display.
    #[arg(long, env = "TAVERN_ENFORCE_ROLES")]
    enforce_roles: bool,

    /// Start with the demo party and boss.
    #[arg(long, env = "TAVERN_SEED_DEMO")]
    seed_demo: bool,

    #[arg(long, env = "TAVERN_LOG_LEVEL", default_value = "info")]
    log_level: Level,

    /// `json` or `pretty`.
    #[arg(long, env = "TAVERN_LOG_FORMAT", default_value = "json")]
    log_format: LogFormat,
}

impl Cli {
    fn port(&self) -> anyhow::Result<u16> {
        if let Some(port) = self.port {
            return Ok(port);
        }
        match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .with_context(|| format!("invalid PORT value {raw:?}")),
            Err(_) => Ok(ServerConfig::default().port),
        }
    }

    fn server_config(&self) -> anyhow::Result<ServerConfig> {
        Ok(ServerConfig {
            host: self.host.clone(),
            port: self.port()?,
            max_send_queue: self.max_send_queue,
            images_dir: self.images_dir.clone(),
            max_upload_bytes: self.max_upload_bytes,
            enforce_roles: self.enforce_roles,
            seed_demo: self.seed_demo,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tavern_telemetry::init_telemetry(&TelemetryConfig {
        log_level: cli.log_level,
        module_levels: Vec::new(),
        format: cli.log_format,
    })?;

    let config = cli.server_config()?;
    let handle = tavern_server::start(config)
        .await
        .context("failed to start server")?;

    tracing::info!(port = handle.port, "Tavern ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "tavern",
            "--port",
            "4100",
            "--seed-demo",
            "--enforce-roles",
            "--log-format",
            "pretty",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let config = cli.server_config().unwrap();
        assert_eq!(config.port, 4100);
        assert!(config.seed_demo);
        assert!(config.enforce_roles);
        assert_eq!(cli.log_format, LogFormat::Pretty);
        assert_eq!(cli.log_level, Level::DEBUG);
    }

    #[test]
    fn cli_rejects_unknown_log_format() {
        assert!(Cli::try_parse_from(["tavern", "--log-format", "xml"]).is_err());
    }
}
