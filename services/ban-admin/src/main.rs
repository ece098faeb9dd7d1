//! Ban Admin CLI
//!
//! - `list-bans`：列出 banned / strikes / ratelimit 条目
//! - `unban-ip <ip>`：删除引用该 IP 的全部条目
//!
//! 正常结束（包括“没有找到”）返回 0，存储故障返回非 0。

use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;

use ban_admin::application::{AuditLister, ListOptions, Revoker};
use ban_admin::infrastructure::{open_store, with_deadline};
use warden_config::{AppConfig, LogFormat, StoreBackend};
use warden_errors::AppResult;

#[derive(Parser)]
#[command(name = "ban-admin")]
#[command(about = "Inspect and repair the IP ban / strike / rate-limit cache", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory containing default.toml and <APP_ENV>.toml
    /// [default: ./config, else the service's bundled config]
    #[arg(long, global = true)]
    config_dir: Option<String>,

    /// Override the configured store backend
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,
}

#[derive(Subcommand)]
enum Commands {
    /// List active ban, strike and rate-limit entries, soonest expiry first
    ListBans {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Also show entries that have expired but are not purged yet
        #[arg(long)]
        include_expired: bool,
    },

    /// Remove every ban, strike and rate-limit entry for an IP
    UnbanIp {
        /// IP address, matched literally
        ip: String,

        /// Report what would be removed without deleting anything
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Postgres,
    Redis,
    Memory,
}

impl From<BackendArg> for StoreBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Postgres => StoreBackend::Postgres,
            BackendArg::Redis => StoreBackend::Redis,
            BackendArg::Memory => StoreBackend::Memory,
        }
    }
}

/// 当前目录下没有 `config/` 时退回到随服务提供的配置目录
fn resolve_config_dir(explicit: Option<&str>) -> String {
    match explicit {
        Some(dir) => dir.to_string(),
        None if Path::new(LOCAL_CONFIG_DIR).is_dir() => LOCAL_CONFIG_DIR.to_string(),
        None => BUNDLED_CONFIG_DIR.to_string(),
    }
}

const LOCAL_CONFIG_DIR: &str = "config";
const BUNDLED_CONFIG_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config");

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config_dir = resolve_config_dir(cli.config_dir.as_deref());
    let mut config = AppConfig::load(&config_dir)
        .with_context(|| format!("failed to load configuration from {:?}", config_dir))?;
    if let Some(backend) = cli.backend {
        config.store.backend = backend.into();
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

async fn run(command: Commands, config: &AppConfig) -> AppResult<()> {
    let deadline = config.store.timeout();
    let store = with_deadline(deadline, "opening the store", open_store(config)).await?;

    // 操作全部成功后才写 stdout，失败时不会留下半份报告
    let mut output = Vec::new();
    match command {
        Commands::ListBans {
            format,
            include_expired,
        } => {
            let lister = AuditLister::new(store);
            let report = with_deadline(
                deadline,
                "list-bans",
                lister.list(ListOptions { include_expired }),
            )
            .await?;
            match format {
                OutputFormat::Text => report.render_text(&mut output)?,
                OutputFormat::Json => report.render_json(&mut output)?,
            }
        }
        Commands::UnbanIp { ip, dry_run } => {
            let revoker = Revoker::new(store);
            let outcome = if dry_run {
                with_deadline(deadline, "unban-ip", revoker.preview(&ip)).await?
            } else {
                with_deadline(deadline, "unban-ip", revoker.unban(&ip)).await?
            };
            writeln!(output, "{}", outcome)?;
        }
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&output)?;
    stdout.flush()?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(78);
        }
    };

    let log_level = if cli.verbose {
        "debug"
    } else {
        config.telemetry.log_level.as_str()
    };
    match config.telemetry.format {
        LogFormat::Text => warden_telemetry::init_tracing(log_level),
        LogFormat::Json => warden_telemetry::init_tracing_json(log_level),
    }

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
