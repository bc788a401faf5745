use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tempo::config::{LoggingConfig, TempoConfig};
use tempo::debounce::Debounced;
use tempo::merge::merge;

/// Debounce lines read from stdin, forwarding the survivors to stdout.
#[derive(Parser, Debug)]
#[command(name = "tempo", version, about)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Debounce delay in milliseconds
    #[arg(long)]
    wait_ms: Option<u64>,

    /// Force a line through at least this often under continuous input
    #[arg(long)]
    max_wait_ms: Option<u64>,

    /// Forward the first line of a burst immediately
    #[arg(long)]
    leading: bool,

    /// Do not forward the last line of a burst
    #[arg(long)]
    no_trailing: bool,

    /// Emit JSON formatted logs on stderr
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Command line settings as a merge overlay; unset flags are null.
    fn overrides(&self) -> Value {
        json!({
            "debounce": {
                "wait_ms": self.wait_ms,
                "max_wait_ms": self.max_wait_ms,
                "leading": self.leading.then_some(true),
                "trailing": self.no_trailing.then_some(false),
            },
            "logging": {
                "json": self.json_logs.then_some(true),
            },
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    init_tracing(&config.logging);

    info!("Starting Tempo");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        wait_ms = config.debounce.wait_ms,
        max_wait_ms = ?config.debounce.max_wait_ms,
        leading = config.debounce.leading,
        trailing = config.debounce.trailing,
        "Configuration loaded"
    );

    let mut forwarded: u64 = 0;
    let debounced = Debounced::new(
        move |line: String| -> Result<u64, String> {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", line)
                .and_then(|_| stdout.flush())
                .map_err(|e| e.to_string())?;
            forwarded += 1;
            Ok(forwarded)
        },
        config.debounce.wait(),
        config.debounce.to_options(),
    )?;

    let mut lines = LinesStream::new(BufReader::new(tokio::io::stdin()).lines());
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            line = lines.next() => match line {
                Some(Ok(line)) => {
                    if let Some(Err(e)) = debounced.call(line) {
                        error!(error = %e, "Failed to write output");
                        anyhow::bail!("failed to write output: {}", e);
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => {
                    info!("Input closed");
                    break;
                }
            },
            _ = &mut shutdown => break,
        }
    }

    match debounced.flush() {
        Some(Err(e)) => anyhow::bail!("failed to write output: {}", e),
        Some(Ok(count)) => info!(forwarded = count, "Tempo stopped"),
        None => info!(forwarded = 0, "Tempo stopped"),
    }
    Ok(())
}

/// Layer command line flags over file and environment configuration.
fn resolve_config(cli: &Cli) -> anyhow::Result<TempoConfig> {
    let base = TempoConfig::load(cli.config.as_deref())?;
    let mut value = serde_json::to_value(&base)?;
    merge(&mut value, [cli.overrides()]);
    Ok(serde_json::from_value(value)?)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, flushing pending line");
        }
        _ = terminate => {
            info!("Received SIGTERM, flushing pending line");
        }
    }
}
