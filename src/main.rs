use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures_util::{Stream, StreamExt};
use powerwatchdog::{ClientConfig, Status, WatchdogClient};
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// A command line tool for interacting with Hughes Autoformers Bluetooth devices.
#[derive(Parser)]
#[command(version)]
struct Cli {
    /// Log more, repeat for even more
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan for nearby devices.
    Scan {
        /// The scan duration in seconds.
        #[arg(long, default_value_t = 5)]
        duration: u64,
    },
    /// Connect to a Power Watchdog device and stream values.
    PowerWatchdog {
        /// Identifier or address of the Power Watchdog device, e.g. APMS25E62E208 or the
        /// address printed by `scan`.
        #[arg(long)]
        device: String,
        /// How long to look for the device, in seconds.
        #[arg(long, default_value_t = 5)]
        timeout: u64,
        /// Stop streaming after this many seconds. Streams until interrupted if omitted.
        #[arg(long)]
        duration: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Command::Scan { duration: 5 }) {
        Command::Scan { duration } => scan(&ClientConfig::default(), Duration::from_secs(duration)).await,
        Command::PowerWatchdog { device, timeout, duration } => {
            let config = ClientConfig {
                discovery_timeout: Duration::from_secs(timeout),
                ..ClientConfig::default()
            };
            power_watchdog(&device, config, duration.map(Duration::from_secs)).await
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("powerwatchdog={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn scan(config: &ClientConfig, duration: Duration) -> anyhow::Result<()> {
    let adapter = WatchdogClient::default_adapter(config)
        .await
        .context("Bluetooth adapter not available")?;
    let mut discovered = WatchdogClient::scan(&adapter)
        .await
        .context("failed to start scanning")?;

    let deadline = sleep(duration);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            watchdog = discovered.next() => match watchdog {
                Some(watchdog) => println!(
                    "[{}] {} rev {}",
                    watchdog.device.id(),
                    watchdog.identity.id.label(),
                    watchdog.identity.hardware_revision
                ),
                None => break,
            },
        }
    }

    Ok(())
}

async fn power_watchdog(
    target: &str,
    config: ClientConfig,
    duration: Option<Duration>,
) -> anyhow::Result<()> {
    let adapter = WatchdogClient::default_adapter(&config)
        .await
        .context("Bluetooth adapter not available")?;
    let client = WatchdogClient::connect(&adapter, target, config)
        .await
        .with_context(|| format!("failed to connect to {target}"))?;
    let label = client.identity().id.label();

    let result: anyhow::Result<()> = async {
        let readings = client.status().await.context("failed to subscribe")?;
        let interrupted = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(%err, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("interrupted");
        };
        relay(readings, &label, duration, interrupted, &mut std::io::stdout()).await
    }
    .await;

    finish(result, client.stop().await)
}

/// Print readings until the stream ends, `duration` passes or `interrupted` resolves.
async fn relay<S, E>(
    mut readings: S,
    label: &str,
    duration: Option<Duration>,
    interrupted: impl Future<Output = ()>,
    out: &mut impl Write,
) -> anyhow::Result<()>
where
    S: Stream<Item = Result<Status, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let deadline = async {
        match duration {
            Some(duration) => sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = &mut interrupted => break,
            reading = readings.next() => match reading {
                Some(status) => {
                    let status = status.context("telemetry stream failed")?;
                    writeln!(out, "[{label}] {status}")?;
                }
                None => break,
            },
        }
    }

    Ok(())
}

/// The streaming error wins over a disconnect error, which is only logged then.
fn finish(
    streamed: anyhow::Result<()>,
    stopped: Result<(), powerwatchdog::Error>,
) -> anyhow::Result<()> {
    match (streamed, stopped) {
        (Ok(()), stopped) => stopped.context("failed to disconnect"),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(stop_err)) => {
            warn!(err = %stop_err, "failed to disconnect");
            Err(err)
        }
    }
}

#[cfg(test)]
fn reading() -> Status {
    let mut assembler = powerwatchdog::StatusAssembler::default();
    assembler
        .push_bytes(&hex::decode("01032000125ba4000143070093c808006acd6800").unwrap())
        .unwrap();
    assembler
        .push_bytes(&hex::decode("0003700011aaf30000000000001775e22a000000").unwrap())
        .unwrap()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_relay_stops_once_interrupted_while_readings_keep_coming() {
    let readings = Box::pin(futures_util::stream::unfold((), |()| async {
        sleep(Duration::from_millis(100)).await;
        Some((Ok::<_, powerwatchdog::Error>(reading()), ()))
    }));
    let mut out = Vec::new();

    relay(readings, "APMS25E62E208", None, sleep(Duration::from_secs(1)), &mut out)
        .await
        .unwrap();

    let lines = String::from_utf8(out).unwrap().lines().count();
    assert!((9..=10).contains(&lines), "{lines} readings");
}

#[tokio::test(start_paused = true)]
async fn test_relay_stops_after_duration() {
    let readings = futures_util::stream::pending::<Result<Status, powerwatchdog::Error>>();
    let mut out = Vec::new();

    relay(readings, "APMS25E62E208", Some(Duration::from_secs(2)), std::future::pending(), &mut out)
        .await
        .unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn test_relay_prints_labelled_readings() {
    let readings = futures_util::stream::iter([Ok::<_, powerwatchdog::Error>(reading())]);
    let mut out = Vec::new();

    relay(readings, "APMS25E62E208", None, std::future::pending(), &mut out)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), format!("[APMS25E62E208] {}\n", reading()));
}

#[tokio::test]
async fn test_relay_fails_on_telemetry_error() {
    let readings =
        futures_util::stream::iter([Err::<Status, _>(powerwatchdog::Error::BluetoothUnavailable)]);
    let mut out = Vec::new();

    let err = relay(readings, "APMS25E62E208", None, std::future::pending(), &mut out)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "telemetry stream failed");
}

#[test]
fn test_finish_keeps_streaming_error_over_disconnect_error() {
    let err = finish(
        Err(anyhow::anyhow!("telemetry stream failed")),
        Err(powerwatchdog::Error::BluetoothUnavailable),
    )
    .unwrap_err();
    assert_eq!(err.to_string(), "telemetry stream failed");
}

#[test]
fn test_finish_reports_disconnect_error_after_clean_stream() {
    let err = finish(Ok(()), Err(powerwatchdog::Error::BluetoothUnavailable)).unwrap_err();
    assert_eq!(err.to_string(), "failed to disconnect");
    assert!(finish(Ok(()), Ok(())).is_ok());
}
