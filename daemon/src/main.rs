use alert_daemon::config::{Config, DEFAULT_CONFIG_PATH};
use alert_daemon::simulate::simulated_module;
use alert_daemon::{CallPlan, WebhookNotifier, place_calls, scheduler};
use alert_modem::at::ExecutorConfig;
use alert_modem::call::parse_phone_numbers;
use alert_modem::{Modem, NotificationSink};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr as _, ensure};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{self, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

const SYSLOG_IDENTIFIER: &str = "alert-daemon";

#[derive(Debug, Parser)]
#[command(about, version)]
struct Cli {
    /// YAML configuration file.
    #[arg(long, env = "CONFIG_FILE", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Talk to a scripted module instead of the serial device.
    #[arg(long)]
    simulate: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run periodic network checks until SIGTERM or SIGINT.
    Run,
    /// Check the network once and print the result.
    Status,
    /// Ring a comma separated list of numbers.
    Call {
        /// What the calls are about, used in the announcement.
        #[arg(long, default_value = "alert")]
        name: String,
        numbers: String,
    },
    /// Hang up the current call.
    Hangup,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let tel_flusher = alert_telemetry::TelemetryConfig::new()
        .with_journald(SYSLOG_IDENTIFIER)
        .init();

    let result = run(Cli::parse()).await;

    tel_flusher.flush().await;

    result
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    if !config.modem.enabled {
        warn!("modem disabled in {}, nothing to do", cli.config.display());
        return Ok(());
    }

    let sink: Arc<dyn NotificationSink> = Arc::new(WebhookNotifier::new(
        config.webhook.url.clone(),
    )?);

    let numbers = match &cli.command {
        Command::Call { numbers, .. } => parse_phone_numbers(numbers),
        _ => Vec::new(),
    };

    let modem = if cli.simulate {
        info!("using simulated modem");
        Modem::with_transport(
            simulated_module(&numbers),
            ExecutorConfig::default(),
            sink.clone(),
        )
        .await
    } else {
        Modem::connect(&config.modem_config(), sink.clone()).await
    }
    .wrap_err("failed to initialize modem")?;
    let modem = Arc::new(modem);

    let result = match cli.command {
        Command::Run => serve(modem.clone(), &config).await,
        Command::Status => {
            let status = modem.check_network_status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
            println!(
                "network status: {}",
                if status.is_normal() { "normal" } else { "abnormal" }
            );
            Ok(())
        }
        Command::Call { name, .. } => {
            ensure!(!numbers.is_empty(), "no phone numbers given");
            let plan = CallPlan {
                name,
                numbers,
                duration: config.call_duration(),
            };
            for outcome in place_calls(&modem, sink.as_ref(), &plan).await {
                println!("{outcome}");
            }
            Ok(())
        }
        Command::Hangup => modem.hangup_call().await.wrap_err("hangup failed"),
    };

    modem.close().await?;

    result
}

async fn serve(modem: Arc<Modem>, config: &Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let checks = scheduler::spawn(modem, config.network_check_interval(), cancel.clone());

    let mut sigterm = unix::signal(SignalKind::terminate())?;
    let mut sigint = unix::signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => warn!("received SIGTERM"),
        _ = sigint.recv()  => warn!("received SIGINT"),
    }

    info!("stopping network checks and exiting gracefully");
    cancel.cancel();
    checks.await?;

    Ok(())
}
