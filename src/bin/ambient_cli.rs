use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ambient_monitor::capture::{CpalCaptureDevice, PcmDecoder, SystemClock, WavReplayDevice};
use ambient_monitor::storage::JsonlBaselineStore;
use ambient_monitor::{
    AppConfig, BaselineStore, CaptureDevice, Clock, MonitorController, MonitorDeps,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use tokio::task::JoinHandle;

#[derive(Parser, Debug)]
#[command(
    name = "ambient_cli",
    about = "Calibrate an ambient noise baseline and monitor a live input against it"
)]
struct Cli {
    /// JSON configuration file (defaults are used when absent or invalid)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Baseline store path (overrides storage.path from the config)
    #[arg(long)]
    store: Option<PathBuf>,
    /// Replay a WAV file instead of opening the default input device
    #[arg(long)]
    replay: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a new baseline and store it
    Calibrate,
    /// Monitor the input, calibrating first if no baseline is stored
    Monitor {
        /// Stop after this many seconds (runs until Ctrl-C otherwise)
        #[arg(long)]
        seconds: Option<u64>,
    },
    /// Print the most recent stored baseline
    Baseline,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = cli
        .config
        .as_ref()
        .map(AppConfig::load_from_file)
        .unwrap_or_default();
    if let Some(store) = cli.store {
        config.storage.path = store;
    }

    let store = Arc::new(JsonlBaselineStore::new(config.storage.path.clone()));
    if let Commands::Baseline = cli.command {
        return run_baseline(store.as_ref()).await;
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let device: Arc<dyn CaptureDevice> = match cli.replay {
        Some(path) => Arc::new(WavReplayDevice::new(path, Arc::clone(&clock))),
        None => Arc::new(CpalCaptureDevice::new()),
    };
    let controller = MonitorController::new(
        MonitorDeps {
            device,
            decoder: Arc::new(PcmDecoder::new()),
            store,
            clock,
        },
        config,
    );

    match cli.command {
        Commands::Calibrate => run_calibrate(&controller).await,
        Commands::Monitor { seconds } => run_monitor(&controller, seconds).await,
        Commands::Baseline => Ok(ExitCode::from(0)),
    }
}

async fn run_baseline(store: &dyn BaselineStore) -> Result<ExitCode> {
    match store.latest().await.context("reading baseline store")? {
        Some(record) => {
            println!("{}", serde_json::to_string(&record)?);
            Ok(ExitCode::from(0))
        }
        None => {
            eprintln!("No baseline stored yet; run `ambient_cli calibrate`");
            Ok(ExitCode::from(2))
        }
    }
}

/// Ctrl-C ends a running calibration early; the flag records that it fired
fn stop_calibration_on_ctrl_c(
    controller: &MonitorController,
) -> (JoinHandle<()>, Arc<AtomicBool>) {
    let stopper = controller.calibration_stopper();
    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    let task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
            stopper.stop();
        }
    });
    (task, interrupted)
}

async fn run_calibrate(controller: &MonitorController) -> Result<ExitCode> {
    let printer = spawn_printer(controller);
    let (stop_on_signal, _) = stop_calibration_on_ctrl_c(controller);

    let result = controller.recalibrate().await;
    stop_on_signal.abort();
    printer.abort();

    let record = result.context("calibration failed")?;
    println!("{}", serde_json::to_string(&record)?);
    Ok(ExitCode::from(0))
}

async fn run_monitor(controller: &MonitorController, seconds: Option<u64>) -> Result<ExitCode> {
    let printer = spawn_printer(controller);

    // initialize() calibrates first when no baseline is stored
    let (stop_on_signal, interrupted) = stop_calibration_on_ctrl_c(controller);
    let initialized = controller.initialize().await;
    stop_on_signal.abort();
    initialized.context("establishing a baseline")?;
    if interrupted.load(Ordering::SeqCst) {
        printer.abort();
        return Ok(ExitCode::from(0));
    }

    controller
        .start_monitoring()
        .await
        .context("starting monitoring")?;

    match seconds {
        Some(seconds) => {
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        None => {
            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
        }
    }

    controller.stop_monitoring().await?;
    printer.abort();
    Ok(ExitCode::from(0))
}

/// Print every snapshot change as one JSON line
fn spawn_printer(controller: &MonitorController) -> JoinHandle<()> {
    let mut snapshots = controller.snapshot_stream();
    tokio::spawn(async move {
        while let Some(snapshot) = snapshots.next().await {
            match serde_json::to_string(&snapshot) {
                Ok(line) => println!("{line}"),
                Err(err) => tracing::warn!("[ambient_cli] Failed to encode snapshot: {}", err),
            }
        }
    })
}
