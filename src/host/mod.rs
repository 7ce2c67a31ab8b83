// FallGuard - Host CLI
//
//   fallguard replay <TRACE> [--realtime]
//   fallguard simulate <FALL_TYPE> [--write <TRACE>]
//
// Both accept `--config <FILE>` and `-v` (repeat for more detail). Confirmed
// falls are printed to stdout as one JSON object per line; logs go to stderr.

mod logger;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use clap::{ArgAction, Parser, Subcommand};

use fallguard::clock::MonotonicClock;
use fallguard::config::{FallConfig, SENSOR_SAMPLE_INTERVAL_MS};
use fallguard::controller::DetectionController;
use fallguard::events::{AlertEvent, FallType, FeedOutcome};
use fallguard::tasks::alert::spawn_alert_task;
use fallguard::tasks::detect::spawn_detector;
use fallguard::tasks::sensor::sensor_task;
use fallguard::{simulation, trace};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Detection tuning file (TOML). Built-in defaults when omitted.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log verbosity: -v debug, -vv trace
    #[arg(long, short, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a recorded sensor trace through the detection pipeline
    Replay {
        trace: PathBuf,

        /// Pace samples at the 50 Hz sensor rate instead of as fast as possible
        #[arg(long)]
        realtime: bool,
    },
    /// Run a scripted fall (high_impact, free_fall, orientation, tumbling)
    Simulate {
        fall_type: FallType,

        /// Also write the script to this file in trace format
        #[arg(long, short)]
        write: Option<PathBuf>,
    },
}

pub fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init(match args.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    })?;

    let config = match &args.config {
        Some(path) => FallConfig::load(path)?,
        None => FallConfig::default(),
    };
    match args.command {
        Command::Replay { trace, realtime } => replay(config, &trace, realtime),
        Command::Simulate { fall_type, write } => simulate(config, fall_type, write.as_deref()),
    }
}

fn replay(config: FallConfig, path: &Path, realtime: bool) -> anyhow::Result<()> {
    let source = trace::TraceSource::open(path)?;

    let alerts = Arc::new(AtomicUsize::new(0));
    let counter = alerts.clone();
    let (sink, alert_thread) = spawn_alert_task(move |event: AlertEvent| {
        counter.fetch_add(1, Ordering::SeqCst);
        println!("{}", serde_json::to_string(&event)?);
        Ok(())
    })?;
    let detector = spawn_detector(config, sink, MonotonicClock::new())?;

    let interval = if realtime {
        Duration::from_millis(SENSOR_SAMPLE_INTERVAL_MS)
    } else {
        Duration::ZERO
    };
    sensor_task(source, detector.sender(), interval);

    detector.join()?;
    alert_thread
        .join()
        .map_err(|_| anyhow!("alert task panicked"))?;

    log::info!(
        "Replay of {} finished: {} fall(s) confirmed",
        path.display(),
        alerts.load(Ordering::SeqCst)
    );
    Ok(())
}

fn simulate(config: FallConfig, fall_type: FallType, write: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = write {
        let samples = simulation::script(fall_type, &config, 0);
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        trace::write_trace(BufWriter::new(file), &samples)
            .with_context(|| format!("writing {}", path.display()))?;
        log::info!("Wrote {} samples to {}", samples.len(), path.display());
    }

    let mut alerts = Vec::new();
    let outcomes = {
        let mut controller =
            DetectionController::new(config, |event: AlertEvent| alerts.push(event));
        controller.start();
        controller.simulate(fall_type, &[])
    };

    for outcome in &outcomes {
        match outcome {
            FeedOutcome::Suspected(trigger) => log::info!("Suspected fall via {}", trigger),
            FeedOutcome::Dismissed(dismissal) => log::info!("Suspicion dismissed: {:?}", dismissal),
            _ => {}
        }
    }
    for event in &alerts {
        println!("{}", serde_json::to_string(event)?);
    }

    if alerts.is_empty() {
        bail!("{} simulation did not confirm a fall", fall_type);
    }
    Ok(())
}
