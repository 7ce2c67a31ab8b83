// FallGuard - Detection Task
//
// Owns the DetectionController and drains the command channel in order.
// Live samples, simulation requests and the stop signal all travel through
// the same channel, so a simulation never interleaves with a live sample.
// The stop flag is checked before every command and, during a simulation,
// before every scripted sample.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::anyhow;

use crate::clock::Clock;
use crate::config::{FallConfig, STACK_DETECT};
use crate::controller::{AlertSink, DetectionController};
use crate::events::{FallType, FeedOutcome, Sample};
use crate::tasks::task_builder;

#[derive(Debug, Clone)]
pub enum DetectorCommand {
    Sample(Sample),
    Simulate(FallType),
    Stop,
}

/// Handle to a running detection task.
pub struct DetectorHandle {
    tx: Sender<DetectorCommand>,
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl DetectorHandle {
    /// A sender for producer tasks.
    pub fn sender(&self) -> Sender<DetectorCommand> {
        self.tx.clone()
    }

    /// Queue one sample. Returns false once the task has exited.
    pub fn feed(&self, sample: Sample) -> bool {
        self.tx.send(DetectorCommand::Sample(sample)).is_ok()
    }

    pub fn simulate(&self, fall_type: FallType) -> bool {
        self.tx.send(DetectorCommand::Simulate(fall_type)).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ask the task to stop. Commands still queued are discarded.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.tx.send(DetectorCommand::Stop);
    }

    /// Close the channel and wait for the task. Without a prior [`stop`]
    /// every queued command is processed first.
    ///
    /// [`stop`]: DetectorHandle::stop
    pub fn join(self) -> anyhow::Result<()> {
        let DetectorHandle { tx, thread, .. } = self;
        drop(tx);
        thread
            .join()
            .map_err(|_| anyhow!("detection task panicked"))
    }
}

/// Start the detection task on its own thread.
pub fn spawn_detector<S, C>(config: FallConfig, sink: S, clock: C) -> anyhow::Result<DetectorHandle>
where
    S: AlertSink + Send + 'static,
    C: Clock + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<DetectorCommand>();
    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    let controller = DetectionController::with_clock(config, sink, clock);

    let thread = task_builder("detect", STACK_DETECT).spawn(move || {
        detect_task(controller, rx, flag);
    })?;

    Ok(DetectorHandle { tx, running, thread })
}

pub fn detect_task<S: AlertSink, C: Clock>(
    mut controller: DetectionController<S, C>,
    rx: Receiver<DetectorCommand>,
    running: Arc<AtomicBool>,
) {
    log::info!("Detection task started");
    controller.start();

    while let Ok(command) = rx.recv() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match command {
            DetectorCommand::Sample(sample) => {
                controller.feed(sample);
            }
            DetectorCommand::Simulate(fall_type) => {
                let outcomes =
                    controller.simulate_until(fall_type, &[], || !running.load(Ordering::SeqCst));
                let confirmed = outcomes
                    .iter()
                    .filter(|o| matches!(o, FeedOutcome::Confirmed(_)))
                    .count();
                log::info!("Simulation fed {} samples, {} alert(s)", outcomes.len(), confirmed);
            }
            DetectorCommand::Stop => break,
        }
    }

    controller.stop();
    running.store(false, Ordering::SeqCst);
    log::info!("Detection task exiting");
}
