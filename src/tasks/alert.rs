// FallGuard - Alert Task
//
// Confirmed falls leave the detection task through a channel so that the
// user-facing reaction (haptic SOS on the watch, a JSON line on the host)
// runs on its own thread and can take as long as it needs.

use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

use crate::config::STACK_ALERT;
use crate::controller::AlertSink;
use crate::events::AlertEvent;
use crate::tasks::task_builder;

/// Alert sink that forwards events to the alert task without blocking.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<AlertEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<AlertEvent>) -> Self {
        Self { tx }
    }
}

impl AlertSink for ChannelSink {
    fn on_fall_detected(&mut self, event: AlertEvent) {
        if self.tx.send(event).is_err() {
            log::warn!("Alert channel closed - fall alert at {}ms lost", event.confirmed_at_ms);
        }
    }
}

/// Run `handler` for every alert until all senders are dropped.
pub fn alert_task<H>(rx: Receiver<AlertEvent>, mut handler: H)
where
    H: FnMut(AlertEvent) -> anyhow::Result<()>,
{
    log::info!("Alert task started");
    for event in rx {
        if let Err(e) = handler(event) {
            log::error!("Alert handler failed: {:#}", e);
        }
    }
    log::info!("Alert channel closed - exiting alert task");
}

/// Start the alert task; the returned sink feeds it.
pub fn spawn_alert_task<H>(handler: H) -> anyhow::Result<(ChannelSink, JoinHandle<()>)>
where
    H: FnMut(AlertEvent) -> anyhow::Result<()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<AlertEvent>();
    let thread = task_builder("alert", STACK_ALERT).spawn(move || alert_task(rx, handler))?;
    Ok((ChannelSink::new(tx), thread))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Trigger;

    fn event(at: u64) -> AlertEvent {
        AlertEvent {
            acceleration_magnitude: 24.0,
            gyro_magnitude: 0.0,
            trigger: Trigger::HighImpact,
            suspected_at_ms: at,
            confirmed_at_ms: at + 3_000,
        }
    }

    #[test]
    fn handler_sees_every_alert_even_after_a_failure() {
        let (seen_tx, seen_rx) = mpsc::channel();
        let (mut sink, thread) = spawn_alert_task(move |e: AlertEvent| {
            seen_tx.send(e.suspected_at_ms)?;
            if e.suspected_at_ms == 0 {
                anyhow::bail!("motor busy");
            }
            Ok(())
        })
        .unwrap();

        sink.on_fall_detected(event(0));
        sink.on_fall_detected(event(40_000));
        drop(sink);
        thread.join().unwrap();

        assert_eq!(seen_rx.try_iter().collect::<Vec<_>>(), vec![0, 40_000]);
    }

    #[test]
    fn closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::channel();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        sink.on_fall_detected(event(0));
    }
}
