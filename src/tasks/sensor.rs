// FallGuard - Sensor Task
//
// Pulls samples from a sensor source at a fixed cadence and pushes them into
// the detection channel. The source is the MPU6050 on the watch and a
// recorded trace on the host.

use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::STACK_SENSOR;
use crate::events::Sample;
use crate::tasks::detect::DetectorCommand;
use crate::tasks::task_builder;

/// Anything that produces timestamped sensor readings.
pub trait SensorSource {
    /// One poll. `Ok(None)` means the source is exhausted; an error is logged
    /// and the next poll retried.
    fn read(&mut self) -> anyhow::Result<Option<Vec<Sample>>>;
}

/// Poll `source` every `interval` until it runs dry or the detector goes away.
/// A zero interval polls back to back.
pub fn sensor_task<S: SensorSource>(mut source: S, tx: Sender<DetectorCommand>, interval: Duration) {
    log::info!("Sensor task started");
    let mut forwarded: u64 = 0;

    loop {
        let tick_start = Instant::now();

        match source.read() {
            Ok(Some(samples)) => {
                for sample in samples {
                    if tx.send(DetectorCommand::Sample(sample)).is_err() {
                        log::warn!("Detection channel closed - exiting sensor task");
                        return;
                    }
                    forwarded += 1;
                }
            }
            Ok(None) => {
                log::info!("Sensor source exhausted after {} samples", forwarded);
                return;
            }
            Err(e) => {
                log::warn!("Sensor read error: {:#}", e);
            }
        }

        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
}

/// Run [`sensor_task`] on its own thread.
pub fn spawn_sensor_task<S>(source: S, tx: Sender<DetectorCommand>, interval: Duration) -> anyhow::Result<JoinHandle<()>>
where
    S: SensorSource + Send + 'static,
{
    let thread = task_builder("sensor", STACK_SENSOR).spawn(move || sensor_task(source, tx, interval))?;
    Ok(thread)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct Scripted {
        polls: Vec<anyhow::Result<Option<Vec<Sample>>>>,
    }

    impl SensorSource for Scripted {
        fn read(&mut self) -> anyhow::Result<Option<Vec<Sample>>> {
            if self.polls.is_empty() {
                return Ok(None);
            }
            self.polls.remove(0)
        }
    }

    #[test]
    fn forwards_samples_and_survives_read_errors() {
        let source = Scripted {
            polls: vec![
                Ok(Some(vec![Sample::accel([0.0, 0.0, 9.81], 0), Sample::gyro([0.0; 3], 0)])),
                Err(anyhow::anyhow!("bus timeout")),
                Ok(Some(vec![Sample::accel([0.0, 0.0, 9.81], 20)])),
            ],
        };
        let (tx, rx) = mpsc::channel();
        sensor_task(source, tx, Duration::ZERO);

        let timestamps: Vec<u64> = rx
            .iter()
            .map(|cmd| match cmd {
                DetectorCommand::Sample(s) => s.timestamp_ms,
                other => panic!("unexpected command {other:?}"),
            })
            .collect();
        assert_eq!(timestamps, vec![0, 0, 20]);
    }

    #[test]
    fn spawned_task_drains_the_source() {
        let source = Scripted {
            polls: (0..3)
                .map(|i| Ok(Some(vec![Sample::accel([0.0, 0.0, 9.81], i * 20)])))
                .collect(),
        };
        let (tx, rx) = mpsc::channel();
        let thread = spawn_sensor_task(source, tx, Duration::from_millis(1)).unwrap();
        thread.join().unwrap();
        assert_eq!(rx.try_iter().count(), 3);
    }

    #[test]
    fn stops_when_detector_is_gone() {
        let source = Scripted {
            polls: (0..5)
                .map(|i| Ok(Some(vec![Sample::accel([0.0, 0.0, 9.81], i * 20)])))
                .collect(),
        };
        let (tx, rx) = mpsc::channel();
        drop(rx);
        // Returns instead of spinning through the remaining polls.
        sensor_task(source, tx, Duration::ZERO);
    }
}
