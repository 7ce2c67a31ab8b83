// FallGuard - Runtime Tasks
//
// One thread per concern, joined by mpsc channels:
//
//   sensor task ──DetectorCommand──► detection task ──AlertEvent──► alert task
//
// The detection task is the only owner of the engine state, so samples are
// processed strictly in arrival order and a slow alert handler never holds up
// detection.

pub mod alert;
pub mod detect;
pub mod sensor;

use std::thread;

/// Named thread builder. Stack sizes only apply on the watch (FreeRTOS tasks);
/// host threads keep the platform default.
pub(crate) fn task_builder(name: &str, stack_size: usize) -> thread::Builder {
    let builder = thread::Builder::new().name(name.into());
    if cfg!(target_os = "espidf") {
        builder.stack_size(stack_size)
    } else {
        builder
    }
}
