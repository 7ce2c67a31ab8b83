// FallGuard - Entry Point
//
// On the watch (ESP32-C3) this boots the sensor, detection and alert tasks.
// Everywhere else it is a small CLI for replaying recorded traces and
// running scripted falls through the same engine.

#[cfg(target_os = "espidf")]
mod drivers;
#[cfg(target_os = "espidf")]
mod firmware;
#[cfg(not(target_os = "espidf"))]
mod host;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    firmware::run()
}

#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    host::run()
}
