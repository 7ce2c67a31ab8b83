// Minimal stderr logger for the host build. The watch uses EspLogger.

use anyhow::anyhow;
use log::{LevelFilter, Log, Metadata, Record};

struct StderrLogger {
    level: LevelFilter,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:<5} {}] {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

pub fn init(level: LevelFilter) -> anyhow::Result<()> {
    let logger: &'static StderrLogger = Box::leak(Box::new(StderrLogger { level }));
    log::set_logger(logger).map_err(|e| anyhow!("installing logger: {}", e))?;
    log::set_max_level(level);
    Ok(())
}
