// FallGuard - Recorded sensor traces
//
// One sample per line, comma separated:
//
//   # timestamp_ms,kind,x,y,z
//   0,accel,0.0,0.0,9.81
//   0,gravity,0.0,0.0,9.81
//   20,gyro,0.12,0.0,0.03
//
// `kind` is `accel`, `gyro` or `gravity`. Blank lines and `#` comments are
// skipped. A malformed line is reported and skipped during replay so a
// single corrupt record does not end the run.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines, Write};
use std::path::Path;

use anyhow::Context;
use thiserror::Error;

use crate::events::{Sample, SensorKind};
use crate::tasks::sensor::SensorSource;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("line {line}: {reason}")]
pub struct TraceError {
    pub line: usize,
    pub reason: String,
}

/// Parse one trace line. Returns `Ok(None)` for blank lines and comments.
pub fn parse_line(line_no: usize, text: &str) -> Result<Option<Sample>, TraceError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }

    let err = |reason: String| TraceError { line: line_no, reason };
    let fields: Vec<&str> = text.split(',').map(str::trim).collect();
    if fields.len() != 5 {
        return Err(err(format!("expected 5 fields, found {}", fields.len())));
    }

    let timestamp_ms = fields[0]
        .parse::<u64>()
        .map_err(|e| err(format!("bad timestamp {:?}: {}", fields[0], e)))?;
    let kind = SensorKind::from_label(fields[1])
        .ok_or_else(|| err(format!("unknown sensor kind {:?}", fields[1])))?;

    let mut axis_values = [0.0; 3];
    for (value, field) in axis_values.iter_mut().zip(&fields[2..]) {
        *value = field
            .parse::<f64>()
            .map_err(|e| err(format!("bad axis value {:?}: {}", field, e)))?;
    }

    Ok(Some(Sample::new(kind, axis_values, timestamp_ms)))
}

pub fn format_sample(sample: &Sample) -> String {
    let [x, y, z] = sample.axis_values;
    format!("{},{},{},{},{}", sample.timestamp_ms, sample.kind.label(), x, y, z)
}

/// Write `samples` in trace format with a header comment.
pub fn write_trace<W: Write>(mut out: W, samples: &[Sample]) -> io::Result<()> {
    writeln!(out, "# timestamp_ms,kind,x,y,z")?;
    for sample in samples {
        writeln!(out, "{}", format_sample(sample))?;
    }
    out.flush()
}

/// Replays a trace as a [`SensorSource`], one sample per poll.
pub struct TraceSource<R> {
    lines: Lines<R>,
    line_no: usize,
    skipped: usize,
}

impl TraceSource<BufReader<File>> {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening trace {}", path.display()))?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> TraceSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Malformed lines skipped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> SensorSource for TraceSource<R> {
    fn read(&mut self) -> anyhow::Result<Option<Vec<Sample>>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.with_context(|| format!("reading trace line {}", self.line_no))?;
            match parse_line(self.line_no, &line) {
                Ok(Some(sample)) => return Ok(Some(vec![sample])),
                Ok(None) => {}
                Err(e) => {
                    self.skipped += 1;
                    log::warn!("Skipping trace {}", e);
                }
            }
        }
        Ok(None)
    }
}
