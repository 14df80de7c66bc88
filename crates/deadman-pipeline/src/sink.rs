// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Telemetry Sinks
// ─────────────────────────────────────────────────────────────────────
//! Downstream telemetry. Sinks observe the decision stream and never
//! influence it; a sink failure is logged and swallowed by the
//! pipeline rather than aborting the decision loop.
//!
//! The JSONL sink is append-only and tamper-evident in structure: a
//! header line binds the log to the exact configuration fingerprint,
//! and every record carries a monotonic id.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use deadman_types::{Clock, KernelConfig, KernelError, KernelResult, SystemEvent};

/// Downstream receiver of telemetry records.
pub trait TelemetrySink: Send + Sync {
    fn record(&self, event: &SystemEvent) -> KernelResult<()>;
}

#[derive(Serialize)]
struct SinkHeader<'a> {
    version: &'a str,
    created_at_ms: u64,
    config_fingerprint: String,
}

#[derive(Serialize)]
struct SinkRecord<'a> {
    id: u64,
    #[serde(flatten)]
    event: &'a SystemEvent,
}

struct SinkInner {
    writer: BufWriter<File>,
    next_id: u64,
}

/// Append-only JSONL telemetry log.
///
/// Thread-safe: the writer is guarded by a `parking_lot::Mutex`, so
/// one sink can serve several pipelines.
pub struct JsonlSink {
    inner: Mutex<SinkInner>,
}

impl JsonlSink {
    /// Open (or create) the log file and write the header record.
    pub fn create(
        path: impl AsRef<Path>,
        config: &KernelConfig,
        clock: &Arc<dyn Clock>,
    ) -> KernelResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|e| KernelError::Telemetry(format!("open telemetry log: {e}")))?;
        let mut writer = BufWriter::new(file);

        let header = SinkHeader {
            version: env!("CARGO_PKG_VERSION"),
            created_at_ms: clock.now_ms(),
            config_fingerprint: config.fingerprint(),
        };
        let line = serde_json::to_string(&header)
            .map_err(|e| KernelError::Telemetry(format!("serialize header: {e}")))?;
        writeln!(writer, "{line}")
            .and_then(|_| writer.flush())
            .map_err(|e| KernelError::Telemetry(format!("write header: {e}")))?;

        Ok(Self {
            inner: Mutex::new(SinkInner { writer, next_id: 1 }),
        })
    }
}

impl TelemetrySink for JsonlSink {
    fn record(&self, event: &SystemEvent) -> KernelResult<()> {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let line = serde_json::to_string(&SinkRecord { id, event })
            .map_err(|e| KernelError::Telemetry(format!("serialize record: {e}")))?;
        writeln!(inner.writer, "{line}")
            .and_then(|_| inner.writer.flush())
            .map_err(|e| KernelError::Telemetry(format!("write record: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deadman_types::{AgentEvent, ManualClock};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_header_then_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(5_000));
        let config = KernelConfig::default();
        let sink = JsonlSink::create(&path, &config, &clock).unwrap();

        sink.record(&SystemEvent::AgentEvent {
            event: AgentEvent::new(0, 10, 1, 5, 100),
        })
        .unwrap();
        sink.record(&SystemEvent::Error {
            component: "SafetyGate".to_string(),
            error: "boom".to_string(),
        })
        .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 records

        let header: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(header["created_at_ms"], 5_000);
        assert_eq!(header["config_fingerprint"], config.fingerprint());

        let first: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first["id"], 1);
        assert_eq!(first["kind"], "AGENT_EVENT");

        let second: serde_json::Value = serde_json::from_str(lines[2]).unwrap();
        assert_eq!(second["id"], 2);
        assert_eq!(second["kind"], "ERROR");
    }

    #[test]
    fn test_every_line_is_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let sink = JsonlSink::create(&path, &KernelConfig::default(), &clock).unwrap();

        for i in 0..10u64 {
            sink.record(&SystemEvent::AgentEvent {
                event: AgentEvent::new(i * 100, 10, 1, 5, 100),
            })
            .unwrap();
        }

        let content = fs::read_to_string(&path).unwrap();
        for line in content.lines() {
            serde_json::from_str::<serde_json::Value>(line).unwrap();
        }
    }
}
