use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use serde_json::Value;
use shared_event_bus::{EventPublisher, EventRecord};
use shared_logging::{JsonLogger, LogLevel, LogRecord, LogSink};
use tokio::runtime::{Handle, Runtime};

/// Builder for combination telemetry sinks.
pub struct CombinationTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    log_sink: Option<Arc<dyn LogSink>>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
    min_level: LogLevel,
}

impl CombinationTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            log_sink: None,
            event_publisher: None,
            min_level: LogLevel::Debug,
        }
    }

    /// Writes JSON log lines to `path`. Ignored when a custom sink is also set.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Uses a caller-provided log sink.
    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<CombinationTelemetry> {
        let sink: Option<Arc<dyn LogSink>> = match (self.log_sink, self.log_path) {
            (Some(sink), _) => Some(sink),
            (None, Some(path)) => Some(Arc::new(JsonLogger::new(path)?) as Arc<dyn LogSink>),
            (None, None) => None,
        };
        let event = self
            .event_publisher
            .map(|publisher| EventHandle::new(self.module.clone(), publisher, sink.clone()))
            .transpose()?;
        Ok(CombinationTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                sink,
                event,
                min_level: self.min_level,
            }),
        })
    }
}

/// Telemetry handle shared by the combiner and engine.
#[derive(Clone)]
pub struct CombinationTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for CombinationTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CombinationTelemetry")
            .field("module", &self.inner.module)
            .field("min_level", &self.inner.min_level)
            .finish_non_exhaustive()
    }
}

struct TelemetryInner {
    module: String,
    sink: Option<Arc<dyn LogSink>>,
    event: Option<EventHandle>,
    min_level: LogLevel,
}

struct EventHandle {
    module: String,
    /// Owned only when built outside a tokio runtime; shut down in the background on drop.
    runtime: Option<Runtime>,
    publisher: Arc<dyn EventPublisher>,
    failures: Option<Arc<dyn LogSink>>,
}

impl EventHandle {
    fn new(
        module: String,
        publisher: Arc<dyn EventPublisher>,
        failures: Option<Arc<dyn LogSink>>,
    ) -> Result<Self> {
        let runtime = if Handle::try_current().is_ok() {
            None
        } else {
            Some(Runtime::new()?)
        };
        Ok(Self {
            module,
            runtime,
            publisher,
            failures,
        })
    }

    fn publish(&self, record: EventRecord) -> Result<()> {
        if let Ok(handle) = Handle::try_current() {
            let publisher = Arc::clone(&self.publisher);
            let failures = self.failures.clone();
            let module = self.module.clone();
            handle.spawn(async move {
                let event_type = record.event_type.clone();
                if let Err(err) = publisher.publish(record).await {
                    report_publish_failure(failures.as_deref(), &module, &event_type, &err);
                }
            });
            Ok(())
        } else if let Some(runtime) = &self.runtime {
            runtime.block_on(self.publisher.publish(record))
        } else {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(self.publisher.publish(record))
        }
    }
}

impl Drop for EventHandle {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

fn report_publish_failure(
    sink: Option<&dyn LogSink>,
    module: &str,
    event_type: &str,
    err: &anyhow::Error,
) {
    let Some(sink) = sink else {
        eprintln!("combination event publish failed: {err:?}");
        return;
    };
    let record = LogRecord::new(module, LogLevel::Error, "telemetry.event_publish_failed")
        .with_metadata(serde_json::json!({ "event_type": event_type, "error": format!("{err:#}") }));
    let _ = sink.write(&record);
}

impl CombinationTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> CombinationTelemetryBuilder {
        CombinationTelemetryBuilder::new(module)
    }

    /// Logs structured metadata.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if level < self.inner.min_level {
            return Ok(());
        }
        if let Some(sink) = &self.inner.sink {
            sink.write(&LogRecord::new(&self.inner.module, level, message).with_metadata(metadata))?;
        }
        Ok(())
    }

    /// Emits an event on the bus.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if let Some(handle) = &self.inner.event {
            handle.publish(EventRecord::new(&self.inner.module, event_type, payload))?;
        }
        Ok(())
    }
}

/// Logs through optional telemetry, swallowing sink failures.
pub(crate) fn log(
    telemetry: Option<&CombinationTelemetry>,
    level: LogLevel,
    message: &str,
    metadata: Value,
) {
    if let Some(tel) = telemetry {
        let _ = tel.log(level, message, metadata);
    }
}

/// Emits through optional telemetry, swallowing publish failures.
pub(crate) fn event(telemetry: Option<&CombinationTelemetry>, event_type: &str, payload: Value) {
    if let Some(tel) = telemetry {
        let _ = tel.event(event_type, payload);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use async_trait::async_trait;
    use shared_event_bus::{EventSubscriber, FileEventPublisher, MemoryEventBus};
    use shared_logging::MemoryLogSink;
    use tempfile::tempdir;

    struct RejectingPublisher;

    #[async_trait]
    impl EventPublisher for RejectingPublisher {
        async fn publish(&self, _event: EventRecord) -> Result<()> {
            anyhow::bail!("bus offline")
        }
    }

    fn current_thread_runtime() -> Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn telemetry_writes_log_and_event() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("combination.log");
        let bus = Arc::new(MemoryEventBus::new(16));
        let telemetry = CombinationTelemetry::builder("combination")
            .log_path(&path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "combine.start", json!({ "samples": 3 }))
            .unwrap();
        telemetry
            .event("combination.completed", json!({ "samples": 3 }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("combine.start"));
        assert_eq!(bus.snapshot().len(), 1);
        assert_eq!(bus.snapshot()[0].source, "combination");
    }

    #[test]
    fn min_level_filters_records() {
        let sink = Arc::new(MemoryLogSink::new());
        let telemetry = CombinationTelemetry::builder("combination")
            .log_sink(sink.clone())
            .min_level(LogLevel::Warn)
            .build()
            .unwrap();
        telemetry.log(LogLevel::Debug, "quiet", json!({})).unwrap();
        telemetry.log(LogLevel::Warn, "loud", json!({})).unwrap();
        let records = sink.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message, "loud");
    }

    #[test]
    fn missing_sinks_are_noops() {
        let telemetry = CombinationTelemetry::builder("combination").build().unwrap();
        assert!(telemetry.log(LogLevel::Error, "x", json!({})).is_ok());
        assert!(telemetry.event("x", json!({})).is_ok());
    }

    #[test]
    fn file_publisher_receives_events() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("events/combination.jsonl");
        let telemetry = CombinationTelemetry::builder("combination")
            .event_publisher(Arc::new(FileEventPublisher::new(&path).unwrap()))
            .build()
            .unwrap();
        telemetry
            .event("combination.completed", json!({ "rule": "mean" }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let record: EventRecord = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(record.event_type, "combination.completed");
        assert_eq!(record.payload["rule"], "mean");
    }

    #[test]
    fn subscribers_see_published_events() {
        let bus = Arc::new(MemoryEventBus::new(4));
        let mut rx = current_thread_runtime().block_on(bus.subscribe()).unwrap();
        let telemetry = CombinationTelemetry::builder("combination")
            .event_publisher(bus)
            .build()
            .unwrap();
        telemetry.event("combination.completed", json!({})).unwrap();
        assert_eq!(rx.try_recv().unwrap().event_type, "combination.completed");
    }

    #[test]
    fn detached_publish_failures_reach_the_log_sink() {
        let rt = current_thread_runtime();
        let sink = Arc::new(MemoryLogSink::new());
        rt.block_on(async {
            let telemetry = CombinationTelemetry::builder("combination")
                .log_sink(sink.clone())
                .event_publisher(Arc::new(RejectingPublisher))
                .build()
                .unwrap();
            telemetry.event("combination.completed", json!({})).unwrap();
            for _ in 0..16 {
                if !sink.snapshot().is_empty() {
                    break;
                }
                tokio::task::yield_now().await;
            }
        });
        let errors = sink.at_least(LogLevel::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "telemetry.event_publish_failed");
        assert_eq!(errors[0].metadata["event_type"], "combination.completed");
        assert!(errors[0].metadata["error"]
            .as_str()
            .unwrap()
            .contains("bus offline"));
    }

    #[test]
    fn blocking_publish_failures_are_returned() {
        let telemetry = CombinationTelemetry::builder("combination")
            .event_publisher(Arc::new(RejectingPublisher))
            .build()
            .unwrap();
        assert!(telemetry.event("combination.completed", json!({})).is_err());
    }
}
