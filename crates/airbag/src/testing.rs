// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tracing::Subscriber;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Captures formatted log output, prefixed with the name of every event, for the current thread.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Installs the capture as the thread default until the guard is dropped.
    #[must_use]
    pub(crate) fn set_default(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::registry()
            .with(EventNames {
                buffer: Arc::clone(&self.buffer),
            })
            .with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false));

        tracing::subscriber::set_default(subscriber)
    }

    pub(crate) fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
    }

    pub(crate) fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(output.contains(expected), "log output does not contain '{expected}', got:\n{output}");
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

pub(crate) struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// The fmt layer does not print event names, so they are recorded separately.
struct EventNames {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl<S: Subscriber> Layer<S> for EventNames {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let mut buffer = self.buffer.lock().unwrap();
        writeln!(buffer, "event: {}", event.metadata().name()).unwrap();
    }
}

/// Collects `OTel` metrics in memory.
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: opentelemetry_sdk::metrics::InMemoryMetricExporter,
    provider: opentelemetry_sdk::metrics::SdkMeterProvider,
}

#[cfg(feature = "metrics")]
impl MetricTester {
    pub(crate) fn new() -> Self {
        let exporter = opentelemetry_sdk::metrics::InMemoryMetricExporter::default();

        Self {
            provider: opentelemetry_sdk::metrics::SdkMeterProvider::builder()
                .with_periodic_exporter(exporter.clone())
                .build(),
            exporter,
        }
    }

    pub(crate) fn meter_provider(&self) -> &opentelemetry_sdk::metrics::SdkMeterProvider {
        &self.provider
    }

    /// Flushes pending metrics and asserts that their debug dump contains `expected`.
    pub(crate) fn assert_contains(&self, expected: &str) {
        self.provider.force_flush().unwrap();
        let dump = format!("{:?}", self.exporter.get_finished_metrics().unwrap());
        assert!(dump.contains(expected), "metrics do not contain '{expected}', got:\n{dump}");
    }
}

/// Observes whether a future holding one of its guards was dropped before completing.
#[derive(Debug, Clone, Default)]
pub(crate) struct DropFlag {
    dropped: Arc<AtomicBool>,
}

impl DropFlag {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn guard(&self) -> DropGuard {
        DropGuard {
            dropped: Some(Arc::clone(&self.dropped)),
        }
    }

    pub(crate) fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) struct DropGuard {
    dropped: Option<Arc<AtomicBool>>,
}

impl DropGuard {
    /// Marks the owning future as completed.
    pub(crate) fn complete(mut self) {
        self.dropped = None;
    }
}

impl Drop for DropGuard {
    fn drop(&mut self) {
        if let Some(dropped) = self.dropped.take() {
            dropped.store(true, Ordering::SeqCst);
        }
    }
}
