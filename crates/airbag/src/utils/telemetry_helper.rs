// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

/// Per-strategy telemetry state handed out by [`PolicyContext`][crate::PolicyContext].
#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    pub(crate) pipeline_name: Cow<'static, str>,
    pub(crate) strategy_name: Cow<'static, str>,
    #[cfg(feature = "metrics")]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
    pub(crate) logs_enabled: bool,
}

impl TelemetryHelper {
    /// Increments the resilience event counter, tagging it with the pipeline, strategy and event.
    #[cfg(feature = "metrics")]
    pub(crate) fn report_metrics(&self, event_name: &'static str, attributes: &[opentelemetry::KeyValue]) {
        use crate::telemetry::{EVENT_NAME, PIPELINE_NAME, STRATEGY_NAME};

        if let Some(reporter) = &self.event_reporter {
            let mut all = Vec::with_capacity(attributes.len() + 3);
            all.push(opentelemetry::KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone()));
            all.push(opentelemetry::KeyValue::new(STRATEGY_NAME, self.strategy_name.clone()));
            all.push(opentelemetry::KeyValue::new(EVENT_NAME, event_name));
            all.extend_from_slice(attributes);
            reporter.add(1, &all);
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(strategy_name: &'static str) -> Self {
        Self {
            pipeline_name: Cow::Borrowed("test_pipeline"),
            strategy_name: Cow::Borrowed(strategy_name),
            #[cfg(feature = "metrics")]
            event_reporter: None,
            logs_enabled: true,
        }
    }
}
