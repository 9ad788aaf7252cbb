// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::fmt::Debug;

use layered::{DynamicService, DynamicServiceExt, Layer, Service};

use crate::PolicyContext;
use crate::backup::BackupLayer;
use crate::breaker::BreakerLayer;
use crate::retry::RetryLayer;
use crate::timeout::TimeoutLayer;

type Wrap<Req, Out> = Box<dyn FnOnce(DynamicService<Req, Out>) -> DynamicService<Req, Out> + Send + Sync>;

/// A service wrapped in resilience policies.
///
/// Built with [`Orchestrator::builder`]. Policies are composed in a fixed order, outermost
/// first:
///
/// 1. circuit breaker
/// 2. timeout
/// 3. backup request
/// 4. retries, in the order they were added
/// 5. the wrapped service
///
/// The timeout therefore bounds the whole retry sequence, and an open circuit rejects a call
/// before any other policy runs. Clones share the same policies and the same circuit.
pub struct Orchestrator<Req, Out> {
    name: Cow<'static, str>,
    service: DynamicService<Req, Out>,
}

impl<Req, Out> Debug for Orchestrator<Req, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator").field("name", &self.name).finish_non_exhaustive()
    }
}

impl<Req, Out> Clone for Orchestrator<Req, Out> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            service: self.service.clone(),
        }
    }
}

impl<Req, Out> Orchestrator<Req, Out>
where
    Req: Send + 'static,
    Out: Send + 'static,
{
    /// Starts collecting policies for a pipeline described by `context`.
    #[must_use]
    pub fn builder(context: &PolicyContext<Req, Out>) -> OrchestratorBuilder<Req, Out> {
        OrchestratorBuilder {
            name: Cow::Owned(context.pipeline_name().to_owned()),
            breaker: None,
            timeout: None,
            backup: None,
            retries: Vec::new(),
        }
    }

    /// The pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<Req: Send, Out: Send> Service<Req> for Orchestrator<Req, Out> {
    type Out = Out;

    async fn execute(&self, input: Req) -> Self::Out {
        self.service.execute(input).await
    }
}

/// Collects the policies of an [`Orchestrator`].
///
/// Every slot is optional; a pipeline without policies calls the service directly. Setting the
/// circuit breaker, timeout or backup twice keeps the last one.
pub struct OrchestratorBuilder<Req, Out> {
    name: Cow<'static, str>,
    breaker: Option<Wrap<Req, Out>>,
    timeout: Option<Wrap<Req, Out>>,
    backup: Option<Wrap<Req, Out>>,
    retries: Vec<Wrap<Req, Out>>,
}

impl<Req, Out> Debug for OrchestratorBuilder<Req, Out> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("name", &self.name)
            .field("breaker", &self.breaker.is_some())
            .field("timeout", &self.timeout.is_some())
            .field("backup", &self.backup.is_some())
            .field("retries", &self.retries.len())
            .finish()
    }
}

impl<Req, Out> OrchestratorBuilder<Req, Out>
where
    Req: Send + 'static,
    Out: Send + 'static,
{
    /// Sets the circuit breaker, the outermost policy.
    #[must_use]
    pub fn circuit_breaker(mut self, layer: BreakerLayer<Req, Out>) -> Self {
        self.breaker = Some(Box::new(move |inner: DynamicService<Req, Out>| layer.layer(inner).into_dynamic()));
        self
    }

    /// Sets the timeout. It bounds the backup race and every retry below it.
    #[must_use]
    pub fn timeout(mut self, layer: TimeoutLayer<Req, Out>) -> Self {
        self.timeout = Some(Box::new(move |inner: DynamicService<Req, Out>| layer.layer(inner).into_dynamic()));
        self
    }

    /// Sets the backup request policy.
    #[must_use]
    pub fn backup(mut self, layer: BackupLayer<Req, Out>) -> Self {
        self.backup = Some(Box::new(move |inner: DynamicService<Req, Out>| layer.layer(inner).into_dynamic()));
        self
    }

    /// Adds a retry policy. The first one added is the outermost.
    #[must_use]
    pub fn retry(mut self, layer: RetryLayer<Req, Out>) -> Self {
        self.retries.push(Box::new(move |inner: DynamicService<Req, Out>| layer.layer(inner).into_dynamic()));
        self
    }

    /// Wraps `service` in the collected policies.
    pub fn build(self, service: impl Service<Req, Out = Out> + 'static) -> Orchestrator<Req, Out> {
        let mut service = service.into_dynamic();

        for wrap in self.retries.into_iter().rev() {
            service = wrap(service);
        }

        for wrap in [self.backup, self.timeout, self.breaker].into_iter().flatten() {
            service = wrap(service);
        }

        Orchestrator { name: self.name, service }
    }
}
