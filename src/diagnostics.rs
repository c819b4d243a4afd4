//! Diagnostic scopes
//!
//! A scope decorates one externally observable call (a page fetch, a poll, an
//! initiating request) with a `tracing` span and start/success/failure events.
//! Paging and polling code never logs on the caller's behalf; collections
//! wrap the futures they hand to it instead.

use crate::error::Result;
use std::future::Future;
use std::time::Instant;
use tracing::Instrument;

/// Named instrumentation scope, e.g. `"DnsZoneCollection.GetAll"`
#[derive(Debug, Clone)]
pub struct DiagnosticScope {
    name: String,
}

impl DiagnosticScope {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run `future` inside this scope
    pub async fn run<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let span = tracing::debug_span!("client_call", scope = %self.name);
        let started = Instant::now();

        async move {
            tracing::debug!("{} started", self.name);
            let result = future.await;
            match &result {
                Ok(_) => tracing::debug!(
                    "{} succeeded in {}ms",
                    self.name,
                    started.elapsed().as_millis()
                ),
                Err(e) => tracing::warn!("{} failed: {}", self.name, e),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Owned variant of [`DiagnosticScope::run`] for `'static` futures
    pub fn wrap<T, F>(self, future: F) -> impl Future<Output = Result<T>> + Send + 'static
    where
        T: Send + 'static,
        F: Future<Output = Result<T>> + Send + 'static,
    {
        async move { self.run(future).await }
    }
}
