//! Blocking wrappers
//!
//! The async [`Pageable`] and [`Operation`] are the only implementations of
//! paging and polling. The types here drive them to completion on a private
//! current-thread Tokio runtime, for callers without an async context.
//!
//! Do not use them from inside an async runtime: `block_on` panics there.

use crate::error::{Error, Result};
use crate::lro::{Operation, OperationError, OperationStatus, PollingPolicy};
use crate::paging::{ContinuationToken, Page, Pageable};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio_util::sync::CancellationToken;

/// Shared runtime handle for blocking wrappers
#[derive(Clone)]
pub struct BlockingRuntime {
    runtime: Arc<Runtime>,
}

impl BlockingRuntime {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        Ok(Self {
            runtime: Arc::new(runtime),
        })
    }

    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

/// Blocking view over a [`Pageable`]
#[derive(Clone)]
pub struct BlockingPageable<T> {
    inner: Pageable<T>,
    runtime: BlockingRuntime,
}

impl<T: Send + 'static> BlockingPageable<T> {
    pub fn new(inner: Pageable<T>, runtime: BlockingRuntime) -> Self {
        Self { inner, runtime }
    }

    pub fn first_page(&self) -> Result<Page<T>> {
        self.runtime.block_on(self.inner.first_page())
    }

    pub fn next_page(&self, token: ContinuationToken) -> Result<Page<T>> {
        self.runtime.block_on(self.inner.next_page(token))
    }

    /// Iterator over pages, starting from the first page on every call
    pub fn pages(&self) -> BlockingIter<Page<T>> {
        BlockingIter {
            stream: self.inner.pages(),
            runtime: self.runtime.clone(),
        }
    }

    pub fn pages_from(&self, token: ContinuationToken) -> BlockingIter<Page<T>> {
        BlockingIter {
            stream: self.inner.pages_from(token),
            runtime: self.runtime.clone(),
        }
    }

    /// Iterator over items, starting from the first page on every call
    pub fn iter(&self) -> BlockingIter<T> {
        BlockingIter {
            stream: self.inner.items(),
            runtime: self.runtime.clone(),
        }
    }

    pub fn collect_items(&self) -> Result<Vec<T>> {
        self.iter().collect()
    }
}

/// Iterator that blocks on each fetch
pub struct BlockingIter<T> {
    stream: BoxStream<'static, Result<T>>,
    runtime: BlockingRuntime,
}

impl<T> Iterator for BlockingIter<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.stream.next())
    }
}

/// Blocking view over an [`Operation`]
pub struct BlockingOperation<T> {
    inner: Operation<T>,
    runtime: BlockingRuntime,
}

impl<T> BlockingOperation<T> {
    pub fn new(inner: Operation<T>, runtime: BlockingRuntime) -> Self {
        Self { inner, runtime }
    }

    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn status(&self) -> OperationStatus {
        self.inner.status()
    }

    pub fn has_completed(&self) -> bool {
        self.inner.has_completed()
    }

    pub fn error(&self) -> Option<&OperationError> {
        self.inner.error()
    }

    pub fn value(&self) -> Result<&T> {
        self.inner.value()
    }

    pub fn poll_count(&self) -> u32 {
        self.inner.poll_count()
    }

    pub fn poll_once(&mut self) -> Result<OperationStatus> {
        self.runtime.block_on(self.inner.poll_once())
    }

    pub fn wait_until_complete(
        &mut self,
        policy: &PollingPolicy,
        cancel: &CancellationToken,
    ) -> Result<&mut Self> {
        self.runtime
            .block_on(self.inner.wait_until_complete(policy, cancel))?;
        Ok(self)
    }

    pub fn into_inner(self) -> Operation<T> {
        self.inner
    }

    pub fn into_value(self) -> Result<T> {
        self.inner.into_value()
    }
}
