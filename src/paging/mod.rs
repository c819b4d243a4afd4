//! Paged listing
//!
//! Turns a two-phase listing protocol (first page, then next page by
//! continuation token) into lazy streams of pages or of items.
//!
//! Pages are fetched strictly one after another and only when the consumer
//! asks for more. Nothing is cached: every call to [`Pageable::pages`] or
//! [`Pageable::items`] starts again from the first page.
//!
//! # Example
//!
//! ```ignore
//! use armkit::paging::{Page, Pageable};
//! use futures::TryStreamExt;
//!
//! let pageable = Pageable::new(
//!     move |_hint| { let c = client.clone(); async move { Page::from_json(c.get(&path).await?) } },
//!     move |token, _hint| { let c = client2.clone(); async move { Page::from_json(c.get_url(token.as_str()).await?) } },
//! );
//! let zones: Vec<Zone> = pageable.items().try_collect().await?;
//! ```

use crate::arm::response::RawResponse;
use crate::error::{Error, Result};
use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Opaque cursor issued by the service
///
/// The client never inspects or validates it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContinuationToken(String);

impl ContinuationToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContinuationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Items from one listing response
#[derive(Debug, Clone)]
pub struct Page<T> {
    items: Vec<T>,
    continuation_token: Option<ContinuationToken>,
    raw: Option<RawResponse>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, continuation_token: Option<ContinuationToken>) -> Self {
        Self {
            items,
            continuation_token,
            raw: None,
        }
    }

    #[must_use]
    pub fn with_raw(mut self, raw: RawResponse) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn continuation_token(&self) -> Option<&ContinuationToken> {
        self.continuation_token.as_ref()
    }

    /// True when no more pages follow this one
    pub fn is_last(&self) -> bool {
        self.continuation_token.is_none()
    }

    pub fn raw_response(&self) -> Option<&RawResponse> {
        self.raw.as_ref()
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            continuation_token: self.continuation_token,
            raw: self.raw,
        }
    }
}

impl<T: DeserializeOwned> Page<T> {
    /// Build a page from a `{"value": [...], "nextLink": "..."}` list response
    pub fn from_json(raw: RawResponse) -> Result<Self> {
        Self::from_json_fields(raw, "value", "nextLink")
    }

    /// Build a page from a list response with custom field names
    ///
    /// An empty body or a missing items field is an empty page; an empty or
    /// null next-link field means this is the last page. A body that is not
    /// valid JSON is [`Error::Decode`].
    pub fn from_json_fields(raw: RawResponse, items_field: &str, next_field: &str) -> Result<Self> {
        let raw = raw.error_for_status()?;
        let mut body: Value = raw.json_body()?.unwrap_or(Value::Null);

        let items = match body.get_mut(items_field).map(Value::take) {
            Some(Value::Null) | None => Vec::new(),
            Some(items) => serde_json::from_value(items)?,
        };

        let continuation_token = body
            .get(next_field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(ContinuationToken::new);

        Ok(Self::new(items, continuation_token).with_raw(raw))
    }
}

type FirstPageFn<T> =
    Arc<dyn Fn(Option<u32>) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync>;
type NextPageFn<T> =
    Arc<dyn Fn(ContinuationToken, Option<u32>) -> BoxFuture<'static, Result<Page<T>>> + Send + Sync>;

enum Cursor {
    Start,
    Continue(ContinuationToken),
    Done,
}

/// Factory for lazy page and item streams
///
/// Built from a first-page function and a next-page function. Both receive
/// the optional page-size hint.
pub struct Pageable<T> {
    first: FirstPageFn<T>,
    next: NextPageFn<T>,
    page_size_hint: Option<u32>,
}

impl<T> Clone for Pageable<T> {
    fn clone(&self) -> Self {
        Self {
            first: Arc::clone(&self.first),
            next: Arc::clone(&self.next),
            page_size_hint: self.page_size_hint,
        }
    }
}

impl<T> fmt::Debug for Pageable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pageable")
            .field("page_size_hint", &self.page_size_hint)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Pageable<T> {
    pub fn new<F1, Fut1, F2, Fut2>(first: F1, next: F2) -> Self
    where
        F1: Fn(Option<u32>) -> Fut1 + Send + Sync + 'static,
        Fut1: Future<Output = Result<Page<T>>> + Send + 'static,
        F2: Fn(ContinuationToken, Option<u32>) -> Fut2 + Send + Sync + 'static,
        Fut2: Future<Output = Result<Page<T>>> + Send + 'static,
    {
        Self {
            first: Arc::new(move |hint| first(hint).boxed()),
            next: Arc::new(move |token, hint| next(token, hint).boxed()),
            page_size_hint: None,
        }
    }

    /// Ask the service for pages of about `hint` items
    #[must_use]
    pub fn with_page_size_hint(mut self, hint: u32) -> Self {
        self.page_size_hint = Some(hint);
        self
    }

    pub fn page_size_hint(&self) -> Option<u32> {
        self.page_size_hint
    }

    /// Fetch the first page
    pub async fn first_page(&self) -> Result<Page<T>> {
        (self.first)(self.page_size_hint).await
    }

    /// Fetch the page following `token`
    pub async fn next_page(&self, token: ContinuationToken) -> Result<Page<T>> {
        (self.next)(token, self.page_size_hint).await
    }

    /// Stream of pages from the first one
    pub fn pages(&self) -> BoxStream<'static, Result<Page<T>>> {
        self.page_stream(Cursor::Start)
    }

    /// Stream of pages resuming at a continuation token from an earlier listing
    pub fn pages_from(&self, token: ContinuationToken) -> BoxStream<'static, Result<Page<T>>> {
        self.page_stream(Cursor::Continue(token))
    }

    /// Stream of items across all pages, in service order
    pub fn items(&self) -> BoxStream<'static, Result<T>> {
        self.pages()
            .map_ok(|page| stream::iter(page.into_items().into_iter().map(Ok::<T, Error>)))
            .try_flatten()
            .boxed()
    }

    /// Drain every page into one vector
    pub async fn collect_items(&self) -> Result<Vec<T>> {
        self.items().try_collect().await
    }

    fn page_stream(&self, start: Cursor) -> BoxStream<'static, Result<Page<T>>> {
        let first = Arc::clone(&self.first);
        let next = Arc::clone(&self.next);
        let hint = self.page_size_hint;

        stream::try_unfold(start, move |cursor| {
            let fetch = match cursor {
                Cursor::Done => None,
                Cursor::Start => Some(first(hint)),
                Cursor::Continue(token) => Some(next(token, hint)),
            };

            async move {
                let Some(fetch) = fetch else {
                    return Ok(None);
                };

                // An error ends the stream after it is yielded
                let page = fetch.await?;
                tracing::trace!(
                    "Fetched page with {} items (more: {})",
                    page.items.len(),
                    !page.is_last()
                );

                let cursor = match page.continuation_token() {
                    Some(token) => Cursor::Continue(token.clone()),
                    None => Cursor::Done,
                };
                Ok(Some((page, cursor)))
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderMap;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves scripted pages; page `i` is linked to page `i + 1` by token "p{i+1}"
    #[derive(Clone)]
    struct FakeService {
        pages: Arc<Vec<Vec<u32>>>,
        calls: Arc<AtomicUsize>,
        seen_tokens: Arc<Mutex<Vec<String>>>,
        fail_on_token: Option<&'static str>,
    }

    impl FakeService {
        fn new(pages: Vec<Vec<u32>>) -> Self {
            Self {
                pages: Arc::new(pages),
                calls: Arc::new(AtomicUsize::new(0)),
                seen_tokens: Arc::new(Mutex::new(Vec::new())),
                fail_on_token: None,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn page(&self, index: usize) -> Result<Page<u32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let items = self.pages.get(index).cloned().unwrap_or_default();
            let token = (index + 1 < self.pages.len())
                .then(|| ContinuationToken::new(format!("p{}", index + 1)));
            Ok(Page::new(items, token))
        }

        fn pageable(&self) -> Pageable<u32> {
            let first = self.clone();
            let next = self.clone();
            Pageable::new(
                move |_hint| {
                    let svc = first.clone();
                    async move { svc.page(0) }
                },
                move |token: ContinuationToken, _hint| {
                    let svc = next.clone();
                    async move {
                        svc.seen_tokens.lock().unwrap().push(token.to_string());
                        if svc.fail_on_token == Some(token.as_str()) {
                            svc.calls.fetch_add(1, Ordering::SeqCst);
                            return Err(Error::transport("connection reset", "reset by peer"));
                        }
                        let index = token.as_str()[1..].parse::<usize>().unwrap();
                        svc.page(index)
                    }
                },
            )
        }
    }

    #[tokio::test]
    async fn test_items_concatenate_pages_in_order() {
        let svc = FakeService::new(vec![vec![1, 2], vec![3], vec![4, 5, 6]]);

        let items = svc.pageable().collect_items().await.unwrap();

        assert_eq!(items, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(svc.calls(), 3);
        assert_eq!(*svc.seen_tokens.lock().unwrap(), vec!["p1", "p2"]);
    }

    #[tokio::test]
    async fn test_fetches_are_lazy() {
        let svc = FakeService::new(vec![vec![1, 2], vec![3, 4]]);
        let mut items = svc.pageable().items();

        assert_eq!(svc.calls(), 0);
        assert_eq!(items.next().await.unwrap().unwrap(), 1);
        assert_eq!(svc.calls(), 1);
        assert_eq!(items.next().await.unwrap().unwrap(), 2);
        assert_eq!(svc.calls(), 1);
        assert_eq!(items.next().await.unwrap().unwrap(), 3);
        assert_eq!(svc.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_first_page_yields_nothing() {
        let svc = FakeService::new(vec![vec![]]);

        let items = svc.pageable().collect_items().await.unwrap();

        assert!(items.is_empty());
        assert_eq!(svc.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_page_with_token_continues() {
        let svc = FakeService::new(vec![vec![], vec![7]]);

        let items = svc.pageable().collect_items().await.unwrap();

        assert_eq!(items, vec![7]);
        assert_eq!(svc.calls(), 2);
    }

    #[tokio::test]
    async fn test_reiteration_refetches() {
        let svc = FakeService::new(vec![vec![1], vec![2]]);
        let pageable = svc.pageable();

        let first = pageable.collect_items().await.unwrap();
        assert_eq!(svc.calls(), 2);
        let second = pageable.collect_items().await.unwrap();
        assert_eq!(svc.calls(), 4);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_error_is_yielded_once_and_ends_stream() {
        let mut svc = FakeService::new(vec![vec![1], vec![2], vec![3]]);
        svc.fail_on_token = Some("p1");
        let mut items = svc.pageable().items();

        assert_eq!(items.next().await.unwrap().unwrap(), 1);
        let err = items.next().await.unwrap().unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert!(items.next().await.is_none());
        assert_eq!(svc.calls(), 2);
    }

    #[tokio::test]
    async fn test_pages_from_resumes_at_token() {
        let svc = FakeService::new(vec![vec![1], vec![2], vec![3]]);

        let pages: Vec<Page<u32>> = svc
            .pageable()
            .pages_from(ContinuationToken::new("p1"))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].items(), &[2]);
        assert!(pages[1].is_last());
        assert_eq!(svc.calls(), 2);
    }

    #[tokio::test]
    async fn test_first_and_next_page_direct() {
        let svc = FakeService::new(vec![vec![1], vec![2]]);
        let pageable = svc.pageable();

        let first = pageable.first_page().await.unwrap();
        let token = first.continuation_token().cloned().unwrap();
        let second = pageable.next_page(token).await.unwrap();

        assert_eq!(second.items(), &[2]);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_page_size_hint_is_forwarded() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let first_seen = Arc::clone(&seen);
        let next_seen = Arc::clone(&seen);
        let pageable = Pageable::new(
            move |hint| {
                first_seen.lock().unwrap().push(hint);
                async { Ok(Page::new(vec![1u8], Some(ContinuationToken::new("n")))) }
            },
            move |_token, hint| {
                next_seen.lock().unwrap().push(hint);
                async { Ok(Page::new(vec![2u8], None)) }
            },
        )
        .with_page_size_hint(25);

        pageable.collect_items().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![Some(25), Some(25)]);
    }

    #[test]
    fn test_page_from_json() {
        let raw = RawResponse::from_json(
            200,
            &json!({"value": [1, 2, 3], "nextLink": "https://mgmt.example/next?skip=3"}),
        );
        let page: Page<u32> = Page::from_json(raw).unwrap();

        assert_eq!(page.items(), &[1, 2, 3]);
        assert_eq!(
            page.continuation_token().unwrap().as_str(),
            "https://mgmt.example/next?skip=3"
        );
        assert_eq!(page.raw_response().unwrap().status(), 200);
    }

    #[test]
    fn test_page_from_json_last_page() {
        let raw = RawResponse::from_json(200, &json!({"value": [], "nextLink": null}));
        let page: Page<u32> = Page::from_json(raw).unwrap();
        assert!(page.items().is_empty());
        assert!(page.is_last());

        let raw = RawResponse::new(200, HeaderMap::new(), b"{}".to_vec());
        let page: Page<u32> = Page::from_json(raw).unwrap();
        assert!(page.is_last());
    }

    #[test]
    fn test_page_from_json_error_status() {
        let raw = RawResponse::from_json(403, &json!({"error": {"code": "AuthorizationFailed"}}));
        let err = Page::<u32>::from_json(raw).unwrap_err();
        assert_eq!(err.status(), Some(403));
    }

    #[test]
    fn test_page_from_json_truncated_body() {
        let raw = RawResponse::new(
            200,
            HeaderMap::new(),
            br#"{"value": [1, 2, 3], "nextLink": "htt"#.to_vec(),
        );
        let err = Page::<u32>::from_json(raw).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_page_from_json_empty_body() {
        let raw = RawResponse::new(200, HeaderMap::new(), Vec::new());
        let page: Page<u32> = Page::from_json(raw).unwrap();
        assert!(page.items().is_empty());
        assert!(page.is_last());
    }
}
