//! Lazy iteration over paged collections.
//!
//! Targets return collections in bounded pages. [`ItemIterator`] holds one
//! page at a time and fetches the next one when the buffered items run out,
//! either by echoing the continuation token of the previous page or, for
//! sorted queries, by advancing an offset.
//!
//! Offset paging assumes the target orders the collection the same way on
//! every request. Items created or deleted between two page fetches can be
//! skipped or returned twice; nothing here compensates for that.

use std::collections::VecDeque;
use std::fmt;

use tracing::{debug, warn};

use crate::ClientError;
use crate::params::ListParams;
use crate::response::Page;

/// Fetches one page for the given replay arguments.
///
/// `Ok(None)` stands for a successful response without a body.
pub type PageFetcher<T> =
    Box<dyn FnMut(&ListParams) -> Result<Option<Page<T>>, ClientError> + Send>;

/// Outcome of one [`ItemIterator::advance`] call.
#[derive(Debug)]
pub enum Step<T> {
    Item(T),
    End,
    /// Fetching a follow-up page failed. The iterator is finished afterwards.
    Error(ClientError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    ContinuationToken,
    Offset,
}

/// Forward-only, single-pass iterator over every item of a paged query.
///
/// As an [`Iterator`] it yields `Result<T, ClientError>`: a failed page fetch
/// is reported once and ends the sequence. Use [`ItemIterator::lenient`] to
/// get bare items with failures treated as the end of the collection.
pub struct ItemIterator<T> {
    fetch: PageFetcher<T>,
    params: ListParams,
    cursor: Cursor,
    items: VecDeque<T>,
    page_len: usize,
    yielded: u64,
    continuation_token: Option<String>,
    total_item_count: Option<u64>,
    more_items_remaining: Option<bool>,
    x_request_id: String,
    finished: bool,
}

impl<T> ItemIterator<T> {
    /// Wraps the first page of a query.
    ///
    /// `params` are the arguments the first page was requested with and
    /// `x_request_id` the correlation id it was sent with; both are replayed
    /// for every further page.
    pub fn new(
        fetch: PageFetcher<T>,
        params: ListParams,
        first_page: Page<T>,
        x_request_id: impl Into<String>,
    ) -> Self {
        let Page {
            items,
            continuation_token,
            total_item_count,
            more_items_remaining,
        } = first_page;

        let cursor = if params.is_sorted()
            || (continuation_token.is_none() && more_items_remaining == Some(true))
        {
            Cursor::Offset
        } else {
            Cursor::ContinuationToken
        };
        let more_items_remaining = match cursor {
            Cursor::ContinuationToken => Some(continuation_token.is_some()),
            Cursor::Offset => more_items_remaining.or(Some(continuation_token.is_some())),
        };

        Self {
            fetch,
            params,
            cursor,
            page_len: items.len(),
            items: items.into(),
            yielded: 0,
            continuation_token,
            total_item_count,
            more_items_remaining,
            x_request_id: x_request_id.into(),
            finished: false,
        }
    }

    /// Produces the next item, the end of the sequence, or a fetch failure.
    pub fn advance(&mut self) -> Step<T> {
        if self.finished {
            return Step::End;
        }
        if self.params.limit.is_some_and(|limit| self.yielded >= limit) {
            return self.finish();
        }
        if self
            .total_item_count
            .is_some_and(|total| self.yielded >= total)
        {
            return self.finish();
        }

        if self.items.is_empty() {
            if self.more_items_remaining == Some(false) {
                return self.finish();
            }
            if let Err(error) = self.fetch_next_page() {
                self.finished = true;
                return Step::Error(error);
            }
        }

        match self.items.pop_front() {
            Some(item) => {
                self.yielded += 1;
                Step::Item(item)
            }
            None => self.finish(),
        }
    }

    /// Best known size of the collection.
    ///
    /// This is `total_item_count` when the target reported one. Otherwise it
    /// is the size of the page currently buffered, which is only a lower
    /// bound.
    pub fn len(&self) -> usize {
        self.total_item_count
            .and_then(|total| usize::try_from(total).ok())
            .unwrap_or(self.page_len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_item_count(&self) -> Option<u64> {
        self.total_item_count
    }

    pub fn continuation_token(&self) -> Option<&str> {
        self.continuation_token.as_deref()
    }

    /// Correlation id shared by every page of this query.
    pub fn x_request_id(&self) -> &str {
        &self.x_request_id
    }

    /// Number of items handed out so far.
    pub fn consumed(&self) -> u64 {
        self.yielded
    }

    /// Switches to bare items, ending quietly if a page fetch fails.
    pub fn lenient(self) -> LenientItems<T> {
        LenientItems {
            inner: self,
            error: None,
        }
    }

    fn finish(&mut self) -> Step<T> {
        self.finished = true;
        Step::End
    }

    fn fetch_next_page(&mut self) -> Result<(), ClientError> {
        let mut params = self.params.clone();
        match self.cursor {
            Cursor::ContinuationToken => {
                params.continuation_token = self.continuation_token.clone();
                params.offset = None;
            }
            Cursor::Offset => {
                params.continuation_token = None;
                params.offset = Some(self.params.offset.unwrap_or(0) + self.yielded);
            }
        }
        params.x_request_id = Some(self.x_request_id.clone());

        debug!(
            x_request_id = %self.x_request_id,
            offset = ?params.offset,
            continuation_token = ?params.continuation_token,
            "fetching next page"
        );

        let Some(page) = (self.fetch)(&params)? else {
            self.more_items_remaining = Some(false);
            self.items.clear();
            self.page_len = 0;
            return Ok(());
        };

        if page.total_item_count.is_some() {
            self.total_item_count = page.total_item_count;
        }
        self.more_items_remaining = match self.cursor {
            Cursor::ContinuationToken => Some(page.continuation_token.is_some()),
            Cursor::Offset => page
                .more_items_remaining
                .or(Some(page.continuation_token.is_some())),
        };
        self.continuation_token = page.continuation_token;
        self.page_len = page.items.len();
        self.items = page.items.into();
        Ok(())
    }
}

impl<T> Iterator for ItemIterator<T> {
    type Item = Result<T, ClientError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Step::Item(item) => Some(Ok(item)),
            Step::End => None,
            Step::Error(error) => Some(Err(error)),
        }
    }
}

impl<T> std::iter::FusedIterator for ItemIterator<T> {}

impl<T> fmt::Debug for ItemIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemIterator")
            .field("cursor", &self.cursor)
            .field("buffered", &self.items.len())
            .field("yielded", &self.yielded)
            .field("total_item_count", &self.total_item_count)
            .field("more_items_remaining", &self.more_items_remaining)
            .field("x_request_id", &self.x_request_id)
            .finish_non_exhaustive()
    }
}

/// Item iterator that treats a failed page fetch as the end of the sequence.
///
/// The failure is kept and can be inspected with [`LenientItems::error`] to
/// tell a truncated listing from a complete one.
#[derive(Debug)]
pub struct LenientItems<T> {
    inner: ItemIterator<T>,
    error: Option<ClientError>,
}

impl<T> LenientItems<T> {
    /// The fetch failure that ended iteration early, if any.
    pub fn error(&self) -> Option<&ClientError> {
        self.error.as_ref()
    }

    pub fn into_inner(self) -> ItemIterator<T> {
        self.inner
    }
}

impl<T> Iterator for LenientItems<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self.inner.advance() {
            Step::Item(item) => Some(item),
            Step::End => None,
            Step::Error(error) => {
                warn!(
                    x_request_id = %self.inner.x_request_id,
                    consumed = self.inner.yielded,
                    %error,
                    "page fetch failed, ending iteration"
                );
                self.error = Some(error);
                None
            }
        }
    }
}

impl<T> std::iter::FusedIterator for LenientItems<T> {}
