//! Cursor-paginated key enumeration
//!
//! Walks the keyspace with `SCAN` so no single call lists every key. Pages
//! are not a snapshot: keys written or removed while scanning may or may not
//! show up, and a key can be returned more than once.

use crate::error::Result;
use crate::store::CacheStore;
use futures::Stream;
use std::collections::HashSet;

pub const DEFAULT_PAGE_SIZE: usize = 1000;
pub const MAX_PAGE_SIZE: usize = 10_000;

pub struct KeyScanner<'a, S: CacheStore + ?Sized> {
    store: &'a S,
    pattern: String,
    page_size: usize,
    cursor: u64,
    finished: bool,
}

impl<'a, S: CacheStore + ?Sized> KeyScanner<'a, S> {
    /// Scan keys matching a glob `pattern`, `page_size` keys per request (clamped to `1..=10000`)
    pub fn new(store: &'a S, pattern: impl Into<String>, page_size: usize) -> Self {
        Self {
            store,
            pattern: pattern.into(),
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            cursor: 0,
            finished: false,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Fetch the next page. `None` once the cursor has come back to 0.
    ///
    /// A page may be empty while the scan is still in progress.
    pub async fn next_page(&mut self) -> Result<Option<Vec<String>>> {
        if self.finished {
            return Ok(None);
        }

        let (next, keys) = self
            .store
            .scan(self.cursor, &self.pattern, self.page_size)
            .await?;

        self.cursor = next;
        if next == 0 {
            self.finished = true;
        }
        Ok(Some(keys))
    }

    /// Lazily yield every matching key
    pub fn into_stream(mut self) -> impl Stream<Item = Result<String>> + 'a {
        async_stream::try_stream! {
            while let Some(page) = self.next_page().await? {
                for key in page {
                    yield key;
                }
            }
        }
    }

    /// Drain the scan, dropping duplicate keys
    pub async fn collect_all(mut self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        while let Some(page) = self.next_page().await? {
            for key in page {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        Ok(keys)
    }
}
