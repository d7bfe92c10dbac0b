//! Shared normalized-collection state used by every domain store.
//!
//! One [`CollectionState`] holds a server-ordered list, an id-keyed cache
//! that is a superset of the list, the current detail selection, loading
//! flags, pagination and the last surfaced error. Stores wrap it in
//! `Arc<RwLock<_>>` and commit mutations through the methods here so the
//! invariants hold in one place:
//!
//! - every record in `list` is also present in `cache_by_id`
//! - an update replaces the list entry and the cache entry together
//! - a delete removes the record from list, cache, and `current`

use std::collections::HashMap;

use wayfare_core::model::Record;
use wayfare_core::page::{Page, PageQuery};

/// Per-operation-kind loading flags.
///
/// Exactly reflects whether a request of that kind is in flight; actions
/// reset the flag on both the success and the failure path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadingFlags {
    pub list: bool,
    pub detail: bool,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
    pub batch: bool,
    pub statistics: bool,
}

impl LoadingFlags {
    pub fn any(&self) -> bool {
        self.list
            || self.detail
            || self.create
            || self.update
            || self.delete
            || self.batch
            || self.statistics
    }
}

/// Current page window and totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        let query = PageQuery::default();
        Self {
            page: query.page,
            page_size: query.page_size,
            total: 0,
            total_pages: 0,
        }
    }
}

impl Pagination {
    fn recompute_pages(&mut self) {
        self.total_pages = if self.page_size == 0 {
            0
        } else {
            self.total.div_ceil(self.page_size as u64) as u32
        };
    }
}

/// Normalized client-side state for one record collection.
#[derive(Debug, Clone)]
pub struct CollectionState<T: Record> {
    /// Server-ordered current page.
    pub list: Vec<T>,
    /// Currently selected detail record.
    pub current: Option<T>,
    /// Id-keyed cache; superset of `list`.
    pub cache_by_id: HashMap<String, T>,
    pub loading: LoadingFlags,
    pub pagination: Pagination,
    /// Last human-readable error; cleared on the next successful operation.
    pub last_error: Option<String>,
}

impl<T: Record> Default for CollectionState<T> {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            current: None,
            cache_by_id: HashMap::new(),
            loading: LoadingFlags::default(),
            pagination: Pagination::default(),
            last_error: None,
        }
    }
}

impl<T: Record> CollectionState<T> {
    /// Commits a fetched page: replaces the list and totals, and merges
    /// every returned record into the cache (a list fetch refreshes any
    /// cached detail it contains; it never evicts).
    pub fn apply_page(&mut self, page: Page<T>, query: PageQuery) {
        for record in &page.items {
            self.cache_by_id
                .insert(record.id().to_string(), record.clone());
        }
        self.pagination.page = page.page.unwrap_or(query.page);
        self.pagination.page_size = page.page_size.unwrap_or(query.page_size);
        self.pagination.total = page.total;
        match page.total_pages {
            Some(total_pages) => self.pagination.total_pages = total_pages,
            None => self.pagination.recompute_pages(),
        }
        self.list = page.items;
        self.last_error = None;
    }

    /// Commits a created record: head of the list, into the cache, total +1.
    pub fn insert_created(&mut self, record: T) {
        self.cache_by_id
            .insert(record.id().to_string(), record.clone());
        self.list.insert(0, record);
        self.pagination.total += 1;
        self.pagination.recompute_pages();
        self.last_error = None;
    }

    /// Commits an updated record: the list entry keeps its position, the
    /// cache entry and `current` (when showing this id) are replaced with it.
    pub fn apply_updated(&mut self, record: T) {
        if let Some(position) = self.list.iter().position(|r| r.id() == record.id()) {
            self.list[position] = record.clone();
        }
        if self
            .current
            .as_ref()
            .is_some_and(|current| current.id() == record.id())
        {
            self.current = Some(record.clone());
        }
        self.cache_by_id
            .insert(record.id().to_string(), record);
        self.last_error = None;
    }

    /// Commits a deletion. Returns whether the id was known locally.
    pub fn remove(&mut self, id: &str) -> bool {
        let in_list = match self.list.iter().position(|r| r.id() == id) {
            Some(position) => {
                self.list.remove(position);
                true
            }
            None => false,
        };
        let in_cache = self.cache_by_id.remove(id).is_some();
        if self.current.as_ref().is_some_and(|current| current.id() == id) {
            self.current = None;
        }
        self.pagination.total = self.pagination.total.saturating_sub(1);
        self.pagination.recompute_pages();
        self.last_error = None;
        in_list || in_cache
    }

    /// Selects a record as the current detail.
    pub fn select(&mut self, record: T) {
        self.cache_by_id
            .insert(record.id().to_string(), record.clone());
        self.current = Some(record);
    }

    pub fn cached(&self, id: &str) -> Option<&T> {
        self.cache_by_id.get(id)
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Drops all records and resets pagination (logout / plan switch).
    pub fn clear(&mut self) {
        self.list.clear();
        self.current = None;
        self.cache_by_id.clear();
        self.pagination = Pagination::default();
        self.last_error = None;
    }
}
