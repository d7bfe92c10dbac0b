//! List pagination types and list-envelope normalization.
//!
//! The backend answers list endpoints in two coexisting shapes:
//! `{records, total}` and `{data, meta: {currentPage, pageSize, total,
//! totalPages}}`. Both deserialize into one [`Page`] here so nothing
//! downstream ever branches on the wire shape.

use serde::{Deserialize, Serialize};

/// Query-side pagination parameters sent with every list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

impl PageQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self { page, page_size }
    }

    /// Renders the parameters as query-string pairs.
    pub fn to_query(self) -> Vec<(String, String)> {
        vec![
            ("page".to_string(), self.page.to_string()),
            ("pageSize".to_string(), self.page_size.to_string()),
        ]
    }
}

/// One page of records, normalized from either server list convention.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// Present only when the server used the `{data, meta}` convention.
    pub page: Option<u32>,
    pub page_size: Option<u32>,
    pub total_pages: Option<u32>,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageMeta {
    #[serde(default)]
    current_page: Option<u32>,
    #[serde(default)]
    page_size: Option<u32>,
    total: u64,
    #[serde(default)]
    total_pages: Option<u32>,
}

/// The two wire shapes, tried in order. Serde picks whichever matches.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPage<T> {
    Flat {
        records: Vec<T>,
        total: u64,
    },
    WithMeta {
        data: Vec<T>,
        meta: PageMeta,
    },
    /// Some endpoints return a bare array; total falls back to the length.
    Bare(Vec<T>),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Page<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawPage::deserialize(deserializer)?;
        Ok(match raw {
            RawPage::Flat { records, total } => Page {
                items: records,
                total,
                page: None,
                page_size: None,
                total_pages: None,
            },
            RawPage::WithMeta { data, meta } => Page {
                items: data,
                total: meta.total,
                page: meta.current_page,
                page_size: meta.page_size,
                total_pages: meta.total_pages,
            },
            RawPage::Bare(items) => {
                let total = items.len() as u64;
                Page {
                    items,
                    total,
                    page: None,
                    page_size: None,
                    total_pages: None,
                }
            }
        })
    }
}
