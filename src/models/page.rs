//! Paging model module.
//!
//! Request and response bodies of the Xata table query endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body POSTed to `/tables/{table}/query`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryRequest {
    pub page: PageRequest,
}

/// Page selector. `after` is omitted on the first request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl QueryRequest {
    /// Request for the first page.
    pub const fn first(size: u32) -> Self {
        Self {
            page: PageRequest { size, after: None },
        }
    }

    /// Request for the page following `cursor`.
    pub fn after(size: u32, cursor: impl Into<String>) -> Self {
        Self {
            page: PageRequest {
                size,
                after: Some(cursor.into()),
            },
        }
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub meta: ResponseMeta,
    #[serde(default)]
    pub records: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseMeta {
    #[serde(default)]
    pub page: PageMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub more: bool,
}

impl QueryResponse {
    pub const fn has_more(&self) -> bool {
        self.meta.page.more
    }

    /// Cursor of this page, ignoring empty strings.
    pub fn cursor(&self) -> Option<&str> {
        self.meta.page.cursor.as_deref().filter(|c| !c.is_empty())
    }
}
