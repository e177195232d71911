//! Typed access to the two KV namespaces the plugin uses.
//!
//! - `data` holds JSON classifications keyed by location
//! - `page` holds rendered HTML keyed by level and URL

mod keys;

use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;

use crate::error::{GawError, GawResult};

pub use keys::{page_key, MAX_KV_KEY_BYTES};

pub const DEFAULT_DATA_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_PAGE_TTL_SECS: u64 = 60 * 60 * 24;

pub const DATA_BINDING: &str = "GAW_DATA_KV";
pub const PAGE_BINDING: &str = "GAW_PAGE_KV";

/// A key-value store with per-entry expiry.
///
/// `get` returns `Ok(None)` on a miss. Store failures are `Err`.
#[async_trait(?Send)]
pub trait KvBackend {
    async fn get(&self, key: &str) -> GawResult<Option<String>>;

    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> GawResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Data,
    Page,
}

impl Namespace {
    pub fn binding(&self) -> &'static str {
        match self {
            Namespace::Data => DATA_BINDING,
            Namespace::Page => PAGE_BINDING,
        }
    }

    pub fn default_ttl(&self) -> u64 {
        match self {
            Namespace::Data => DEFAULT_DATA_TTL_SECS,
            Namespace::Page => DEFAULT_PAGE_TTL_SECS,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Data => write!(f, "data"),
            Namespace::Page => write!(f, "page"),
        }
    }
}

/// A cache write the caller issues after the response has been produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DeferredWrite {
    pub namespace: Namespace,
    pub key: String,
    pub value: String,
    pub ttl_secs: u64,
}

/// Both namespaces behind one handle. A namespace without a backend fails
/// every call with `GawError::MissingBinding`.
#[derive(Clone, Default)]
pub struct CacheGateway {
    data: Option<Rc<dyn KvBackend>>,
    page: Option<Rc<dyn KvBackend>>,
}

impl CacheGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, backend: Rc<dyn KvBackend>) -> Self {
        self.data = Some(backend);
        self
    }

    pub fn with_page(mut self, backend: Rc<dyn KvBackend>) -> Self {
        self.page = Some(backend);
        self
    }

    /// Fails if `namespace` has no backend.
    pub fn ensure(&self, namespace: Namespace) -> GawResult<()> {
        self.backend(namespace).map(|_| ())
    }

    fn backend(&self, namespace: Namespace) -> GawResult<&Rc<dyn KvBackend>> {
        let slot = match namespace {
            Namespace::Data => &self.data,
            Namespace::Page => &self.page,
        };
        slot.as_ref()
            .ok_or_else(|| GawError::MissingBinding(namespace.binding()))
    }

    pub async fn get(&self, namespace: Namespace, key: &str) -> GawResult<Option<String>> {
        self.backend(namespace)?.get(key).await
    }

    /// Store `value` under `key`. `None` uses the namespace default TTL.
    pub async fn put(
        &self,
        namespace: Namespace,
        key: &str,
        value: String,
        ttl_secs: Option<u64>,
    ) -> GawResult<()> {
        let ttl = ttl_secs.unwrap_or_else(|| namespace.default_ttl());
        self.backend(namespace)?.put(key, value, ttl).await
    }

    pub async fn apply(&self, write: DeferredWrite) -> GawResult<()> {
        self.put(write.namespace, &write.key, write.value, Some(write.ttl_secs))
            .await
    }

    pub async fn fetch_data(&self, key: &str) -> GawResult<Option<String>> {
        self.get(Namespace::Data, key).await
    }

    pub async fn save_data(&self, key: &str, json: String, ttl_secs: Option<u64>) -> GawResult<()> {
        self.put(Namespace::Data, key, json, ttl_secs).await
    }

    pub async fn fetch_page(&self, key: &str) -> GawResult<Option<String>> {
        self.get(Namespace::Page, key).await
    }

    pub async fn save_page(&self, key: &str, html: String, ttl_secs: Option<u64>) -> GawResult<()> {
        self.put(Namespace::Page, key, html, ttl_secs).await
    }
}
