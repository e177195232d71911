//! In-memory doubles for the host collaborators.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use async_trait::async_trait;
use http::Response;

use crate::cache::KvBackend;
use crate::error::{GawError, GawResult};
use crate::grid::{GridClassification, GridLevel, GridReport, GridSource};
use crate::location::Location;
use crate::pipeline::Origin;

#[derive(Default)]
pub struct MemoryKv {
    entries: RefCell<HashMap<String, (String, u64)>>,
    writes: Cell<usize>,
    failing: bool,
}

impl MemoryKv {
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), (value.to_string(), 0));
    }

    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).map(|(value, _)| value.clone())
    }

    pub fn ttl_of(&self, key: &str) -> Option<u64> {
        self.entries.borrow().get(key).map(|(_, ttl)| *ttl)
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

#[async_trait(?Send)]
impl KvBackend for MemoryKv {
    async fn get(&self, key: &str) -> GawResult<Option<String>> {
        if self.failing {
            return Err(GawError::Kv("store unavailable".to_string()));
        }
        Ok(self.get_raw(key))
    }

    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> GawResult<()> {
        if self.failing {
            return Err(GawError::Kv("store unavailable".to_string()));
        }
        self.writes.set(self.writes.get() + 1);
        self.entries
            .borrow_mut()
            .insert(key.to_string(), (value, ttl_secs));
        Ok(())
    }
}

pub struct CountingSource {
    report: GridReport,
    calls: Cell<usize>,
}

impl CountingSource {
    pub fn level(level: GridLevel) -> Self {
        Self {
            report: GridReport::Success(GridClassification::new("DE", level)),
            calls: Cell::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            report: GridReport::error(message),
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait(?Send)]
impl GridSource for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    async fn classify(&self, _location: &Location) -> GridReport {
        self.calls.set(self.calls.get() + 1);
        self.report.clone()
    }
}

/// Origin that serves a fixed response.
pub struct StaticOrigin {
    status: u16,
    headers: Vec<(&'static str, &'static str)>,
    body: Vec<u8>,
    calls: Cell<usize>,
    fail: bool,
}

impl StaticOrigin {
    pub fn html(body: &str) -> Self {
        Self::new(vec![("content-type", "text/html; charset=utf-8")], body.as_bytes())
    }

    pub fn new(headers: Vec<(&'static str, &'static str)>, body: &[u8]) -> Self {
        Self {
            status: 200,
            headers,
            body: body.to_vec(),
            calls: Cell::new(0),
            fail: false,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn unreachable() -> Self {
        Self {
            fail: true,
            ..Self::new(Vec::new(), b"")
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

#[async_trait(?Send)]
impl Origin for StaticOrigin {
    async fn fetch(&self) -> GawResult<Response<Vec<u8>>> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(GawError::Origin("connection refused".to_string()));
        }
        let mut builder = Response::builder().status(self.status);
        for (name, value) in &self.headers {
            builder = builder.header(*name, *value);
        }
        Ok(builder.body(self.body.clone())?)
    }
}
