//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use expiry_check_lib::{
    Clock, DomainRecord, ExpiryCheckError, ExpiryRepository, FailureRecord, LookupGateway,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// A clock pinned to one instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// 2026-01-01T12:00:00Z
pub fn noon_new_year() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()
}

/// Answers every query with the same text and records when it was called.
pub struct CountingGateway {
    response: String,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl CountingGateway {
    pub fn new<S: Into<String>>(response: S) -> Self {
        Self {
            response: response.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn queried_domains(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(domain, _)| domain.clone())
            .collect()
    }

    pub fn call_instants(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl LookupGateway for CountingGateway {
    async fn query(&self, domain: &str) -> Result<String, ExpiryCheckError> {
        self.calls
            .lock()
            .unwrap()
            .push((domain.to_string(), Instant::now()));
        Ok(self.response.clone())
    }
}

/// Per-domain canned answers; unknown domains fail.
#[derive(Default)]
pub struct ScriptedGateway {
    answers: HashMap<String, Result<String, ExpiryCheckError>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer<S: Into<String>>(mut self, domain: &str, response: S) -> Self {
        self.answers.insert(domain.to_string(), Ok(response.into()));
        self
    }

    pub fn fail(mut self, domain: &str, message: &str) -> Self {
        self.answers.insert(
            domain.to_string(),
            Err(ExpiryCheckError::lookup(domain, message)),
        );
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LookupGateway for ScriptedGateway {
    async fn query(&self, domain: &str) -> Result<String, ExpiryCheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(domain)
            .cloned()
            .unwrap_or_else(|| Err(ExpiryCheckError::lookup(domain, "no scripted answer")))
    }
}

/// Sleeps before answering.
pub struct SlowGateway {
    delay: Duration,
    response: String,
    calls: AtomicUsize,
}

impl SlowGateway {
    pub fn new<S: Into<String>>(delay: Duration, response: S) -> Self {
        Self {
            delay,
            response: response.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LookupGateway for SlowGateway {
    async fn query(&self, _domain: &str) -> Result<String, ExpiryCheckError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(self.response.clone())
    }
}

/// In-memory repository that records every save.
#[derive(Default)]
pub struct MemoryRepository {
    cache: Mutex<Vec<DomainRecord>>,
    cache_saves: AtomicUsize,
    expiring: Mutex<Option<Vec<DomainRecord>>>,
    failures: Mutex<Option<Vec<FailureRecord>>>,
    fail_load: bool,
    fail_save_expiring: bool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(rows: Vec<DomainRecord>) -> Self {
        Self {
            cache: Mutex::new(rows),
            ..Self::default()
        }
    }

    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn failing_expiring_save() -> Self {
        Self {
            fail_save_expiring: true,
            ..Self::default()
        }
    }

    pub fn cache_rows(&self) -> Vec<DomainRecord> {
        self.cache.lock().unwrap().clone()
    }

    pub fn cache_saves(&self) -> usize {
        self.cache_saves.load(Ordering::SeqCst)
    }

    /// `None` until the expiring output has been written.
    pub fn saved_expiring(&self) -> Option<Vec<DomainRecord>> {
        self.expiring.lock().unwrap().clone()
    }

    /// `None` until the failures output has been written.
    pub fn saved_failures(&self) -> Option<Vec<FailureRecord>> {
        self.failures.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExpiryRepository for MemoryRepository {
    async fn load_expiry_cache(&self) -> Result<Vec<DomainRecord>, ExpiryCheckError> {
        if self.fail_load {
            return Err(ExpiryCheckError::persistence("memory", "load refused"));
        }
        Ok(self.cache_rows())
    }

    async fn save_expiry_cache(&self, entries: &[DomainRecord]) -> Result<(), ExpiryCheckError> {
        self.cache_saves.fetch_add(1, Ordering::SeqCst);
        *self.cache.lock().unwrap() = entries.to_vec();
        Ok(())
    }

    async fn save_expiring(&self, entries: &[DomainRecord]) -> Result<(), ExpiryCheckError> {
        if self.fail_save_expiring {
            return Err(ExpiryCheckError::persistence("memory", "disk full"));
        }
        *self.expiring.lock().unwrap() = Some(entries.to_vec());
        Ok(())
    }

    async fn save_failures(&self, entries: &[FailureRecord]) -> Result<(), ExpiryCheckError> {
        *self.failures.lock().unwrap() = Some(entries.to_vec());
        Ok(())
    }
}
