//! The rate-limited expiry check pipeline.
//!
//! This module provides [`ExpiryChecker`], which walks a batch of domain records
//! strictly in input order, answers what it can from the freshness cache, paces
//! and time-boxes the remaining lookups, and classifies every resolved date
//! against the alert window.
//!
//! Per record the pass goes through:
//!
//! 1. an empty name is a failure; an explicit expiry on the record is parsed,
//!    cached and classified with no lookup
//! 2. a name unfit for a registry query (whitespace, `|`): failure
//! 3. cache hit far enough in the future: skip entirely
//! 4. cache hit near/past expiry or unparsable: evict and look up again
//! 5. pace, look up, resolve the response, refresh cache, classify
//!
//! Lookup and extraction problems become failure records. Only cancellation
//! stops the pass early; persistence errors are reported after the loop.

use crate::cache::ExpiryCacheStore;
use crate::cancel::CancelSignal;
use crate::error::ExpiryCheckError;
use crate::extract::{format_date, parse_expiry_date, resolve_expiry_date, snippet};
use crate::gateway::LookupGateway;
use crate::persistence::ExpiryRepository;
use crate::types::{CheckAborted, CheckConfig, CheckReport, DomainRecord, FailureRecord};
use crate::utils::{cache_key, expiry_instant, normalize_key, validate_domain};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Source of "now" for expiry arithmetic.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Main checker that runs expiry check passes.
///
/// # Example
///
/// ```rust,no_run
/// use expiry_check_lib::{
///     CancelSignal, CheckConfig, DomainRecord, ExpiryChecker, FileRepository, RegistryLookup,
/// };
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let checker = ExpiryChecker::builder()
///         .config(CheckConfig::default().with_alert_days(30))
///         .gateway(Arc::new(RegistryLookup::new()?))
///         .repository(Arc::new(FileRepository::new(
///             "expiring.txt",
///             "failures.txt",
///             "expiry_cache.txt",
///         )))
///         .build()?;
///
///     let domains = vec![DomainRecord::new("example.com", "manual")];
///     let report = checker.check(&CancelSignal::never(), domains).await?;
///     println!("{} expiring, {} failed", report.expiring.len(), report.failures.len());
///     Ok(())
/// }
/// ```
pub struct ExpiryChecker {
    config: CheckConfig,
    gateway: Arc<dyn LookupGateway>,
    repository: Arc<dyn ExpiryRepository>,
    clock: Arc<dyn Clock>,
}

/// Builder for [`ExpiryChecker`]; both collaborators are required.
#[derive(Default)]
pub struct ExpiryCheckerBuilder {
    config: CheckConfig,
    gateway: Option<Arc<dyn LookupGateway>>,
    repository: Option<Arc<dyn ExpiryRepository>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ExpiryCheckerBuilder {
    pub fn config(mut self, config: CheckConfig) -> Self {
        self.config = config;
        self
    }

    pub fn gateway(mut self, gateway: Arc<dyn LookupGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn repository(mut self, repository: Arc<dyn ExpiryRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Override the clock (tests pin "now" with this).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the checker, failing if a collaborator is missing.
    pub fn build(self) -> Result<ExpiryChecker, ExpiryCheckError> {
        let gateway = self
            .gateway
            .ok_or_else(|| ExpiryCheckError::missing_dependency("lookup gateway"))?;
        let repository = self
            .repository
            .ok_or_else(|| ExpiryCheckError::missing_dependency("expiry repository"))?;

        Ok(ExpiryChecker {
            config: self.config,
            gateway,
            repository,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

impl ExpiryChecker {
    /// Start building a checker.
    pub fn builder() -> ExpiryCheckerBuilder {
        ExpiryCheckerBuilder::default()
    }

    /// Get the configuration for this checker.
    pub fn config(&self) -> &CheckConfig {
        &self.config
    }

    /// Run one pass over `domains`.
    ///
    /// On success the expiring and failure outputs have been persisted (even
    /// when empty) and the cache has been saved if the pass changed it.
    ///
    /// # Errors
    ///
    /// Returns [`CheckAborted`] carrying the results accumulated so far when
    /// the pass is cancelled (nothing is persisted in that case) or when
    /// saving an output fails.
    pub async fn check(
        &self,
        cancel: &CancelSignal,
        domains: Vec<DomainRecord>,
    ) -> Result<CheckReport, CheckAborted> {
        let mut pass = Pass {
            checker: self,
            cache: self.load_cache().await,
            pacer: Pacer::new(self.config.rate_limit),
            alert_within: TimeDelta::from_std(self.config.effective_alert_within())
                .unwrap_or(TimeDelta::MAX),
            report: CheckReport::default(),
        };

        info!(
            domains = domains.len(),
            cached = pass.cache.len(),
            "expiry check pass started"
        );

        for record in domains {
            if let Err(error) = pass.check_record(cancel, record).await {
                warn!(%error, "expiry check pass aborted");
                return Err(CheckAborted::new(pass.report, error));
            }
        }

        let Pass { cache, report, .. } = pass;
        if let Err(error) = self.persist(&report, &cache).await {
            return Err(CheckAborted::new(report, error));
        }

        info!(
            expiring = report.expiring.len(),
            failures = report.failures.len(),
            lookups = report.lookups,
            cache_hits = report.cache_hits,
            "expiry check pass finished"
        );
        Ok(report)
    }

    async fn load_cache(&self) -> ExpiryCacheStore {
        match ExpiryCacheStore::load(self.repository.as_ref()).await {
            Ok(cache) => cache,
            Err(error) => {
                warn!(%error, "expiry cache unreadable, starting empty");
                ExpiryCacheStore::new()
            }
        }
    }

    async fn persist(
        &self,
        report: &CheckReport,
        cache: &ExpiryCacheStore,
    ) -> Result<(), ExpiryCheckError> {
        self.repository.save_expiring(&report.expiring).await?;
        self.repository.save_failures(&report.failures).await?;
        if cache.is_dirty() {
            cache.save(self.repository.as_ref()).await?;
        }
        Ok(())
    }

    /// One gateway call bounded by the query timeout and the pass signal.
    async fn lookup(&self, cancel: &CancelSignal, domain: &str) -> Result<String, ExpiryCheckError> {
        let timeout = self.config.query_timeout;
        let bounded = async {
            if timeout.is_zero() {
                return self.gateway.query(domain).await;
            }
            match tokio::time::timeout(timeout, self.gateway.query(domain)).await {
                Ok(result) => result,
                Err(_) => Err(ExpiryCheckError::timeout(
                    format!("lookup for {}", domain),
                    timeout,
                )),
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExpiryCheckError::cancelled(format!("lookup for {}", domain))),
            result = bounded => result,
        }
    }
}

/// Working state of a single pass.
struct Pass<'a> {
    checker: &'a ExpiryChecker,
    cache: ExpiryCacheStore,
    pacer: Pacer,
    alert_within: TimeDelta,
    report: CheckReport,
}

impl Pass<'_> {
    /// Process one record. Only pass-level conditions are returned as errors.
    async fn check_record(
        &mut self,
        cancel: &CancelSignal,
        record: DomainRecord,
    ) -> Result<(), ExpiryCheckError> {
        let domain = normalize_key(&record.domain);
        let source = record.source.trim().to_string();

        if domain.is_empty() {
            warn!(source = %source, "invalid_domain empty name");
            self.fail(&domain, &source);
            return Ok(());
        }

        if let Some(explicit) = record.explicit_expiry() {
            match parse_expiry_date(explicit) {
                Some(date) => {
                    self.cache.refresh(&domain, &source, date);
                    self.classify(&domain, &source, date);
                }
                None => {
                    warn!(domain = %domain, expiry = %explicit, "explicit_expiry_invalid");
                    self.fail(&domain, &source);
                }
            }
            return Ok(());
        }

        // Names a registry would reject are never sent to the gateway.
        if let Err(error) = validate_domain(&domain) {
            warn!(domain = %record.domain, %error, "invalid_domain");
            self.fail(&domain, &source);
            return Ok(());
        }

        let key = cache_key(&domain, &source);
        if let Some(cached) = self.cache.get(&key) {
            match parse_expiry_date(cached) {
                Some(date) if !self.is_expiring(date) => {
                    debug!(domain = %domain, expiry = %cached, "cache_hit");
                    self.report.cache_hits += 1;
                    return Ok(());
                }
                Some(_) => debug!(domain = %domain, expiry = %cached, "cache_evicted near expiry"),
                None => warn!(domain = %domain, expiry = %cached, "cache_evicted unparsable"),
            }
            self.cache.evict(&key);
        }

        self.pacer.pace(cancel).await?;
        self.report.lookups += 1;

        let response = match self.checker.lookup(cancel, &domain).await {
            Ok(response) => response,
            Err(error) if error.is_cancellation() => return Err(error),
            Err(error) => {
                warn!(domain = %domain, %error, "lookup_failed");
                self.fail(&domain, &source);
                return Ok(());
            }
        };

        match resolve_response(&domain, &response) {
            Ok(date) => {
                debug!(domain = %domain, expiry = %format_date(date), "expiry resolved");
                self.cache.refresh(&domain, &source, date);
                self.classify(&domain, &source, date);
            }
            Err(error) => {
                warn!(
                    domain = %domain,
                    %error,
                    response = %snippet(&response, 300),
                    "extract_failed"
                );
                self.fail(&domain, &source);
            }
        }

        Ok(())
    }

    fn is_expiring(&self, date: NaiveDate) -> bool {
        expiry_instant(date) - self.checker.clock.now() <= self.alert_within
    }

    fn classify(&mut self, domain: &str, source: &str, date: NaiveDate) {
        if self.is_expiring(date) {
            self.report
                .expiring
                .push(DomainRecord::new(domain, source).with_expiry(format_date(date)));
        }
    }

    fn fail(&mut self, domain: &str, source: &str) {
        self.report.failures.push(FailureRecord::new(domain, source));
    }
}

/// A gateway may answer with a normalized date or with raw registry text.
fn resolve_response(domain: &str, response: &str) -> Result<NaiveDate, ExpiryCheckError> {
    parse_expiry_date(response)
        .or_else(|| resolve_expiry_date(response))
        .ok_or_else(|| ExpiryCheckError::extraction(domain, "no expiry date next to an expiry label"))
}

/// Spaces lookups at least `period` apart, start to start.
struct Pacer {
    period: Duration,
    ticker: Option<Interval>,
}

impl Pacer {
    fn new(period: Duration) -> Self {
        Self {
            period,
            ticker: None,
        }
    }

    /// Wait for the next slot. The first lookup of a pass never waits.
    async fn pace(&mut self, cancel: &CancelSignal) -> Result<(), ExpiryCheckError> {
        if self.period.is_zero() {
            return Ok(());
        }

        let Some(ticker) = self.ticker.as_mut() else {
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.ticker = Some(ticker);
            return Ok(());
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ExpiryCheckError::cancelled("rate limit wait")),
            _ = ticker.tick() => Ok(()),
        }
    }
}
