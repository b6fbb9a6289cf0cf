#![forbid(unsafe_code)]

//! Quota accounting and API key rotation.
//!
//! Every remote call goes through [`QuotaManager::acquire`] before it is sent
//! and [`QuotaManager::charge`] once it succeeded. The ledger is per key: a
//! successful rotation starts the new key at zero usage.

use std::fmt;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::credential_key_name;
use crate::error::CollectError;

/// Lookup of the API key configured for a 1-based index.
pub trait CredentialSource {
    fn credential(&self, index: usize) -> Option<String>;
}

impl<F> CredentialSource for F
where
    F: Fn(usize) -> Option<String>,
{
    fn credential(&self, index: usize) -> Option<String> {
        self(index)
    }
}

/// Units consumed against the active key's daily budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaLedger {
    usage: u64,
    limit: u64,
}

impl QuotaLedger {
    pub fn new(limit: u64) -> Self {
        Self {
            usage: 0,
            limit: limit.max(1),
        }
    }

    /// Returns whether a call of `cost` units still fits in the budget. Does
    /// not consume anything; see [`QuotaLedger::record`].
    pub fn reserve(&self, cost: u64) -> bool {
        self.usage.saturating_add(cost) <= self.limit
    }

    pub fn record(&mut self, cost: u64) {
        self.usage = self.usage.saturating_add(cost);
    }

    pub fn reset(&mut self) {
        self.usage = 0;
    }

    pub fn usage(&self) -> u64 {
        self.usage
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }
}

/// Holds the active API key. Indexes only move forward.
pub struct CredentialRotator<S> {
    source: S,
    active_index: usize,
    active_key: String,
}

// Never prints the key; `S` need not implement Debug.
impl<S> fmt::Debug for CredentialRotator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRotator")
            .field("active_index", &self.active_index)
            .finish_non_exhaustive()
    }
}

impl<S: CredentialSource> CredentialRotator<S> {
    /// Starts at key index 1, which must exist.
    pub fn new(source: S) -> Result<Self, CollectError> {
        let active_key = source
            .credential(1)
            .ok_or_else(|| CollectError::MissingCredential(credential_key_name(1)))?;
        Ok(Self {
            source,
            active_index: 1,
            active_key,
        })
    }

    /// Switches to the next numbered key. A failed probe leaves the rotator
    /// on its current key.
    pub fn rotate(&mut self) -> bool {
        let next = self.active_index + 1;
        match self.source.credential(next) {
            Some(key) => {
                self.active_index = next;
                self.active_key = key;
                true
            }
            None => false,
        }
    }

    pub fn active_index(&self) -> usize {
        self.active_index
    }

    pub fn active_key(&self) -> &str {
        &self.active_key
    }
}

/// Cooperative minimum-interval limiter for this process's calls.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: None,
        }
    }

    /// Sleeps for whatever is left of the interval, then stamps the call.
    pub fn wait(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_call = Some(Instant::now());
    }
}

/// Ledger, rotator and limiter behind one handle owned by the collector.
pub struct QuotaManager<S> {
    ledger: QuotaLedger,
    rotator: CredentialRotator<S>,
    limiter: RateLimiter,
    /// Units charged across every key since creation.
    spent: u64,
}

impl<S> fmt::Debug for QuotaManager<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuotaManager")
            .field("ledger", &self.ledger)
            .field("rotator", &self.rotator)
            .field("limiter", &self.limiter)
            .field("spent", &self.spent)
            .finish()
    }
}

impl<S: CredentialSource> QuotaManager<S> {
    pub fn new(limit: u64, rate_limit_delay: Duration, source: S) -> Result<Self, CollectError> {
        Ok(Self {
            ledger: QuotaLedger::new(limit),
            rotator: CredentialRotator::new(source)?,
            limiter: RateLimiter::new(rate_limit_delay),
            spent: 0,
        })
    }

    /// Clears the way for a call of `cost` units and returns the key to send
    /// it with. Rotates when the active key's budget cannot cover the call.
    pub fn acquire(&mut self, cost: u64) -> Result<String, CollectError> {
        if !self.ledger.reserve(cost) {
            warn!(
                usage = self.ledger.usage(),
                limit = self.ledger.limit(),
                "quota limit reached for key {}",
                self.rotator.active_index()
            );
            self.rotate_or_fail()?;
            if !self.ledger.reserve(cost) {
                return Err(self.exhausted());
            }
        }
        self.limiter.wait();
        Ok(self.rotator.active_key().to_string())
    }

    /// Attributes a successful call to the active key.
    pub fn charge(&mut self, cost: u64) {
        self.ledger.record(cost);
        self.spent = self.spent.saturating_add(cost);
    }

    /// Moves to the next key and resets usage, or fails for good.
    pub fn rotate_or_fail(&mut self) -> Result<(), CollectError> {
        if self.rotator.rotate() {
            self.ledger.reset();
            info!(
                key_index = self.rotator.active_index(),
                "switched to next API key"
            );
            Ok(())
        } else {
            Err(self.exhausted())
        }
    }

    pub fn usage(&self) -> u64 {
        self.ledger.usage()
    }

    pub fn limit(&self) -> u64 {
        self.ledger.limit()
    }

    pub fn spent(&self) -> u64 {
        self.spent
    }

    pub fn active_index(&self) -> usize {
        self.rotator.active_index()
    }

    fn exhausted(&self) -> CollectError {
        CollectError::QuotaExhausted {
            index: self.rotator.active_index(),
            usage: self.ledger.usage(),
            limit: self.ledger.limit(),
        }
    }
}
