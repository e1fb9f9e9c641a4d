//! One-time-password sign-in over SMS.
//!
//! Attempts are rate limited per phone number with the counters stored in the
//! remote tree under `settings/otpAttempts/<phone>`, so every client shares
//! the same quota.

mod gateway;

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub use gateway::{HttpSmsGateway, SmsGateway};

use crate::models::Collection;
use crate::remote::RemoteTree;
use crate::session::AuthError;
use crate::sync::DEFAULT_TIMEOUT;
use crate::util::join_path;
use crate::{Error, Result};

const CODE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpLimits {
    /// Minimum gap between two sends to the same number
    pub cooldown: Duration,
    /// Sends allowed per window
    pub max_per_window: u32,
    pub window: Duration,
}

impl Default for OtpLimits {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(60),
            max_per_window: 5,
            window: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Stored attempt counter for one phone number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub count: u32,
    pub window_started_at: DateTime<Utc>,
    pub last_sent_at: DateTime<Utc>,
}

/// Normalize a phone number to `+?digits` or reject it.
pub fn normalize_phone(phone: &str) -> Result<String> {
    let compact: String = phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let pattern = Regex::new(r"^\+?[0-9]{10,15}$")
        .map_err(|error| Error::Config(format!("phone pattern: {error}")))?;
    if pattern.is_match(&compact) {
        Ok(compact)
    } else {
        Err(Error::Validation(format!("'{}' is not a valid phone number", phone.trim())))
    }
}

#[derive(Debug, Clone)]
pub struct OtpRateLimiter<T> {
    tree: T,
    limits: OtpLimits,
    timeout: Duration,
}

impl<T: RemoteTree> OtpRateLimiter<T> {
    pub fn new(tree: T) -> Self {
        Self {
            tree,
            limits: OtpLimits::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Bound on each read and write of the attempt record.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: OtpLimits) -> Self {
        self.limits = limits;
        self
    }

    pub async fn check(&self, phone: &str) -> Result<()> {
        self.check_at(phone, Utc::now()).await
    }

    /// Fail with [`Error::RateLimit`] while `phone` is cooling down or out
    /// of quota.
    pub async fn check_at(&self, phone: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(record) = self.load(phone).await? else {
            return Ok(());
        };

        if now - record.window_started_at < to_delta(self.limits.window)
            && record.count >= self.limits.max_per_window
        {
            return Err(Error::RateLimit(format!(
                "at most {} codes per day may be sent to this number",
                self.limits.max_per_window
            )));
        }

        let since_last = now - record.last_sent_at;
        let cooldown = to_delta(self.limits.cooldown);
        if since_last < cooldown {
            let wait = (cooldown - since_last).num_seconds().max(1);
            return Err(Error::RateLimit(format!(
                "wait {wait} s before requesting another code"
            )));
        }
        Ok(())
    }

    pub async fn record(&self, phone: &str) -> Result<AttemptRecord> {
        self.record_at(phone, Utc::now()).await
    }

    /// Count one send at `now`, starting a new window when the last expired.
    pub async fn record_at(&self, phone: &str, now: DateTime<Utc>) -> Result<AttemptRecord> {
        let record = match self.load(phone).await? {
            Some(previous) if now - previous.window_started_at < to_delta(self.limits.window) => {
                AttemptRecord {
                    count: previous.count.saturating_add(1),
                    window_started_at: previous.window_started_at,
                    last_sent_at: now,
                }
            }
            _ => AttemptRecord {
                count: 1,
                window_started_at: now,
                last_sent_at: now,
            },
        };

        let value = serde_json::to_value(&record)?;
        self.bounded(self.tree.put(&attempt_path(phone), value))
            .await?
            .map_err(Error::write)?;
        Ok(record)
    }

    async fn load(&self, phone: &str) -> Result<Option<AttemptRecord>> {
        let path = attempt_path(phone);
        let value = self
            .bounded(self.tree.get(&path))
            .await?
            .map_err(Error::read)?;
        match value.map(serde_json::from_value::<AttemptRecord>).transpose() {
            Ok(record) => Ok(record),
            Err(error) => {
                tracing::warn!("Ignoring malformed attempt record at {}: {}", path, error);
                Ok(None)
            }
        }
    }

    async fn bounded<F: Future>(&self, operation: F) -> Result<F::Output> {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| Error::RemoteTimeout(self.timeout.as_millis()))
    }
}

#[derive(Debug)]
struct PendingCode {
    code: String,
    expires_at: DateTime<Utc>,
}

/// Sends and verifies six-digit codes.
#[derive(Debug)]
pub struct OtpService<T, G> {
    limiter: OtpRateLimiter<T>,
    gateway: G,
    code_ttl: Duration,
    pending: Mutex<HashMap<String, PendingCode>>,
}

impl<T: RemoteTree, G: SmsGateway> OtpService<T, G> {
    pub fn new(limiter: OtpRateLimiter<T>, gateway: G) -> Self {
        Self {
            limiter,
            gateway,
            code_ttl: CODE_TTL,
            pending: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn with_code_ttl(mut self, code_ttl: Duration) -> Self {
        self.code_ttl = code_ttl;
        self
    }

    pub async fn send_code(&self, phone: &str) -> Result<()> {
        let phone = normalize_phone(phone)?;
        self.limiter.check(&phone).await?;

        let code = format!("{:06}", rand::rng().random_range(0..1_000_000u32));
        let message = format!("Your Fleet verification code is {code}.");
        self.gateway.send(&phone, &message).await?;
        let record = self.limiter.record(&phone).await?;

        self.pending_codes().insert(
            phone.clone(),
            PendingCode {
                code,
                expires_at: Utc::now() + to_delta(self.code_ttl),
            },
        );
        tracing::info!("Sent verification code ({} of today's quota used)", record.count);
        Ok(())
    }

    /// Consume the pending code for `phone` if `code` matches and is fresh.
    pub fn verify_code(&self, phone: &str, code: &str) -> Result<()> {
        let phone = normalize_phone(phone)?;
        let mut pending = self.pending_codes();

        let Some(expected) = pending.get(&phone) else {
            return Err(AuthError::Verification("no code was requested".to_string()).into());
        };
        if expected.expires_at <= Utc::now() {
            pending.remove(&phone);
            return Err(AuthError::Verification("code expired".to_string()).into());
        }
        if expected.code != code.trim() {
            tracing::warn!("Rejected verification code");
            return Err(AuthError::Verification("code does not match".to_string()).into());
        }

        pending.remove(&phone);
        Ok(())
    }

    fn pending_codes(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingCode>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn attempt_path(phone: &str) -> String {
    join_path(Collection::OtpAttempts.path(), phone)
}

fn to_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}
