//! Claim leases
//!
//! A lease marks an issue as taken by one worker for a while. Expiry is
//! advisory: nothing unclaims an issue when its lease runs out, the lease is
//! only cleared by closing or reopening the issue.

use std::fmt::Write;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::Serialize;

use super::issue::ValidationError;

/// Both halves of a claim lease; the storage columns are set together
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClaimLease {
    pub claimed_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Latest lease end that still stores as a four-digit-year RFC 3339 timestamp
const MAX_EXPIRY_YEAR: i32 = 9999;

impl ClaimLease {
    /// Lease from `now` for `ttl`; None when the end is out of range
    pub fn starting_at(now: DateTime<Utc>, ttl: Duration) -> Option<Self> {
        let expires_at = now
            .checked_add_signed(ttl)
            .filter(|end| end.year() <= MAX_EXPIRY_YEAR)?;

        Some(Self {
            claimed_at: now,
            expires_at,
        })
    }

    /// Rebuilds a lease from its two nullable columns
    pub fn from_columns(
        claimed_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Option<Self> {
        match (claimed_at, expires_at) {
            (Some(claimed_at), Some(expires_at)) => Some(Self {
                claimed_at,
                expires_at,
            }),
            _ => None,
        }
    }

    /// Returns true once the lease end has passed. Informational only.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn ttl(&self) -> Duration {
        self.expires_at - self.claimed_at
    }
}

fn unit_seconds(unit: &str) -> Option<i64> {
    match unit.to_ascii_lowercase().as_str() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Some(1),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(60),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(3_600),
        "d" | "day" | "days" => Some(86_400),
        _ => None,
    }
}

/// Parses a lease duration such as `90`, `30m`, `1h` or `1h30m`
pub fn parse_ttl(raw: &str) -> Result<Duration, ValidationError> {
    let invalid = || ValidationError::InvalidTtl(raw.to_string());

    let mut rest = raw.trim();
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: i64 = 0;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let (number, tail) = rest.split_at(digits);
        let unit_len = tail
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let value: i64 = number.parse().map_err(|_| invalid())?;
        let multiplier = unit_seconds(unit.trim()).ok_or_else(invalid)?;
        total = value
            .checked_mul(multiplier)
            .and_then(|secs| total.checked_add(secs))
            .ok_or_else(invalid)?;
        rest = tail;
    }

    if total <= 0 {
        return Err(invalid());
    }
    Duration::try_seconds(total).ok_or_else(invalid)
}

/// Renders a duration the way [`parse_ttl`] reads it
pub fn format_ttl(ttl: Duration) -> String {
    let total = ttl.num_seconds().max(0);
    let parts = [
        (total / 86_400, "d"),
        (total % 86_400 / 3_600, "h"),
        (total % 3_600 / 60, "m"),
        (total % 60, "s"),
    ];

    let mut out = String::new();
    for (value, unit) in parts {
        if value > 0 {
            let _ = write!(out, "{}{}", value, unit);
        }
    }
    if out.is_empty() {
        out.push_str("0s");
    }
    out
}
