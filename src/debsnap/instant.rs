use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use std::fmt;

/// Layout snapshot.debian.org uses for archive timestamps, e.g. `20210801T023234Z`.
pub const INSTANT_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// A point in time at second resolution, as addressed by the snapshot archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotInstant(DateTime<Utc>);

impl SnapshotInstant {
    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at.trunc_subsecs(0))
    }

    /// Parse the canonical `YYYYMMDDThhmmssZ` form. Nothing else is accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        if raw.len() != 16 {
            return None;
        }
        let naive = NaiveDateTime::parse_from_str(raw, INSTANT_FORMAT).ok()?;
        Some(Self(naive.and_utc()))
    }

    /// Parse user input: the canonical form first, then RFC 3339.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        Self::parse(trimmed).or_else(|| {
            DateTime::parse_from_rfc3339(trimmed)
                .ok()
                .map(|at| Self::from_datetime(at.with_timezone(&Utc)))
        })
    }

    pub fn datetime(self) -> DateTime<Utc> {
        self.0
    }

    pub fn checked_add(self, step: Duration) -> Option<Self> {
        self.0.checked_add_signed(step).map(Self)
    }

    pub fn checked_sub(self, step: Duration) -> Option<Self> {
        self.0.checked_sub_signed(step).map(Self)
    }
}

impl fmt::Display for SnapshotInstant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(INSTANT_FORMAT))
    }
}
