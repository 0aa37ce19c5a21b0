//! Time buckets
//!
//! A bucket is the fixed-granularity aggregate of every event whose
//! timestamp falls in `[start, end)`. Keys are always the canonical start of
//! the period, computed in UTC:
//!
//! - `Day`: 00:00 of the day
//! - `Week`: 00:00 of the ISO week's Monday
//! - `Month`: 00:00 of the first day of the month
//!
//! All counters are integers, so folding is exactly commutative.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::event::Event;

// ============================================================================
// GRANULARITY
// ============================================================================

/// Bucket size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Week, Granularity::Month];

    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }

    /// Canonical start of the period containing `instant`
    pub fn bucket_start(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let date = instant.date_naive();
        let start_date = match self {
            Granularity::Day => date,
            Granularity::Week => {
                date.checked_sub_signed(Duration::days(date.weekday().num_days_from_monday() as i64))?
            }
            Granularity::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?,
        };
        Some(start_date.and_hms_opt(0, 0, 0)?.and_utc())
    }

    /// Exclusive end of the period starting at `start`
    pub fn bucket_end(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Granularity::Day => start.checked_add_signed(Duration::days(1)),
            Granularity::Week => start.checked_add_signed(Duration::days(7)),
            Granularity::Month => start.checked_add_months(Months::new(1)),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "day" | "daily" => Ok(Granularity::Day),
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            _ => Err(format!("Unknown granularity: {}", s)),
        }
    }
}

// ============================================================================
// BUCKET KEY
// ============================================================================

/// Identity of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketKey {
    pub granularity: Granularity,
    pub start: DateTime<Utc>,
}

impl BucketKey {
    /// Key of the bucket containing `instant`
    pub fn containing(granularity: Granularity, instant: DateTime<Utc>) -> Option<Self> {
        Some(Self {
            granularity,
            start: granularity.bucket_start(instant)?,
        })
    }
}

// ============================================================================
// TIME BUCKET
// ============================================================================

/// Aggregate of one period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    pub granularity: Granularity,
    pub start: DateTime<Utc>,
    pub count: u64,
    pub intensity_sum: u64,
    /// Hour of day (0-23) -> events
    pub time_of_day_histogram: BTreeMap<u32, u64>,
    /// Weekday (Monday = 0) -> events
    pub weekday_histogram: BTreeMap<u32, u64>,
    /// Tag -> events carrying it
    pub tag_frequency: BTreeMap<String, u64>,
}

impl TimeBucket {
    /// Empty bucket for `key`
    pub fn new(key: BucketKey) -> Self {
        Self {
            granularity: key.granularity,
            start: key.start,
            count: 0,
            intensity_sum: 0,
            time_of_day_histogram: BTreeMap::new(),
            weekday_histogram: BTreeMap::new(),
            tag_frequency: BTreeMap::new(),
        }
    }

    pub fn key(&self) -> BucketKey {
        BucketKey {
            granularity: self.granularity,
            start: self.start,
        }
    }

    /// Fold one event into the counters
    pub fn apply(&mut self, event: &Event) {
        self.count = self.count.saturating_add(1);
        self.intensity_sum = self.intensity_sum.saturating_add(event.intensity() as u64);
        *self.time_of_day_histogram.entry(event.hour()).or_default() += 1;
        *self.weekday_histogram.entry(event.weekday_index()).or_default() += 1;
        for tag in event.tags() {
            *self.tag_frequency.entry(tag.clone()).or_default() += 1;
        }
    }

    /// Add another bucket's counters into this one (used for range totals)
    pub fn absorb(&mut self, other: &TimeBucket) {
        self.count = self.count.saturating_add(other.count);
        self.intensity_sum = self.intensity_sum.saturating_add(other.intensity_sum);
        for (hour, n) in &other.time_of_day_histogram {
            *self.time_of_day_histogram.entry(*hour).or_default() += n;
        }
        for (day, n) in &other.weekday_histogram {
            *self.weekday_histogram.entry(*day).or_default() += n;
        }
        for (tag, n) in &other.tag_frequency {
            *self.tag_frequency.entry(tag.clone()).or_default() += n;
        }
    }

    pub fn mean_intensity(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.intensity_sum as f64 / self.count as f64
        }
    }

    /// Exclusive end of the period
    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.granularity.bucket_end(self.start)
    }

    /// Busiest hour, lowest hour on ties
    pub fn peak_hour(&self) -> Option<u32> {
        peak(&self.time_of_day_histogram)
    }

    /// Busiest weekday (Monday = 0), earliest on ties
    pub fn peak_weekday(&self) -> Option<u32> {
        peak(&self.weekday_histogram)
    }
}

fn peak(histogram: &BTreeMap<u32, u64>) -> Option<u32> {
    histogram
        .iter()
        .fold(None, |best: Option<(u32, u64)>, (k, v)| match best {
            Some((_, best_v)) if best_v >= *v => best,
            _ => Some((*k, *v)),
        })
        .map(|(k, _)| k)
}

/// Name of a weekday index (Monday = 0)
pub fn weekday_name(index: u32) -> &'static str {
    match index {
        0 => "Monday",
        1 => "Tuesday",
        2 => "Wednesday",
        3 => "Thursday",
        4 => "Friday",
        5 => "Saturday",
        _ => "Sunday",
    }
}

// ============================================================================
// TESTS
// ============================================================================
