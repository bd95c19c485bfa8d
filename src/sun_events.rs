//! # Sun Event Resolver
//!
//! Finds the next sunrise or sunset after an arbitrary instant, plus the event
//! that follows it, from a static table of daily sunrise/sunset records.
//!
//! ## Table Preparation
//! Records are parsed once into [`PreparedRecord`]s and sorted ascending by UTC
//! sunrise. Timestamps carrying an offset (`2025-03-01T06:33:00-07:00`,
//! `...Z`) are converted into the dashboard timezone; offset-less timestamps
//! are read as wall-clock time in that zone. Records whose timestamps cannot be
//! parsed are dropped with a warning.
//!
//! ## Lookup Algorithm
//! 1. **Today's record**: first record whose local sunrise falls on `now`'s
//!    calendar date; else the earliest record whose sunrise is after `now`; else
//!    the last record. Traversal clamps at the end of the table, it never wraps.
//! 2. **Before sunrise**: sunrise today, then sunset today
//! 3. **Before sunset**: sunset today, then the next record's sunrise (or today's
//!    own sunrise at the end of the table)
//! 4. **After sunset**: the next record's sunrise and sunset (or the last
//!    record's at the end of the table)
//! 5. **Future alignment**: `when` is moved forward in whole calendar days until
//!    it is after `now`; `alt_when` gets the same shift, then more single days
//!    until it is after `when`. The result always satisfies
//!    `alt_when > when > now`.
//!
//! Beyond the last record the resolver keeps answering from the final record
//! rather than extrapolating sun times.

use crate::time::{resolve_local, DAY_MS};
use crate::{NextSunEvent, SunEventKind, SunEventRecord};
use chrono::{DateTime, Days, Duration, NaiveDateTime, TimeZone, Utc};
use std::{fs, io, path::Path};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors that can occur while loading the sun-event table.
#[derive(Error, Debug)]
pub enum SunTableError {
    /// Table file could not be read
    #[error("sun table IO: {0}")]
    Io(#[from] io::Error),

    /// Table file is not a JSON array of records
    #[error("sun table JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A record carries a timestamp in an unknown format
    #[error("bad timestamp {value:?} in field {field}")]
    Timestamp { field: &'static str, value: String },
}

/// Offset-less timestamp layouts accepted in the table
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// A sun-event record with its timestamps parsed into comparable values.
#[derive(Clone, Debug)]
pub struct PreparedRecord<Tz: TimeZone> {
    pub base: SunEventRecord,
    pub sunrise_local: DateTime<Tz>,
    pub sunset_local: DateTime<Tz>,
    pub sunrise_utc: DateTime<Utc>,
    pub sunset_utc: DateTime<Utc>,
}

impl<Tz: TimeZone> PreparedRecord<Tz> {
    /// Parse one record into the dashboard timezone.
    pub fn parse(record: &SunEventRecord, tz: &Tz) -> Result<Self, SunTableError> {
        Ok(PreparedRecord {
            sunrise_local: parse_timestamp("sunrise_local", &record.sunrise_local, tz)?,
            sunset_local: parse_timestamp("sunset_local", &record.sunset_local, tz)?,
            sunrise_utc: parse_timestamp("sunrise_utc", &record.sunrise_utc, tz)?
                .with_timezone(&Utc),
            sunset_utc: parse_timestamp("sunset_utc", &record.sunset_utc, tz)?
                .with_timezone(&Utc),
            base: record.clone(),
        })
    }
}

fn parse_timestamp<Tz: TimeZone>(
    field: &'static str,
    value: &str,
    tz: &Tz,
) -> Result<DateTime<Tz>, SunTableError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(tz));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| resolve_local(tz, naive))
        .ok_or_else(|| SunTableError::Timestamp {
            field,
            value: value.to_string(),
        })
}

/// Sun-event records parsed and sorted ascending by UTC sunrise.
#[derive(Clone, Debug)]
pub struct PreparedSunTable<Tz: TimeZone> {
    records: Vec<PreparedRecord<Tz>>,
}

impl<Tz: TimeZone> PreparedSunTable<Tz> {
    /// Parse and sort `records`; unparsable records are skipped.
    pub fn prepare(records: &[SunEventRecord], tz: &Tz) -> Self {
        let mut prepared: Vec<PreparedRecord<Tz>> = records
            .iter()
            .filter_map(|record| match PreparedRecord::parse(record, tz) {
                Ok(prepared) => Some(prepared),
                Err(e) => {
                    warn!("Skipping sun record for {}: {}", record.date, e);
                    None
                }
            })
            .collect();
        prepared.sort_by_key(|record| record.sunrise_utc);
        debug!("Prepared {} of {} sun records", prepared.len(), records.len());
        PreparedSunTable { records: prepared }
    }

    pub fn records(&self) -> &[PreparedRecord<Tz>] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Resolves the next solar event for any query instant.
///
/// # Example
/// ```
/// use chrono::{FixedOffset, TimeZone};
/// use live_tracker_lib::sun_events::SunEventResolver;
/// use live_tracker_lib::{SunEventKind, SunEventRecord};
///
/// let tz = FixedOffset::west_opt(7 * 3600).unwrap();
/// let record = SunEventRecord {
///     date: "2025-06-01".into(),
///     sunrise_local: "2025-06-01T06:00:00-07:00".into(),
///     sunset_local: "2025-06-01T19:00:00-07:00".into(),
///     sunrise_utc: "2025-06-01T13:00:00Z".into(),
///     sunset_utc: "2025-06-02T02:00:00Z".into(),
///     day_length_seconds: 46800,
/// };
/// let resolver = SunEventResolver::new(&[record], tz);
///
/// let noon = tz.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
/// let next = resolver.resolve(&noon).unwrap();
/// assert_eq!(next.kind, SunEventKind::Sunset);
/// ```
#[derive(Clone, Debug)]
pub struct SunEventResolver<Tz: TimeZone> {
    tz: Tz,
    table: PreparedSunTable<Tz>,
}

impl<Tz: TimeZone> SunEventResolver<Tz> {
    pub fn new(records: &[SunEventRecord], tz: Tz) -> Self {
        let table = PreparedSunTable::prepare(records, &tz);
        SunEventResolver { tz, table }
    }

    /// Load the table from a JSON file holding an array of records.
    pub fn load_from_path<P: AsRef<Path>>(path: P, tz: Tz) -> Result<Self, SunTableError> {
        let data = fs::read(&path)?;
        let records: Vec<SunEventRecord> = serde_json::from_slice(&data)?;
        info!(
            "Loaded {} sun records from {}",
            records.len(),
            path.as_ref().display()
        );
        Ok(Self::new(&records, tz))
    }

    /// Replace the source records; the prepared table is rebuilt.
    pub fn set_records(&mut self, records: &[SunEventRecord]) {
        self.table = PreparedSunTable::prepare(records, &self.tz);
    }

    pub fn table(&self) -> &PreparedSunTable<Tz> {
        &self.table
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Next solar event strictly after `now`, or `None` for an empty table.
    pub fn resolve(&self, now: &DateTime<Tz>) -> Option<NextSunEvent<Tz>> {
        let records = self.table.records();
        let last = records.len().checked_sub(1)?;

        let today_date = now.date_naive();
        let current = records
            .iter()
            .position(|r| r.sunrise_local.date_naive() == today_date)
            .or_else(|| records.iter().position(|r| r.sunrise_local > *now))
            .unwrap_or(last);
        let today = &records[current];

        let (kind, when, alt_when) = if *now < today.sunrise_local {
            (
                SunEventKind::Sunrise,
                today.sunrise_local.clone(),
                today.sunset_local.clone(),
            )
        } else if *now < today.sunset_local {
            let alt = if current < last {
                &records[current + 1]
            } else {
                today
            };
            (
                SunEventKind::Sunset,
                today.sunset_local.clone(),
                alt.sunrise_local.clone(),
            )
        } else {
            let following = records.get(current + 1).unwrap_or(&records[last]);
            (
                SunEventKind::Sunrise,
                following.sunrise_local.clone(),
                following.sunset_local.clone(),
            )
        };

        let (when, day_shift) = align_to_future(&when, now);
        let alt_when = ensure_after(shift_days(&alt_when, day_shift), &when);

        Some(NextSunEvent {
            kind,
            when,
            alt_kind: kind.opposite(),
            alt_when,
        })
    }
}

/// Move `date` forward by calendar days (local wall-clock preserved).
fn shift_days<Tz: TimeZone>(date: &DateTime<Tz>, days: u64) -> DateTime<Tz> {
    if days == 0 {
        return date.clone();
    }
    date.clone()
        .checked_add_days(Days::new(days))
        .unwrap_or_else(|| date.clone() + Duration::days(days as i64))
}

/// Push `date` past `reference` in whole days; returns the date and the shift.
fn align_to_future<Tz: TimeZone>(
    date: &DateTime<Tz>,
    reference: &DateTime<Tz>,
) -> (DateTime<Tz>, u64) {
    if date > reference {
        return (date.clone(), 0);
    }
    let diff_ms = (reference.clone() - date.clone()).num_milliseconds();
    let mut day_shift = (diff_ms / DAY_MS) as u64 + 1;
    let mut shifted = shift_days(date, day_shift);
    // a calendar day is 23h across a DST change
    while shifted <= *reference {
        day_shift += 1;
        shifted = shift_days(date, day_shift);
    }
    (shifted, day_shift)
}

fn ensure_after<Tz: TimeZone>(mut date: DateTime<Tz>, reference: &DateTime<Tz>) -> DateTime<Tz> {
    while date <= *reference {
        date = shift_days(&date, 1);
    }
    date
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn mst() -> FixedOffset {
        FixedOffset::west_opt(7 * 3600).unwrap()
    }

    fn at(d: u32, h: u32, m: u32) -> DateTime<FixedOffset> {
        mst().with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap()
    }

    /// Record for June `d` with sunrise at 06:00 and sunset at 19:00 local.
    fn record(d: u32) -> SunEventRecord {
        record_at(d, (6, 0), (19, 0))
    }

    fn record_at(d: u32, rise: (u32, u32), set: (u32, u32)) -> SunEventRecord {
        let rise_local = mst().with_ymd_and_hms(2025, 6, d, rise.0, rise.1, 0).unwrap();
        let set_local = mst().with_ymd_and_hms(2025, 6, d, set.0, set.1, 0).unwrap();
        SunEventRecord {
            date: format!("2025-06-{:02}", d),
            sunrise_local: rise_local.to_rfc3339(),
            sunset_local: set_local.to_rfc3339(),
            sunrise_utc: rise_local.with_timezone(&Utc).to_rfc3339(),
            sunset_utc: set_local.with_timezone(&Utc).to_rfc3339(),
            day_length_seconds: (set_local - rise_local).num_seconds() as u32,
        }
    }

    #[test]
    fn test_empty_table_resolves_none() {
        let resolver = SunEventResolver::new(&[], mst());
        assert!(resolver.is_empty());
        assert!(resolver.resolve(&at(1, 12, 0)).is_none());
    }

    #[test]
    fn test_before_sunrise_single_record() {
        let resolver = SunEventResolver::new(&[record(1)], mst());
        let next = resolver.resolve(&at(1, 5, 0)).unwrap();
        assert_eq!(next.kind, SunEventKind::Sunrise);
        assert_eq!(next.when, at(1, 6, 0));
        assert_eq!(next.alt_kind, SunEventKind::Sunset);
        assert_eq!(next.alt_when, at(1, 19, 0));
    }

    #[test]
    fn test_between_sunrise_and_sunset_single_record() {
        let resolver = SunEventResolver::new(&[record(1)], mst());
        let next = resolver.resolve(&at(1, 12, 0)).unwrap();
        assert_eq!(next.kind, SunEventKind::Sunset);
        assert_eq!(next.when, at(1, 19, 0));
        assert_eq!(next.alt_kind, SunEventKind::Sunrise);
        // falls back to its own sunrise, advanced a day
        assert_eq!(next.alt_when, at(2, 6, 0));
    }

    #[test]
    fn test_after_sunset_single_record() {
        let resolver = SunEventResolver::new(&[record(1)], mst());
        let next = resolver.resolve(&at(1, 20, 0)).unwrap();
        assert_eq!(next.kind, SunEventKind::Sunrise);
        assert_eq!(next.when, at(2, 6, 0));
        assert_eq!(next.alt_kind, SunEventKind::Sunset);
        assert_eq!(next.alt_when, at(2, 19, 0));
    }

    #[test]
    fn test_uses_following_record_when_available() {
        let records = vec![record_at(1, (6, 0), (19, 0)), record_at(2, (6, 1), (19, 1))];
        let resolver = SunEventResolver::new(&records, mst());

        let afternoon = resolver.resolve(&at(1, 12, 0)).unwrap();
        assert_eq!(afternoon.alt_when, at(2, 6, 1));

        let evening = resolver.resolve(&at(1, 21, 0)).unwrap();
        assert_eq!(evening.kind, SunEventKind::Sunrise);
        assert_eq!(evening.when, at(2, 6, 1));
        assert_eq!(evening.alt_when, at(2, 19, 1));
    }

    #[test]
    fn test_sorts_unordered_records() {
        let records = vec![record(3), record(1), record(2)];
        let resolver = SunEventResolver::new(&records, mst());
        let dates: Vec<&str> = resolver
            .table()
            .records()
            .iter()
            .map(|r| r.base.date.as_str())
            .collect();
        assert_eq!(dates, ["2025-06-01", "2025-06-02", "2025-06-03"]);
    }

    #[test]
    fn test_query_before_table_uses_first_future_record() {
        let resolver = SunEventResolver::new(&[record(10), record(11)], mst());
        let next = resolver.resolve(&at(5, 12, 0)).unwrap();
        assert_eq!(next.kind, SunEventKind::Sunrise);
        assert_eq!(next.when, at(10, 6, 0));
        assert_eq!(next.alt_when, at(10, 19, 0));
    }

    #[test]
    fn test_query_past_table_end_clamps_to_last_record() {
        let resolver = SunEventResolver::new(&[record(1), record(2)], mst());
        // five days after the last record, mid-afternoon
        let now = at(7, 15, 0);
        let next = resolver.resolve(&now).unwrap();
        assert_eq!(next.kind, SunEventKind::Sunrise);
        assert_eq!(next.when, at(8, 6, 0));
        assert_eq!(next.alt_when, at(8, 19, 0));
    }

    #[test]
    fn test_resolved_events_always_in_future() {
        let records: Vec<_> = (1..=5)
            .map(|d| record_at(d, (5, 30 + d), (20, 10 - d)))
            .collect();
        let resolver = SunEventResolver::new(&records, mst());
        let start = mst().with_ymd_and_hms(2025, 5, 28, 0, 0, 0).unwrap();
        for step in 0..(14 * 24 * 4) {
            let now = start + Duration::minutes(step * 15 + 7);
            let next = resolver.resolve(&now).unwrap();
            assert!(next.when > now, "when {} <= now {}", next.when, now);
            assert!(
                next.alt_when > next.when,
                "alt {} <= when {}",
                next.alt_when,
                next.when
            );
            assert_ne!(next.kind, next.alt_kind);
        }
    }

    #[test]
    fn test_future_invariant_across_dst() {
        let tz = chrono_tz::America::Denver;
        let records: Vec<SunEventRecord> = (8..=10)
            .map(|d| SunEventRecord {
                date: format!("2025-03-{:02}", d),
                sunrise_local: format!("2025-03-{:02}T06:15:00", d),
                sunset_local: format!("2025-03-{:02}T18:05:00", d),
                sunrise_utc: format!("2025-03-{:02}T13:15:00Z", d),
                sunset_utc: format!("2025-03-{:02}T01:05:00Z", d + 1),
                day_length_seconds: 42600,
            })
            .collect();
        let resolver = SunEventResolver::new(&records, tz);
        let start = tz.with_ymd_and_hms(2025, 3, 7, 0, 0, 0).unwrap();
        for step in 0..(6 * 24 * 2) {
            let now = start + Duration::minutes(step * 30);
            let next = resolver.resolve(&now).unwrap();
            assert!(next.when > now);
            assert!(next.alt_when > next.when);
        }
    }

    #[test]
    fn test_bad_records_are_skipped() {
        let mut bad = record(2);
        bad.sunset_local = "yesterday-ish".to_string();
        let resolver = SunEventResolver::new(&[record(1), bad], mst());
        assert_eq!(resolver.table().len(), 1);
    }

    #[test]
    fn test_naive_timestamps_read_as_local() {
        let prepared = PreparedRecord::parse(
            &SunEventRecord {
                date: "2025-06-01".into(),
                sunrise_local: "2025-06-01T06:00:00".into(),
                sunset_local: "2025-06-01 19:00:00".into(),
                sunrise_utc: "2025-06-01T13:00:00Z".into(),
                sunset_utc: "2025-06-02T02:00:00Z".into(),
                day_length_seconds: 46800,
            },
            &mst(),
        )
        .unwrap();
        assert_eq!(prepared.sunrise_local, at(1, 6, 0));
        assert_eq!(prepared.sunset_local, at(1, 19, 0));
        assert_eq!(prepared.sunrise_utc, prepared.sunrise_local.with_timezone(&Utc));
    }

    #[test]
    fn test_set_records_rebuilds_table() {
        let mut resolver = SunEventResolver::new(&[], mst());
        assert!(resolver.resolve(&at(1, 12, 0)).is_none());
        resolver.set_records(&[record(1)]);
        assert!(resolver.resolve(&at(1, 12, 0)).is_some());
    }

    #[test]
    fn test_load_from_path() {
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), serde_json::to_vec(&vec![record(1)]).unwrap()).unwrap();
        let resolver = SunEventResolver::load_from_path(file.path(), mst()).unwrap();
        assert_eq!(resolver.table().len(), 1);

        fs::write(file.path(), b"{not json").unwrap();
        assert!(matches!(
            SunEventResolver::load_from_path(file.path(), mst()),
            Err(SunTableError::Json(_))
        ));
        assert!(matches!(
            SunEventResolver::load_from_path("/nonexistent/sun.json", mst()),
            Err(SunTableError::Io(_))
        ));
    }
}
