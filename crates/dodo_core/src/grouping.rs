//! Pure grouping engine for date-bucketed history views.
//!
//! # Responsibility
//! - Partition timestamped entities into local-calendar-day buckets.
//! - Keep bucket and in-bucket ordering deterministic (newest first).
//!
//! # Invariants
//! - Entities whose selector yields `None` are excluded, never bucketed.
//! - `DayKey` equality is calendar-day equality in the local time zone.

use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Canonical per-day bucket key in the local time zone.
///
/// Display-label derivation ("Today", a localized date, ...) is a
/// presentation concern; `is_today` is the primitive it builds on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DayKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DayKey {
    /// Builds a key from a calendar date.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
            day: date.day(),
        }
    }

    /// Builds a key from an instant, bucketing by the local calendar day.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self::from_date(instant.with_timezone(&Local).date_naive())
    }

    /// Returns the calendar date this key denotes.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// Returns whether this key denotes the current local calendar day.
    pub fn is_today(&self) -> bool {
        *self == Self::from_date(Local::now().date_naive())
    }
}

/// One calendar-day bucket of grouped entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayGroup<T> {
    pub day: DayKey,
    /// Items ordered by selected timestamp descending.
    pub items: Vec<T>,
}

/// Buckets entities by local calendar day of their selected timestamp.
///
/// Buckets are ordered most-recent-day-first; within a bucket, items are
/// ordered by the selected timestamp descending.
pub fn group_by_day<T, F>(items: Vec<T>, selector: F) -> Vec<DayGroup<T>>
where
    F: Fn(&T) -> Option<DateTime<Utc>>,
{
    let mut stamped: Vec<(DateTime<Utc>, T)> = items
        .into_iter()
        .filter_map(|item| selector(&item).map(|at| (at, item)))
        .collect();
    stamped.sort_by(|a, b| b.0.cmp(&a.0));

    let mut groups: Vec<DayGroup<T>> = Vec::new();
    for (at, item) in stamped {
        let day = DayKey::from_instant(at);
        match groups.last_mut() {
            Some(group) if group.day == day => group.items.push(item),
            _ => groups.push(DayGroup {
                day,
                items: vec![item],
            }),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::{group_by_day, DayKey};
    use chrono::{DateTime, Local, TimeZone, Utc};

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item {
        label: &'static str,
        at: Option<DateTime<Utc>>,
    }

    fn local_instant(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
    ) -> DateTime<Utc> {
        Local
            .with_ymd_and_hms(year, month, day, hour, minute, 0)
            .single()
            .expect("unambiguous local time")
            .with_timezone(&Utc)
    }

    #[test]
    fn groups_three_days_newest_first() {
        let items = vec![
            Item {
                label: "old-morning",
                at: Some(local_instant(2024, 3, 1, 9, 0)),
            },
            Item {
                label: "old-evening",
                at: Some(local_instant(2024, 3, 1, 21, 0)),
            },
            Item {
                label: "middle",
                at: Some(local_instant(2024, 3, 2, 12, 0)),
            },
            Item {
                label: "recent",
                at: Some(local_instant(2024, 3, 3, 8, 0)),
            },
        ];

        let groups = group_by_day(items, |item| item.at);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].day, DayKey::from_date("2024-03-03".parse().unwrap()));
        assert_eq!(groups[1].day, DayKey::from_date("2024-03-02".parse().unwrap()));
        assert_eq!(groups[2].day, DayKey::from_date("2024-03-01".parse().unwrap()));

        let old_labels: Vec<&str> = groups[2].items.iter().map(|item| item.label).collect();
        assert_eq!(old_labels, vec!["old-evening", "old-morning"]);
    }

    #[test]
    fn excludes_items_without_timestamp() {
        let items = vec![
            Item {
                label: "kept",
                at: Some(local_instant(2024, 3, 1, 9, 0)),
            },
            Item {
                label: "dropped",
                at: None,
            },
        ];

        let groups = group_by_day(items, |item| item.at);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].items.len(), 1);
        assert_eq!(groups[0].items[0].label, "kept");
    }

    #[test]
    fn empty_input_yields_no_groups() {
        let groups = group_by_day(Vec::<Item>::new(), |item| item.at);
        assert!(groups.is_empty());
    }

    #[test]
    fn day_key_today_matches_current_local_day() {
        let key = DayKey::from_instant(Utc::now());
        assert!(key.is_today());
        assert!(key.date().is_some());
    }
}
