//! Day buckets over matched staff records
//!
//! Records are flattened into one ordered sequence, and each calendar day
//! gets a [`MatchGroup`] pointing at its slice of that sequence.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::shift::is_empty_shift;
use super::timestamps::{parse_day, parse_timestamp};
use crate::api::models::StaffRecord;

/// One populated calendar day
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGroup {
    /// `YYYY-MM-DD`
    pub key: String,
    pub label: String,
    /// Offset of the first record of the day in [`Grouped::ordered`]
    pub start_index: usize,
    pub count: usize,
    pub is_collapsed: bool,
}

impl MatchGroup {
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start_index..self.start_index + self.count
    }
}

#[derive(Debug, Clone, Default)]
pub struct Grouped {
    pub ordered: Vec<StaffRecord>,
    pub groups: Vec<MatchGroup>,
}

impl Grouped {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn first_key(&self) -> Option<&str> {
        self.groups.first().map(|g| g.key.as_str())
    }

    /// Records of one group, in display order
    pub fn records(&self, group: &MatchGroup) -> &[StaffRecord] {
        &self.ordered[group.range()]
    }
}

/// Parsed timestamps in time order, then unparseable values by text
fn compare_moments(a: &str, b: &str) -> Ordering {
    moment_key(a).cmp(&moment_key(b))
}

fn moment_key(value: &str) -> (bool, Option<DateTime<Utc>>, &str) {
    let parsed = parse_timestamp(value);
    (parsed.is_none(), parsed, value)
}

fn shift_start(record: &StaffRecord) -> &str {
    record
        .shift_date1
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(&record.date)
}

/// Non-empty shifts first, then by shift start (or the record date)
fn within_day(a: &StaffRecord, b: &StaffRecord) -> Ordering {
    is_empty_shift(a)
        .cmp(&is_empty_shift(b))
        .then_with(|| compare_moments(shift_start(a), shift_start(b)))
}

pub fn group(matched: &[StaffRecord]) -> Grouped {
    let mut sorted = matched.to_vec();
    sorted.sort_by(|a, b| compare_moments(&a.date, &b.date));

    let mut buckets: BTreeMap<String, Vec<StaffRecord>> = BTreeMap::new();
    for record in sorted {
        buckets
            .entry(record.day_key().to_string())
            .or_default()
            .push(record);
    }

    let mut grouped = Grouped::default();
    for (key, mut records) in buckets {
        records.sort_by(within_day);
        grouped.groups.push(MatchGroup {
            label: long_day_label(&key),
            key,
            start_index: grouped.ordered.len(),
            count: records.len(),
            is_collapsed: false,
        });
        grouped.ordered.extend(records);
    }
    grouped
}

const WEEKDAYS_RU: [&str; 7] = [
    "понедельник",
    "вторник",
    "среда",
    "четверг",
    "пятница",
    "суббота",
    "воскресенье",
];

const MONTHS_RU_GENITIVE: [&str; 12] = [
    "января",
    "февраля",
    "марта",
    "апреля",
    "мая",
    "июня",
    "июля",
    "августа",
    "сентября",
    "октября",
    "ноября",
    "декабря",
];

fn russian_long_date(date: NaiveDate) -> String {
    let weekday = WEEKDAYS_RU[date.weekday().num_days_from_monday() as usize];
    let month = MONTHS_RU_GENITIVE[date.month0() as usize];
    format!("{}, {} {} {} г.", weekday, date.day(), month, date.year())
}

/// `"вторник, 2 января 2024 г."`, or the key itself when it is not a day
pub fn long_day_label(key: &str) -> String {
    match parse_day(key) {
        Some(date) => russian_long_date(date),
        None => key.to_string(),
    }
}
