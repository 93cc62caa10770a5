//! Recurrence rules and the next-run calculator
//!
//! All calculations work on local wall-clock time ([`NaiveDateTime`]) so that a
//! task configured for 09:00 keeps running at 09:00 across DST changes. The
//! caller converts to UTC for storage.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use super::types::{Result, SchedulerError};

/// How many months ahead the monthly search looks
const MONTH_SEARCH_HORIZON: u32 = 12;

/// Frequency kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Single run at `start_date` + `run_time`
    Once,
    /// Every `interval` days
    Daily,
    /// On the selected days of the week
    Weekly,
    /// On the selected days of the selected months
    Monthly,
    /// Every `interval` hours
    Hourly,
    /// Every `interval` minutes
    EveryMinutes,
    /// Weekly, every other week counted from `start_date`
    BiWeekly,
    /// Monthly, every third month counted from `start_date`
    Quarterly,
    /// At each of `daily_times`, every day
    MultipleDaily,
    /// Monday to Friday
    Workdays,
}

impl Frequency {
    /// All supported frequencies
    pub const ALL: [Frequency; 10] = [
        Frequency::Once,
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Hourly,
        Frequency::EveryMinutes,
        Frequency::BiWeekly,
        Frequency::Quarterly,
        Frequency::MultipleDaily,
        Frequency::Workdays,
    ];

    /// Stable name used in config and on the command line
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Once => "once",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
            Frequency::Hourly => "hourly",
            Frequency::EveryMinutes => "every_minutes",
            Frequency::BiWeekly => "bi_weekly",
            Frequency::Quarterly => "quarterly",
            Frequency::MultipleDaily => "multiple_daily",
            Frequency::Workdays => "workdays",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str() == normalized)
            .ok_or_else(|| format!("unknown frequency: {s}"))
    }
}

/// Set of weekdays, kept sorted Monday first
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeekdaySet(Vec<Weekday>);

impl WeekdaySet {
    /// Empty set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Monday through Friday
    #[must_use]
    pub fn workdays() -> Self {
        [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
            .into_iter()
            .collect()
    }

    /// Add a day; duplicates are ignored
    pub fn insert(&mut self, day: Weekday) {
        if !self.contains(day) {
            self.0.push(day);
            self.0.sort_by_key(Weekday::num_days_from_monday);
        }
    }

    /// Membership test
    #[must_use]
    pub fn contains(&self, day: Weekday) -> bool {
        self.0.contains(&day)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        let mut set = Self::new();
        for day in iter {
            set.insert(day);
        }
        set
    }
}

/// Set of calendar months (1-12). An empty set selects every month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MonthSet(BTreeSet<u32>);

impl MonthSet {
    /// Every month
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Add a month number
    pub fn insert(&mut self, month: u32) {
        self.0.insert(month);
    }

    /// Membership test; an empty set contains every month
    #[must_use]
    pub fn contains(&self, month: u32) -> bool {
        self.0.is_empty() || self.0.contains(&month)
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<u32> for MonthSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn default_interval() -> u32 {
    1
}

/// Recurrence configuration of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    /// Frequency kind
    pub frequency: Frequency,
    /// Time of day (local)
    pub run_time: NaiveTime,
    /// First day the task may run; anchors `Once`, `BiWeekly`, `Quarterly`
    /// and the interval frequencies
    pub start_date: NaiveDate,
    /// Step for `Daily`, `Hourly` and `EveryMinutes`
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default)]
    pub days_of_week: WeekdaySet,
    #[serde(default)]
    pub days_of_month: BTreeSet<u32>,
    #[serde(default)]
    pub months: MonthSet,
    /// Time points for `MultipleDaily`
    #[serde(default)]
    pub daily_times: Vec<NaiveTime>,
}

impl Recurrence {
    fn base(frequency: Frequency, start: NaiveDateTime) -> Self {
        Self {
            frequency,
            run_time: start.time(),
            start_date: start.date(),
            interval: 1,
            days_of_week: WeekdaySet::new(),
            days_of_month: BTreeSet::new(),
            months: MonthSet::all(),
            daily_times: Vec::new(),
        }
    }

    /// Single run at `at`
    #[must_use]
    pub fn once(at: NaiveDateTime) -> Self {
        Self::base(Frequency::Once, at)
    }

    /// Every `interval` days at the time of `start`
    #[must_use]
    pub fn daily(start: NaiveDateTime, interval: u32) -> Self {
        Self {
            interval,
            ..Self::base(Frequency::Daily, start)
        }
    }

    /// On the given weekdays at the time of `start`
    #[must_use]
    pub fn weekly(start: NaiveDateTime, days: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            days_of_week: days.into_iter().collect(),
            ..Self::base(Frequency::Weekly, start)
        }
    }

    /// Weekly, every other week
    #[must_use]
    pub fn bi_weekly(start: NaiveDateTime, days: impl IntoIterator<Item = Weekday>) -> Self {
        Self {
            frequency: Frequency::BiWeekly,
            ..Self::weekly(start, days)
        }
    }

    /// Monday to Friday at the time of `start`
    #[must_use]
    pub fn workdays(start: NaiveDateTime) -> Self {
        Self {
            days_of_week: WeekdaySet::workdays(),
            ..Self::base(Frequency::Workdays, start)
        }
    }

    /// On the given days of the given months (empty months = all)
    #[must_use]
    pub fn monthly(
        start: NaiveDateTime,
        days: impl IntoIterator<Item = u32>,
        months: impl IntoIterator<Item = u32>,
    ) -> Self {
        Self {
            days_of_month: days.into_iter().collect(),
            months: months.into_iter().collect(),
            ..Self::base(Frequency::Monthly, start)
        }
    }

    /// On the given days, every third month from `start`
    #[must_use]
    pub fn quarterly(start: NaiveDateTime, days: impl IntoIterator<Item = u32>) -> Self {
        Self {
            days_of_month: days.into_iter().collect(),
            ..Self::base(Frequency::Quarterly, start)
        }
    }

    /// Every `interval` hours from `start`
    #[must_use]
    pub fn hourly(start: NaiveDateTime, interval: u32) -> Self {
        Self {
            interval,
            ..Self::base(Frequency::Hourly, start)
        }
    }

    /// Every `interval` minutes from `start`
    #[must_use]
    pub fn every_minutes(start: NaiveDateTime, interval: u32) -> Self {
        Self {
            interval,
            ..Self::base(Frequency::EveryMinutes, start)
        }
    }

    /// At each time point, every day from `start_date`
    #[must_use]
    pub fn multiple_daily(start_date: NaiveDate, times: impl IntoIterator<Item = NaiveTime>) -> Self {
        let mut daily_times: Vec<NaiveTime> = times.into_iter().collect();
        daily_times.sort();
        daily_times.dedup();
        let run_time = daily_times.first().copied().unwrap_or(NaiveTime::MIN);
        Self {
            daily_times,
            ..Self::base(Frequency::MultipleDaily, start_date.and_time(run_time))
        }
    }

    /// Check the frequency-specific parameters
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| -> Result<()> { Err(SchedulerError::InvalidConfig(msg.to_string())) };
        match self.frequency {
            Frequency::Daily | Frequency::Hourly | Frequency::EveryMinutes if self.interval == 0 => {
                invalid("interval must be at least 1")
            }
            Frequency::Weekly | Frequency::BiWeekly | Frequency::Workdays
                if self.days_of_week.is_empty() =>
            {
                invalid("at least one day of the week is required")
            }
            Frequency::Monthly | Frequency::Quarterly if self.days_of_month.is_empty() => {
                invalid("at least one day of the month is required")
            }
            Frequency::Monthly | Frequency::Quarterly
                if self.days_of_month.iter().any(|d| !(1..=31).contains(d)) =>
            {
                invalid("days of the month must be between 1 and 31")
            }
            Frequency::Monthly if self.months.iter().any(|m| !(1..=12).contains(&m)) => {
                invalid("months must be between 1 and 12")
            }
            Frequency::MultipleDaily if self.daily_times.is_empty() => {
                invalid("at least one time of day is required")
            }
            _ => Ok(()),
        }
    }

    /// Short human-readable description
    #[must_use]
    pub fn describe(&self) -> String {
        let at = self.run_time.format("%H:%M");
        match self.frequency {
            Frequency::Once => format!("once on {} at {at}", self.start_date),
            Frequency::Daily if self.interval == 1 => format!("daily at {at}"),
            Frequency::Daily => format!("every {} days at {at}", self.interval),
            Frequency::Weekly | Frequency::BiWeekly => {
                let days: Vec<String> = self.days_of_week.iter().map(|d| d.to_string()).collect();
                let every = if self.frequency == Frequency::BiWeekly {
                    "every other week"
                } else {
                    "weekly"
                };
                format!("{every} on {} at {at}", days.join(","))
            }
            Frequency::Workdays => format!("workdays at {at}"),
            Frequency::Monthly | Frequency::Quarterly => {
                let days: Vec<String> = self.days_of_month.iter().map(u32::to_string).collect();
                format!("{} on day {} at {at}", self.frequency, days.join(","))
            }
            Frequency::Hourly => format!("every {} hour(s) from {at}", self.interval),
            Frequency::EveryMinutes => format!("every {} minute(s) from {at}", self.interval),
            Frequency::MultipleDaily => {
                let times: Vec<String> = self
                    .daily_times
                    .iter()
                    .map(|t| t.format("%H:%M").to_string())
                    .collect();
                format!("daily at {}", times.join(","))
            }
        }
    }
}

/// Compute the next run time of a recurrence.
///
/// `now` is the current local time and `previous` the run time that was just
/// due, or `None` when scheduling from scratch. The result is the earliest
/// qualifying instant strictly after `now`, or `None` when the recurrence has
/// no further runs.
#[must_use]
pub fn next_run_time(
    rec: &Recurrence,
    now: NaiveDateTime,
    previous: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    match rec.frequency {
        Frequency::Once => {
            let at = rec.start_date.and_time(rec.run_time);
            (previous.is_none() && at > now).then_some(at)
        }
        Frequency::Daily => next_daily(rec, now, previous),
        Frequency::Weekly | Frequency::Workdays => {
            next_matching_day(rec, now, previous, 7, |d| rec.days_of_week.contains(d.weekday()))
        }
        Frequency::BiWeekly => next_matching_day(rec, now, previous, 14, |d| {
            rec.days_of_week.contains(d.weekday()) && weeks_between(rec.start_date, d) % 2 == 0
        }),
        Frequency::Monthly => next_monthly(rec, now, |m| rec.months.contains(m)),
        Frequency::Quarterly => {
            let anchor = rec.start_date.month() as i64;
            next_monthly(rec, now, |m| (m as i64 - anchor).rem_euclid(3) == 0)
        }
        Frequency::Hourly => next_stepped(rec, now, previous, Duration::hours(rec.interval.into())),
        Frequency::EveryMinutes => {
            next_stepped(rec, now, previous, Duration::minutes(rec.interval.into()))
        }
        Frequency::MultipleDaily => next_multiple_daily(rec, now),
    }
}

fn first_day(rec: &Recurrence, now: NaiveDateTime) -> NaiveDate {
    rec.start_date.max(now.date())
}

fn next_daily(
    rec: &Recurrence,
    now: NaiveDateTime,
    previous: Option<NaiveDateTime>,
) -> Option<NaiveDateTime> {
    let step = Duration::days(rec.interval.max(1).into());
    let Some(prev) = previous else {
        let mut candidate = first_day(rec, now).and_time(rec.run_time);
        if candidate <= now {
            candidate += Duration::days(1);
        }
        return Some(candidate);
    };
    let mut candidate = prev.date().and_time(rec.run_time) + step;
    while candidate <= now {
        candidate += step;
    }
    Some(candidate)
}

fn next_matching_day(
    rec: &Recurrence,
    now: NaiveDateTime,
    previous: Option<NaiveDateTime>,
    horizon: i64,
    matches: impl Fn(NaiveDate) -> bool,
) -> Option<NaiveDateTime> {
    let from = if previous.is_some() {
        rec.start_date.max(now.date() + Duration::days(1))
    } else {
        first_day(rec, now)
    };
    (0..=horizon)
        .map(|offset| from + Duration::days(offset))
        .filter(|d| matches(*d))
        .map(|d| d.and_time(rec.run_time))
        .find(|candidate| *candidate > now)
}

fn next_monthly(
    rec: &Recurrence,
    now: NaiveDateTime,
    month_selected: impl Fn(u32) -> bool,
) -> Option<NaiveDateTime> {
    let from = first_day(rec, now);
    let (mut year, mut month) = (from.year(), from.month());
    for _ in 0..=MONTH_SEARCH_HORIZON {
        if month_selected(month) {
            let found = rec
                .days_of_month
                .iter()
                .filter_map(|day| NaiveDate::from_ymd_opt(year, month, *day))
                .map(|d| d.and_time(rec.run_time))
                .find(|candidate| *candidate > now && candidate.date() >= rec.start_date);
            if found.is_some() {
                return found;
            }
        }
        (year, month) = next_month(year, month);
    }
    let (year, month) = next_month(now.year(), now.month());
    NaiveDate::from_ymd_opt(year, month, 1).map(|d| d.and_time(rec.run_time))
}

fn next_stepped(
    rec: &Recurrence,
    now: NaiveDateTime,
    previous: Option<NaiveDateTime>,
    step: Duration,
) -> Option<NaiveDateTime> {
    if step <= Duration::zero() {
        return None;
    }
    let mut candidate = match previous {
        Some(prev) => prev + step,
        None => rec.start_date.and_time(rec.run_time),
    };
    if candidate <= now {
        let step_secs = step.num_seconds();
        let behind = (now - candidate).num_seconds() / step_secs + 1;
        candidate += Duration::seconds(behind * step_secs);
    }
    while candidate <= now {
        candidate += step;
    }
    Some(candidate)
}

fn next_multiple_daily(rec: &Recurrence, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let mut times = rec.daily_times.clone();
    times.sort();
    let today = first_day(rec, now);
    [today, today + Duration::days(1)]
        .into_iter()
        .flat_map(|d| times.iter().map(move |t| d.and_time(*t)))
        .find(|candidate| *candidate > now)
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

/// Whole weeks between the Monday of `anchor`'s week and the Monday of `day`'s week
fn weeks_between(anchor: NaiveDate, day: NaiveDate) -> i64 {
    let monday = |d: NaiveDate| d - Duration::days(d.weekday().num_days_from_monday().into());
    (monday(day) - monday(anchor)).num_days().div_euclid(7)
}
