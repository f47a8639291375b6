// src/schedule.rs

//! Turning a cron expression and a start/end window into data intervals.
//!
//! Every tick `t_i` of the schedule inside `[start_date, end_date]` is the
//! logical date of one run, which is responsible for `[t_i, t_{i+1})`.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use cron::Schedule;

use crate::errors::{LoaddagError, Result};

/// The window of data a single run is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DataInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DataInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Logical date of the run (the interval start).
    pub fn logical_date(&self) -> DateTime<Utc> {
        self.start
    }

    /// `YYYY-MM-DD` of the interval start.
    pub fn ds(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// Render `{ds}`, `{year}`, `{month}`, `{day}` and `{hour}` in a key
    /// template from the interval start.
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{ds}", &self.ds())
            .replace("{year}", &self.start.year().to_string())
            .replace("{month}", &format!("{:02}", self.start.month()))
            .replace("{day}", &format!("{:02}", self.start.day()))
            .replace("{hour}", &format!("{:02}", self.start.hour()))
    }
}

impl fmt::Display for DataInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Parsed schedule plus the window it is allowed to run in.
#[derive(Debug, Clone)]
pub struct DagSchedule {
    expression: String,
    schedule: Schedule,
    start_date: DateTime<Utc>,
    end_date: Option<DateTime<Utc>>,
}

/// Parse a 5-field (minute-first) or 6/7-field (second-first) cron expression.
pub fn parse_cron(expr: &str) -> Result<Schedule> {
    let trimmed = expr.trim();
    let normalised = match trimmed.split_whitespace().count() {
        5 => format!("0 {trimmed}"),
        _ => trimmed.to_string(),
    };

    Schedule::from_str(&normalised)
        .map_err(|e| LoaddagError::ScheduleError(format!("invalid cron expression '{expr}': {e}")))
}

impl DagSchedule {
    pub fn new(
        expression: &str,
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        if let Some(end) = end_date {
            if end < start_date {
                return Err(LoaddagError::ScheduleError(format!(
                    "end_date {} is before start_date {}",
                    end.to_rfc3339(),
                    start_date.to_rfc3339()
                )));
            }
        }

        Ok(Self {
            expression: expression.to_string(),
            schedule: parse_cron(expression)?,
            start_date,
            end_date,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn start_date(&self) -> DateTime<Utc> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<DateTime<Utc>> {
        self.end_date
    }

    /// First tick at or after `at`.
    fn tick_at_or_after(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&(at - Duration::seconds(1))).next()
    }

    /// The interval whose logical date is exactly `logical_date`, if that
    /// instant is a tick of the schedule inside the window.
    pub fn interval_at(&self, logical_date: DateTime<Utc>) -> Result<DataInterval> {
        let tick = self.tick_at_or_after(logical_date);
        if tick != Some(logical_date) {
            return Err(LoaddagError::ScheduleError(format!(
                "{} is not a tick of schedule '{}'",
                logical_date.to_rfc3339(),
                self.expression
            )));
        }
        if !self.in_window(logical_date) {
            return Err(LoaddagError::ScheduleError(format!(
                "{} is outside the schedule window",
                logical_date.to_rfc3339()
            )));
        }

        let end = self
            .schedule
            .after(&logical_date)
            .next()
            .ok_or_else(|| LoaddagError::ScheduleError("schedule has no further ticks".into()))?;
        Ok(DataInterval::new(logical_date, end))
    }

    fn in_window(&self, tick: DateTime<Utc>) -> bool {
        tick >= self.start_date && self.end_date.is_none_or(|end| tick <= end)
    }

    /// Every interval whose logical date lies in `[from, to]`, clipped to the
    /// schedule window, in chronological order.
    pub fn intervals_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Vec<DataInterval> {
        let from = from.max(self.start_date);
        let to = match self.end_date {
            Some(end) => to.min(end),
            None => to,
        };

        let Some(first) = self.tick_at_or_after(from) else {
            return Vec::new();
        };

        let mut intervals = Vec::new();
        let mut current = first;
        for next in self.schedule.after(&first) {
            if current > to {
                break;
            }
            intervals.push(DataInterval::new(current, next));
            current = next;
        }
        intervals
    }

    /// Every interval of the whole window. Requires an `end_date` or a `now`
    /// to bound an open-ended schedule.
    pub fn all_intervals(&self, now: DateTime<Utc>) -> Vec<DataInterval> {
        let to = self.end_date.unwrap_or(now);
        self.intervals_between(self.start_date, to)
            .into_iter()
            .filter(|i| self.end_date.is_some() || i.end <= now)
            .collect()
    }

    /// Latest interval that has fully elapsed at `now`, inside the window.
    ///
    /// For a window that ended in the past this is the last interval of the
    /// window.
    pub fn latest_complete(&self, now: DateTime<Utc>) -> Option<DataInterval> {
        self.all_intervals(now)
            .into_iter()
            .filter(|i| i.end <= now)
            .next_back()
    }
}
