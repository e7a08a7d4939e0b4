use chrono::{Datelike, NaiveDate};

use super::TimelineError;

/// One date per year at a fixed month/day, earliest first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DateSequence {
    dates: Vec<NaiveDate>,
    labels: Vec<String>,
}

impl DateSequence {
    /// Build the sequence for `[start_year, end_year]` inclusive.
    pub fn yearly(start_year: i32, end_year: i32, month: u32, day: u32) -> Result<Self, TimelineError> {
        if end_year < start_year {
            return Err(TimelineError::InvalidRange { start_year, end_year });
        }

        // Validate both ends before allocating so absurd ranges fail fast
        for year in [start_year, end_year] {
            NaiveDate::from_ymd_opt(year, month, day)
                .ok_or(TimelineError::InvalidDate { year, month, day })?;
        }

        let count = (i64::from(end_year) - i64::from(start_year) + 1) as usize;
        let mut dates = Vec::with_capacity(count);
        for year in start_year..=end_year {
            let date = NaiveDate::from_ymd_opt(year, month, day)
                .ok_or(TimelineError::InvalidDate { year, month, day })?;
            dates.push(date);
        }

        let labels = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
        Ok(Self { dates, labels })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Always false for a constructed sequence; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// ISO date string at `index`
    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn year(&self, index: usize) -> Option<i32> {
        self.dates.get(index).map(|d| d.year())
    }

    pub fn index_of(&self, date: &str) -> Option<usize> {
        self.labels.iter().position(|label| label == date)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.labels.iter().map(String::as_str)
    }

    pub fn last_index(&self) -> usize {
        self.dates.len().saturating_sub(1)
    }
}
