//! Small identifier and calendar types shared by every layer of the crate.

use std::fmt;
use std::str::FromStr;

use time::{Date, Month};

/// Index of a record type inside a [`crate::schema::SchemaArena`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TypeId(pub u32);

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

/// Calendar month without a day component, written as `YYYY-MM`.
///
/// Field order matters: the derived ordering compares the year first.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct YearMonth {
    /// Four digit year.
    pub year: i32,
    /// Month in `1..=12`.
    pub month: u8,
}

/// Reason a `YYYY-MM` literal could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid year-month, expected YYYY-MM")]
pub struct YearMonthParseError(pub String);

impl YearMonth {
    /// Builds a year-month, rejecting months outside `1..=12`.
    pub fn new(year: i32, month: u8) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Year-month containing the given calendar date.
    pub fn of_date(date: Date) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
        }
    }

    /// First day of the month, used when a full date is required.
    pub fn first_day(self) -> Option<Date> {
        let month = Month::try_from(self.month).ok()?;
        Date::from_calendar_date(self.year, month, 1).ok()
    }
}

impl FromStr for YearMonth {
    type Err = YearMonthParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let err = || YearMonthParseError(raw.to_owned());
        let (year, month) = raw.trim().split_once('-').ok_or_else(err)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(err());
        }
        let year = year.parse::<i32>().map_err(|_| err())?;
        let month = month.parse::<u8>().map_err(|_| err())?;
        YearMonth::new(year, month).ok_or_else(err)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
