//! Event schedules.
//!
//! A schedule cell stands for one event text repeated over a regular date
//! grid. Dates are generated forward from `start` in steps of `tenor`; a
//! shorter final period ends on `end`. Each period fixes either on its end
//! date (the default) or on its start date.
//!
//! No holiday calendar or business-day adjustment is applied.

use std::fmt;
use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ScriptError, ScriptResult};

/// Unit of a [`Tenor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TenorUnit {
    /// Calendar days
    Days,
    /// Weeks of seven days
    Weeks,
    /// Calendar months, clamped to month end
    Months,
    /// Calendar years
    Years,
}

/// Schedule step such as `3M` or `1Y`.
///
/// # Examples
/// ```
/// use pricer_script::schedule::{Tenor, TenorUnit};
///
/// let tenor: Tenor = "6m".parse().unwrap();
/// assert_eq!(tenor, Tenor::new(6, TenorUnit::Months));
/// assert_eq!(tenor.to_string(), "6M");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Tenor {
    count: u32,
    unit: TenorUnit,
}

impl Tenor {
    /// `count` units.
    pub fn new(count: u32, unit: TenorUnit) -> Self {
        Self { count, unit }
    }

    /// `date` moved forward by `k` tenors, or `None` past the calendar range.
    fn advance(&self, date: NaiveDate, k: u32) -> Option<NaiveDate> {
        let n = self.count.checked_mul(k)?;
        match self.unit {
            TenorUnit::Days => date.checked_add_days(Days::new(n.into())),
            TenorUnit::Weeks => date.checked_add_days(Days::new(u64::from(n) * 7)),
            TenorUnit::Months => date.checked_add_months(Months::new(n)),
            TenorUnit::Years => date.checked_add_months(Months::new(n.checked_mul(12)?)),
        }
    }
}

impl FromStr for Tenor {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || ScriptError::Product(format!("invalid tenor '{}'", s));
        let split = s.len().checked_sub(1).ok_or_else(invalid)?;
        if !s.is_char_boundary(split) {
            return Err(invalid());
        }
        let (count, unit) = s.split_at(split);
        let count: u32 = count.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }
        let unit = match unit.to_ascii_uppercase().as_str() {
            "D" => TenorUnit::Days,
            "W" => TenorUnit::Weeks,
            "M" => TenorUnit::Months,
            "Y" => TenorUnit::Years,
            _ => return Err(invalid()),
        };
        Ok(Self { count, unit })
    }
}

impl TryFrom<String> for Tenor {
    type Error = ScriptError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Tenor> for String {
    fn from(tenor: Tenor) -> Self {
        tenor.to_string()
    }
}

impl fmt::Display for Tenor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unit = match self.unit {
            TenorUnit::Days => 'D',
            TenorUnit::Weeks => 'W',
            TenorUnit::Months => 'M',
            TenorUnit::Years => 'Y',
        };
        write!(f, "{}{}", self.count, unit)
    }
}

/// Which end of a period its event fixes on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Fixing {
    /// Period start
    Begin,
    /// Period end
    #[default]
    End,
}

/// One generated period.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Period {
    /// First date of the period
    pub start: NaiveDate,
    /// Last date of the period
    pub end: NaiveDate,
    /// Date the period's event is observed
    pub fixing: NaiveDate,
}

/// Regular schedule between two dates.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use pricer_script::schedule::Schedule;
///
/// let d = |m| NaiveDate::from_ymd_opt(2024, m, 1).unwrap();
/// let schedule = Schedule::new(d(1), d(7), "3M".parse().unwrap());
/// let fixings: Vec<_> = schedule.periods().unwrap().iter().map(|p| p.fixing).collect();
/// assert_eq!(fixings, vec![d(4), d(7)]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Schedule {
    /// First period start
    pub start: NaiveDate,
    /// Last period end
    pub end: NaiveDate,
    /// Period length
    pub tenor: Tenor,
    /// Fixing convention
    #[cfg_attr(feature = "serde", serde(default))]
    pub fixing: Fixing,
}

impl Schedule {
    /// Schedule fixing at period ends.
    pub fn new(start: NaiveDate, end: NaiveDate, tenor: Tenor) -> Self {
        Self {
            start,
            end,
            tenor,
            fixing: Fixing::End,
        }
    }

    /// Sets the fixing convention.
    pub fn fixing(mut self, fixing: Fixing) -> Self {
        self.fixing = fixing;
        self
    }

    /// Period boundaries: `start`, then `start + k * tenor` while before
    /// `end`, then `end`.
    ///
    /// # Errors
    /// `Product` when `end` is not after `start`.
    pub fn dates(&self) -> ScriptResult<Vec<NaiveDate>> {
        if self.end <= self.start {
            return Err(ScriptError::Product(format!(
                "schedule end {} is not after start {}",
                self.end, self.start
            )));
        }
        // Stepping from start keeps month ends from drifting
        let mut dates = vec![self.start];
        for k in 1.. {
            match self.tenor.advance(self.start, k) {
                Some(date) if date < self.end => dates.push(date),
                _ => break,
            }
        }
        dates.push(self.end);
        Ok(dates)
    }

    /// Consecutive periods with their fixing dates.
    ///
    /// # Errors
    /// As [`Self::dates`].
    pub fn periods(&self) -> ScriptResult<Vec<Period>> {
        let dates = self.dates()?;
        Ok(dates
            .windows(2)
            .map(|w| Period {
                start: w[0],
                end: w[1],
                fixing: match self.fixing {
                    Fixing::Begin => w[0],
                    Fixing::End => w[1],
                },
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_tenor_parsing() {
        assert_eq!("1Y".parse::<Tenor>().unwrap(), Tenor::new(1, TenorUnit::Years));
        assert_eq!("2w".parse::<Tenor>().unwrap(), Tenor::new(2, TenorUnit::Weeks));
        assert_eq!("10D".parse::<Tenor>().unwrap(), Tenor::new(10, TenorUnit::Days));
        for bad in ["", "M", "0M", "3Q", "-1M", "1.5Y"] {
            assert!(bad.parse::<Tenor>().is_err(), "{}", bad);
        }
    }

    #[test]
    fn test_stub_period_ends_on_end_date() {
        let schedule = Schedule::new(date(2024, 1, 15), date(2024, 8, 1), "3M".parse().unwrap());
        assert_eq!(
            schedule.dates().unwrap(),
            vec![date(2024, 1, 15), date(2024, 4, 15), date(2024, 7, 15), date(2024, 8, 1)]
        );
    }

    #[test]
    fn test_month_end_does_not_drift() {
        let schedule = Schedule::new(date(2024, 1, 31), date(2024, 5, 31), "1M".parse().unwrap());
        assert_eq!(
            schedule.dates().unwrap(),
            vec![
                date(2024, 1, 31),
                date(2024, 2, 29),
                date(2024, 3, 31),
                date(2024, 4, 30),
                date(2024, 5, 31)
            ]
        );
    }

    #[test]
    fn test_fixing_convention() {
        let schedule = Schedule::new(date(2024, 1, 1), date(2025, 1, 1), "6M".parse().unwrap());
        let end: Vec<_> = schedule.periods().unwrap().iter().map(|p| p.fixing).collect();
        assert_eq!(end, vec![date(2024, 7, 1), date(2025, 1, 1)]);

        let begin: Vec<_> = schedule
            .fixing(Fixing::Begin)
            .periods()
            .unwrap()
            .iter()
            .map(|p| p.fixing)
            .collect();
        assert_eq!(begin, vec![date(2024, 1, 1), date(2024, 7, 1)]);
    }

    #[test]
    fn test_empty_schedule_rejected() {
        let schedule = Schedule::new(date(2024, 1, 1), date(2024, 1, 1), "1M".parse().unwrap());
        assert!(matches!(schedule.dates(), Err(ScriptError::Product(_))));
    }
}
