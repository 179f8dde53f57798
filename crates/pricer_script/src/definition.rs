//! Declarative product definitions.
//!
//! With the `serde` feature a [`ProductDefinition`] deserialises from the
//! `[product]` table of a product file:
//!
//! ```toml
//! [product]
//! payoff = "OPT"
//! evaluation_date = "2024-01-01"
//!
//! [[product.events]]
//! date = "2025-01-01"
//! script = "OPT PAYS MAX(SPOT() - K, 0)"
//!
//! [[product.events]]
//! schedule = { start = "2024-01-01", end = "2025-01-01", tenor = "3M" }
//! script = "IF SPOT() > K THEN N = N + 1 END"
//!
//! [product.constants]
//! K = 100.0
//! ```

use std::collections::BTreeMap;

use chrono::NaiveDate;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{ScriptError, ScriptResult};
use crate::product::ScriptProductBuilder;
use crate::schedule::Schedule;

/// One event: a time in years, a date or a schedule, and the script text.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventDefinition {
    /// Event time in years
    #[cfg_attr(feature = "serde", serde(default))]
    pub time: Option<f64>,
    /// Event date, converted against the evaluation date
    #[cfg_attr(feature = "serde", serde(default))]
    pub date: Option<NaiveDate>,
    /// Schedule the event repeats over
    #[cfg_attr(feature = "serde", serde(default))]
    pub schedule: Option<Schedule>,
    /// Statements of the event
    pub script: String,
}

/// Product as written in a product file.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProductDefinition {
    /// Payoff variable
    pub payoff: String,
    /// Date mapping to time zero
    #[cfg_attr(feature = "serde", serde(default))]
    pub evaluation_date: Option<NaiveDate>,
    /// Events, in any order
    pub events: Vec<EventDefinition>,
    /// Named constants
    #[cfg_attr(feature = "serde", serde(default))]
    pub constants: BTreeMap<String, f64>,
    /// Textual macros
    #[cfg_attr(feature = "serde", serde(default))]
    pub macros: BTreeMap<String, String>,
}

impl ProductDefinition {
    /// Builder carrying every field of the definition.
    ///
    /// # Errors
    /// `Product` when an event does not give exactly one of `time`, `date`
    /// and `schedule`.
    pub fn into_builder(self) -> ScriptResult<ScriptProductBuilder> {
        let mut builder = crate::ScriptProduct::builder().payoff(&self.payoff);
        if let Some(date) = self.evaluation_date {
            builder = builder.evaluation_date(date);
        }
        for (i, event) in self.events.into_iter().enumerate() {
            builder = match (event.time, event.date, event.schedule) {
                (Some(t), None, None) => builder.event(t, event.script),
                (None, Some(d), None) => builder.dated_event(d, event.script),
                (None, None, Some(s)) => builder.scheduled_event(s, event.script),
                _ => {
                    return Err(ScriptError::Product(format!(
                        "event {} must give exactly one of time, date and schedule",
                        i
                    )))
                }
            };
        }
        for (name, value) in &self.constants {
            builder = builder.constant(name, *value);
        }
        for (name, text) in &self.macros {
            builder = builder.macro_text(name, text);
        }
        Ok(builder)
    }
}
