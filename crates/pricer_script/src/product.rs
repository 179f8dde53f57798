//! Scripted products: event texts turned into analysed, compiled events.
//!
//! [`ScriptProductBuilder`] collects event texts keyed by time, date or
//! schedule, product constants and macros, then [`ScriptProductBuilder::build`] runs
//! the analysis pipeline once. The resulting [`ScriptProduct`] is immutable
//! and shared by every simulation thread.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::NaiveDate;
use pricer_core::traits::Real;
use pricer_core::types::SampleDef;
use tracing::debug;

use crate::analysis::{
    collapse_constant_conditions, fold_constants, index_variables, process_ifs, DomainProcessor,
};
use crate::ast::Event;
use crate::compiler::{compile_event, CompiledEvent};
use crate::error::{ScriptError, ScriptResult};
use crate::evaluator::Evaluator;
use crate::fuzzy::FuzzyEvaluator;
use crate::parser::parse_event;
use crate::schedule::Schedule;
use crate::vm::CompiledEvaluator;

/// Days per year for date to time conversion (ACT/365).
const DAYS_PER_YEAR: f64 = 365.0;

/// Macro expansion rounds before giving up on self-reference.
const MAX_MACRO_ROUNDS: usize = 32;

#[derive(Clone, Debug)]
enum EventTime {
    Years(f64),
    Date(NaiveDate),
    Schedule(Schedule),
}

/// Builder for [`ScriptProduct`].
///
/// # Examples
/// ```
/// use pricer_script::ScriptProduct;
///
/// let product = ScriptProduct::builder()
///     .event(1.0, "IF SPOT() > STRIKE THEN OPT PAYS 1 END")
///     .constant("STRIKE", 100.0)
///     .payoff("OPT")
///     .build()
///     .unwrap();
/// assert_eq!(product.var_names(), &["OPT".to_string()]);
/// assert_eq!(product.event_times(), &[1.0]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct ScriptProductBuilder {
    events: Vec<(EventTime, String)>,
    evaluation_date: Option<NaiveDate>,
    constants: BTreeMap<String, f64>,
    macros: Vec<(String, String)>,
    payoff: Option<String>,
    fuzzy: bool,
}

impl ScriptProductBuilder {
    /// Adds an event at `time` years.
    pub fn event(mut self, time: f64, text: impl Into<String>) -> Self {
        self.events.push((EventTime::Years(time), text.into()));
        self
    }

    /// Adds an event on `date`; requires [`Self::evaluation_date`].
    pub fn dated_event(mut self, date: NaiveDate, text: impl Into<String>) -> Self {
        self.events.push((EventTime::Date(date), text.into()));
        self
    }

    /// Repeats `text` on the fixing date of every period of `schedule`;
    /// requires [`Self::evaluation_date`].
    pub fn scheduled_event(mut self, schedule: Schedule, text: impl Into<String>) -> Self {
        self.events.push((EventTime::Schedule(schedule), text.into()));
        self
    }

    /// Date that maps to time zero.
    pub fn evaluation_date(mut self, date: NaiveDate) -> Self {
        self.evaluation_date = Some(date);
        self
    }

    /// Named constant, substituted at parse time.
    pub fn constant(mut self, name: impl AsRef<str>, value: f64) -> Self {
        self.constants.insert(name.as_ref().to_uppercase(), value);
        self
    }

    /// Textual macro, expanded as a whole word before parsing.
    pub fn macro_text(mut self, name: impl AsRef<str>, replacement: impl AsRef<str>) -> Self {
        self.macros.push((
            name.as_ref().to_uppercase(),
            replacement.as_ref().to_uppercase(),
        ));
        self
    }

    /// Variable whose value after the last event is the payoff.
    pub fn payoff(mut self, name: impl AsRef<str>) -> Self {
        self.payoff = Some(name.as_ref().to_uppercase());
        self
    }

    /// Whether conditions will be evaluated fuzzily; enables the discrete
    /// smoothing windows of domain analysis.
    pub fn fuzzy(mut self, fuzzy: bool) -> Self {
        self.fuzzy = fuzzy;
        self
    }

    fn resolve_date(&self, date: NaiveDate) -> ScriptResult<f64> {
        let today = self.evaluation_date.ok_or_else(|| {
            ScriptError::Product(format!("event dated {} requires an evaluation date", date))
        })?;
        let days = (date - today).num_days();
        if days < 0 {
            return Err(ScriptError::Product(format!(
                "event dated {} precedes evaluation date {}",
                date, today
            )));
        }
        Ok(days as f64 / DAYS_PER_YEAR)
    }

    /// Event times in years; a schedule yields one per period.
    fn resolve_times(&self, at: &EventTime) -> ScriptResult<Vec<f64>> {
        match at {
            EventTime::Years(t) if t.is_finite() && *t >= 0.0 => Ok(vec![*t]),
            EventTime::Years(t) => Err(ScriptError::Product(format!(
                "event time {} is negative or not finite",
                t
            ))),
            EventTime::Date(date) => Ok(vec![self.resolve_date(*date)?]),
            EventTime::Schedule(schedule) => schedule
                .periods()?
                .iter()
                .map(|p| self.resolve_date(p.fixing))
                .collect(),
        }
    }

    /// Runs parse, indexing, if-processing, domain analysis, constant
    /// condition collapse, constant folding and compilation.
    ///
    /// # Errors
    /// - `Product` for a missing payoff, an event before the evaluation
    ///   date, a dated event without an evaluation date, or an empty
    ///   schedule
    /// - `Parse`, `Arity` from parsing
    /// - `Domain`, `Analysis` from the analysis passes
    /// - `UnknownVariable` when the payoff variable never appears
    pub fn build(self) -> ScriptResult<ScriptProduct> {
        let payoff = self
            .payoff
            .clone()
            .ok_or_else(|| ScriptError::Product("no payoff variable set".to_string()))?;

        let mut timed = Vec::with_capacity(self.events.len());
        for (at, text) in &self.events {
            let text = expand_macros(&text.to_uppercase(), &self.macros)?;
            for t in self.resolve_times(at)? {
                timed.push((t, text.clone()));
            }
        }
        timed.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut merged: Vec<(f64, String)> = Vec::with_capacity(timed.len());
        for (t, text) in timed {
            match merged.last_mut() {
                Some((last, acc)) if *last == t => {
                    acc.push('\n');
                    acc.push_str(&text);
                }
                _ => merged.push((t, text)),
            }
        }

        let event_times: Vec<f64> = merged.iter().map(|(t, _)| *t).collect();
        let mut events = merged
            .iter()
            .enumerate()
            .map(|(i, (_, text))| parse_event(text, i, &self.constants))
            .collect::<ScriptResult<Vec<Event>>>()?;
        debug!(events = events.len(), "parsed events");

        let var_names = index_variables(&mut events);
        debug!(variables = var_names.len(), "indexed variables");

        let max_nested_ifs = process_ifs(&mut events);
        debug!(max_nested_ifs, "processed ifs");

        DomainProcessor::new(var_names.len(), self.fuzzy).process(&mut events)?;
        let collapsed = collapse_constant_conditions(&mut events);
        debug!(collapsed, fuzzy = self.fuzzy, "analysed domains");

        fold_constants(&mut events, var_names.len())?;
        let compiled: Vec<CompiledEvent> = events.iter().map(compile_event).collect();

        let payoff_index = var_names
            .iter()
            .position(|n| *n == payoff)
            .ok_or(ScriptError::UnknownVariable(payoff))?;
        let defline = event_times.iter().map(|&t| SampleDef::at(t)).collect();

        Ok(ScriptProduct {
            event_times,
            events,
            var_names,
            payoff_index,
            max_nested_ifs,
            compiled,
            defline,
            fuzzy: self.fuzzy,
        })
    }
}

fn is_word_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.'
}

/// Replaces whole-word macro names until nothing changes.
fn expand_macros(text: &str, macros: &[(String, String)]) -> ScriptResult<String> {
    if macros.is_empty() {
        return Ok(text.to_string());
    }
    let mut current = text.to_string();
    for _ in 0..MAX_MACRO_ROUNDS {
        let mut out = String::with_capacity(current.len());
        let mut changed = false;
        let mut chars = current.char_indices().peekable();
        while let Some((start, c)) = chars.next() {
            if !is_word_start(c) {
                out.push(c);
                // Digits followed by letters stay one token, e.g. 1E5.
                if c.is_ascii_digit() {
                    while let Some(&(_, d)) = chars.peek() {
                        if !is_word_char(d) {
                            break;
                        }
                        out.push(d);
                        chars.next();
                    }
                }
                continue;
            }
            let mut end = start + c.len_utf8();
            while let Some(&(i, d)) = chars.peek() {
                if !is_word_char(d) {
                    break;
                }
                end = i + d.len_utf8();
                chars.next();
            }
            let word = &current[start..end];
            match macros.iter().find(|(name, _)| name == word) {
                Some((_, replacement)) => {
                    out.push_str(replacement);
                    changed = true;
                }
                None => out.push_str(word),
            }
        }
        if !changed {
            return Ok(out);
        }
        current = out;
    }
    Err(ScriptError::Product(
        "macro expansion does not terminate".to_string(),
    ))
}

/// Analysed and compiled product.
#[derive(Clone, Debug)]
pub struct ScriptProduct {
    event_times: Vec<f64>,
    events: Vec<Event>,
    var_names: Vec<String>,
    payoff_index: usize,
    max_nested_ifs: usize,
    compiled: Vec<CompiledEvent>,
    defline: Vec<SampleDef>,
    fuzzy: bool,
}

impl ScriptProduct {
    /// Starts a builder.
    pub fn builder() -> ScriptProductBuilder {
        ScriptProductBuilder::default()
    }

    /// Event times in years, sorted and distinct.
    pub fn event_times(&self) -> &[f64] {
        &self.event_times
    }

    /// Analysed statements, one list per event.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Variable names in index order.
    pub fn var_names(&self) -> &[String] {
        &self.var_names
    }

    /// Index of the payoff variable.
    pub fn payoff_index(&self) -> usize {
        self.payoff_index
    }

    /// Deepest `IF` nesting.
    pub fn max_nested_ifs(&self) -> usize {
        self.max_nested_ifs
    }

    /// Bytecode, one stream per event.
    pub fn compiled(&self) -> &[CompiledEvent] {
        &self.compiled
    }

    /// Observables needed at each event.
    pub fn defline(&self) -> &[SampleDef] {
        &self.defline
    }

    /// Whether the product was analysed for fuzzy evaluation.
    pub fn is_fuzzy(&self) -> bool {
        self.fuzzy
    }

    /// Exact tree-walking evaluator.
    pub fn evaluator<T: Real>(&self) -> Evaluator<T> {
        Evaluator::new(self.var_names.len(), self.payoff_index)
    }

    /// Fuzzy evaluator with default smoothing width `eps`.
    ///
    /// # Errors
    /// `Product` when `eps` is not positive.
    pub fn fuzzy_evaluator<T: Real>(&self, eps: f64) -> ScriptResult<FuzzyEvaluator<T>> {
        FuzzyEvaluator::new(
            self.var_names.len(),
            self.payoff_index,
            self.max_nested_ifs,
            eps,
        )
    }

    /// Bytecode evaluator.
    pub fn compiled_evaluator<T: Real>(&self) -> CompiledEvaluator<T> {
        CompiledEvaluator::new(self.var_names.len(), self.payoff_index)
    }

    /// Functional form of every analysed statement.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (i, (t, event)) in self.event_times.iter().zip(&self.events).enumerate() {
            let _ = writeln!(out, "EVENT {} (t = {})", i, t);
            for stmt in event {
                stmt.describe_into(&mut out, 2);
            }
        }
        out
    }
}
