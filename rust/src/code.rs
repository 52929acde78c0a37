//! Code generation.
//!
//! Code: `<prefix><timestamp><suffix>` with no separators, e.g.
//! `PO-` + `20240305` + `01`.
//!
//! [`CodeGen`] owns the running sequence counter and implements
//! `Iterator<Item = String>`. Use `next_code()` for the explicit domain API.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::format::{DateTemplate, SuffixFormat};

/// Errors that can occur while building a code generator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodeError {
    #[error("Unknown date format index: {0}")]
    UnknownDateFormat(usize),
    #[error("Unknown suffix format index: {0}")]
    UnknownSuffixFormat(usize),
    #[error("Invalid suffix template: {0:?}")]
    InvalidSuffixTemplate(String),
    #[error("Date template is empty")]
    EmptyDateTemplate,
}

/// Source of the wall-clock timestamp rendered into codes.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// What to generate: prefix plus indices into the built-in format tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRequest {
    #[serde(default)]
    pub prefix: String,
    pub date_format: usize,
    pub suffix_format: usize,
}

impl CodeRequest {
    pub fn new(prefix: impl Into<String>, date_format: usize, suffix_format: usize) -> Self {
        Self {
            prefix: prefix.into(),
            date_format,
            suffix_format,
        }
    }
}

/// Code generator with a sequence counter starting at 0.
#[derive(Debug, Clone)]
pub struct CodeGen<C = SystemClock> {
    prefix: String,
    date: DateTemplate,
    suffix: SuffixFormat,
    sequence: u64,
    clock: C,
}

impl CodeGen<SystemClock> {
    /// Create a generator reading the local wall clock.
    pub fn new(request: &CodeRequest) -> Result<Self, CodeError> {
        Self::with_clock(request, SystemClock)
    }
}

impl<C: Clock> CodeGen<C> {
    /// Create a generator with a chosen clock.
    pub fn with_clock(request: &CodeRequest, clock: C) -> Result<Self, CodeError> {
        let date = DateTemplate::from_index(request.date_format)?;
        let suffix = SuffixFormat::from_index(request.suffix_format)?;
        Ok(Self::from_parts(request.prefix.clone(), date, suffix, clock))
    }

    /// Create a generator from already-parsed templates.
    pub fn from_parts(
        prefix: impl Into<String>,
        date: DateTemplate,
        suffix: SuffixFormat,
        clock: C,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            date,
            suffix,
            sequence: 0,
            clock,
        }
    }

    /// Render the code for an explicit sequence value without touching the counter.
    pub fn code_at(&self, sequence: u64) -> String {
        let now = self.clock.now();
        compose(&self.prefix, &self.date, &self.suffix, sequence, &now)
    }

    /// Generate the next code (domain API).
    pub fn next_code(&mut self) -> String {
        let code = self.code_at(self.sequence);
        self.sequence += 1;
        code
    }

    /// Generate n codes.
    pub fn next_n(&mut self, n: usize) -> Vec<String> {
        (0..n).map(|_| self.next_code()).collect()
    }

    /// Sequence value the next code will use.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn reset(&mut self) {
        self.sequence = 0;
    }

    pub fn date_template(&self) -> &DateTemplate {
        &self.date
    }

    pub fn suffix_format(&self) -> &SuffixFormat {
        &self.suffix
    }
}

impl<C: Clock> Iterator for CodeGen<C> {
    type Item = String;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_code())
    }
}

fn compose(
    prefix: &str,
    date: &DateTemplate,
    suffix: &SuffixFormat,
    sequence: u64,
    now: &NaiveDateTime,
) -> String {
    let stamp = date.render(now);
    let tail = suffix.render(sequence);
    let mut code = String::with_capacity(prefix.len() + stamp.len() + tail.len());
    code.push_str(prefix);
    code.push_str(&stamp);
    code.push_str(&tail);
    code
}

/// Generate one code at an explicit timestamp.
pub fn generate_at(
    prefix: &str,
    date_format: usize,
    suffix_format: usize,
    sequence: u64,
    now: &NaiveDateTime,
) -> Result<String, CodeError> {
    let date = DateTemplate::from_index(date_format)?;
    let suffix = SuffixFormat::from_index(suffix_format)?;
    Ok(compose(prefix, &date, &suffix, sequence, now))
}

/// Generate one code against the local wall clock.
pub fn generate(
    prefix: &str,
    date_format: usize,
    suffix_format: usize,
    sequence: u64,
) -> Result<String, CodeError> {
    generate_at(
        prefix,
        date_format,
        suffix_format,
        sequence,
        &SystemClock.now(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_purchase_order_sequence() {
        let req = CodeRequest::new("PO-", 4, 0);
        let mut g = CodeGen::with_clock(&req, FixedClock(day(2024, 3, 5))).unwrap();
        assert_eq!(
            g.next_n(3),
            vec!["PO-2024030501", "PO-2024030502", "PO-2024030503"]
        );
        assert_eq!(g.sequence(), 3);
    }

    #[test]
    fn test_empty_prefix_month_format() {
        let code = generate_at("", 5, 2, 0, &day(2024, 3, 17)).unwrap();
        assert_eq!(code, "2024030001");
    }

    #[test]
    fn test_first_code_uses_template_value() {
        let code = generate_at("X", 4, 0, 0, &day(2024, 1, 2)).unwrap();
        assert!(code.ends_with("01"));
        let code = generate_at("X", 4, 1, 5, &day(2024, 1, 2)).unwrap();
        assert_eq!(code, "X20240102006");
    }

    #[test]
    fn test_rejects_out_of_range_indices() {
        assert_eq!(
            generate("A", 9, 0, 0),
            Err(CodeError::UnknownDateFormat(9))
        );
        assert_eq!(
            generate("A", 0, 7, 0),
            Err(CodeError::UnknownSuffixFormat(7))
        );
        assert!(CodeGen::new(&CodeRequest::new("", 0, 4)).is_err());
    }

    #[test]
    fn test_system_clock_shape() {
        let code = generate("ID", 0, 3, 0).unwrap();
        assert_eq!(code.len(), 2 + 17 + 5);
        assert!(code.starts_with("ID"));
        assert!(code.ends_with("00001"));
        assert!(code[2..].bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn test_reset_restarts_sequence() {
        let req = CodeRequest::new("", 4, 0);
        let mut g = CodeGen::with_clock(&req, FixedClock(day(2024, 3, 5))).unwrap();
        let first = g.next_n(2);
        g.reset();
        assert_eq!(g.sequence(), 0);
        assert_eq!(g.next_n(2), first);
    }

    #[test]
    fn test_iterator_take() {
        let req = CodeRequest::new("T", 4, 1);
        let g = CodeGen::with_clock(&req, FixedClock(day(2025, 6, 30))).unwrap();
        let v: Vec<String> = g.take(3).collect();
        assert_eq!(v, vec!["T20250630001", "T20250630002", "T20250630003"]);
    }

    #[test]
    fn test_code_at_leaves_counter_alone() {
        let req = CodeRequest::new("", 4, 0);
        let g = CodeGen::with_clock(&req, FixedClock(day(2024, 3, 5))).unwrap();
        assert_eq!(g.code_at(41), "2024030542");
        assert_eq!(g.sequence(), 0);
    }

    #[test]
    fn test_exposes_selected_templates() {
        let g = CodeGen::with_clock(&CodeRequest::new("", 2, 3), FixedClock(day(2024, 3, 5)))
            .unwrap();
        assert_eq!(g.date_template().as_str(), "yyyyMMddHHmm");
        assert_eq!(g.suffix_format().as_str(), "00001");
    }

    #[test]
    fn test_request_deserializes_with_default_prefix() {
        let req: CodeRequest =
            serde_json::from_str(r#"{"dateFormat":4,"suffixFormat":1}"#).unwrap();
        assert_eq!(req, CodeRequest::new("", 4, 1));
    }
}
