//! Date templates and suffix formats.
//!
//! A date template such as `yyyyMMdd` is tokenized once into literal and
//! token segments and then rendered against a wall-clock timestamp in a
//! single pass. Recognized tokens: `yyyy`, `MM`, `dd`, `HH`, `mm`, `ss`, `SSS`.
//!
//! A suffix template such as `001` is both a width (its length) and a
//! starting offset (its numeric value).

use chrono::{Datelike, NaiveDateTime, Timelike};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::code::CodeError;

/// Built-in date templates, addressed by index from the form layer.
pub const DATE_FORMATS: [&str; 6] = [
    "yyyyMMddHHmmssSSS",
    "yyyyMMddHHmmss",
    "yyyyMMddHHmm",
    "yyyyMMddHH",
    "yyyyMMdd",
    "yyyyMM",
];

/// Built-in suffix templates, addressed by index from the form layer.
pub const SUFFIX_FORMATS: [&str; 4] = ["01", "001", "0001", "00001"];

static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"yyyy|SSS|MM|dd|HH|mm|ss").unwrap());

/// A timestamp component placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millis,
}

impl Token {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Year => "yyyy",
            Self::Month => "MM",
            Self::Day => "dd",
            Self::Hour => "HH",
            Self::Minute => "mm",
            Self::Second => "ss",
            Self::Millis => "SSS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "yyyy" => Some(Self::Year),
            "MM" => Some(Self::Month),
            "dd" => Some(Self::Day),
            "HH" => Some(Self::Hour),
            "mm" => Some(Self::Minute),
            "ss" => Some(Self::Second),
            "SSS" => Some(Self::Millis),
            _ => None,
        }
    }

    /// Rendered width in characters.
    pub fn width(self) -> usize {
        match self {
            Self::Year => 4,
            Self::Millis => 3,
            _ => 2,
        }
    }

    fn render_into(self, ts: &NaiveDateTime, out: &mut String) {
        let rendered = match self {
            // years are already four digits wide
            Self::Year => ts.year().to_string(),
            Self::Month => format!("{:02}", ts.month()),
            Self::Day => format!("{:02}", ts.day()),
            Self::Hour => format!("{:02}", ts.hour()),
            Self::Minute => format!("{:02}", ts.minute()),
            Self::Second => format!("{:02}", ts.second()),
            // leap seconds carry nanos past 1e9
            Self::Millis => format!("{:03}", (ts.nanosecond() / 1_000_000).min(999)),
        };
        out.push_str(&rendered);
    }
}

/// One piece of a tokenized date template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Token(Token),
}

/// A date template split into literal and token segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl DateTemplate {
    /// Tokenize an arbitrary template. Text between tokens is kept verbatim.
    pub fn parse(template: &str) -> Result<Self, CodeError> {
        if template.is_empty() {
            return Err(CodeError::EmptyDateTemplate);
        }

        let mut segments = Vec::new();
        let mut last = 0;
        for m in TOKEN_PATTERN.find_iter(template) {
            if m.start() > last {
                segments.push(Segment::Literal(template[last..m.start()].to_string()));
            }
            if let Some(token) = Token::parse(m.as_str()) {
                segments.push(Segment::Token(token));
            }
            last = m.end();
        }
        if last < template.len() {
            segments.push(Segment::Literal(template[last..].to_string()));
        }

        Ok(Self {
            source: template.to_string(),
            segments,
        })
    }

    /// Look up one of the built-in [`DATE_FORMATS`].
    pub fn from_index(index: usize) -> Result<Self, CodeError> {
        let template = DATE_FORMATS
            .get(index)
            .ok_or(CodeError::UnknownDateFormat(index))?;
        Self::parse(template)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Length of every rendering of this template (for four-digit years).
    pub fn rendered_len(&self) -> usize {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Literal(text) => text.len(),
                Segment::Token(token) => token.width(),
            })
            .sum()
    }

    pub fn render(&self, ts: &NaiveDateTime) -> String {
        let mut out = String::with_capacity(self.rendered_len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(token) => token.render_into(ts, &mut out),
            }
        }
        out
    }
}

/// Zero-padded numeric suffix whose template value is also its starting offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuffixFormat {
    template: String,
    width: usize,
    offset: u64,
}

impl SuffixFormat {
    /// Accepts any non-empty run of ASCII digits.
    pub fn parse(template: &str) -> Result<Self, CodeError> {
        if template.is_empty() || !template.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeError::InvalidSuffixTemplate(template.to_string()));
        }
        let offset = template
            .parse::<u64>()
            .map_err(|_| CodeError::InvalidSuffixTemplate(template.to_string()))?;

        Ok(Self {
            template: template.to_string(),
            width: template.len(),
            offset,
        })
    }

    /// Look up one of the built-in [`SUFFIX_FORMATS`].
    pub fn from_index(index: usize) -> Result<Self, CodeError> {
        let template = SUFFIX_FORMATS
            .get(index)
            .ok_or(CodeError::UnknownSuffixFormat(index))?;
        Self::parse(template)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Render `sequence + offset`, zero-padded to at least the template width.
    /// Values wider than the template are not truncated.
    pub fn render(&self, sequence: u64) -> String {
        let value = sequence.saturating_add(self.offset);
        format!("{:0width$}", value, width = self.width)
    }
}
