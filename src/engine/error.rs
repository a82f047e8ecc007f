use std::fmt;

use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::{format_time, CourseStatus, Minutes, TimeInterval};

use super::editor::Field;

/// A time-of-day string that could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    Malformed(String),
    HourOutOfRange(Minutes),
    MinuteOutOfRange(Minutes),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Empty => write!(f, "time is required"),
            ParseError::Malformed(raw) => write!(f, "invalid time {raw:?}, expected HH:MM"),
            ParseError::HourOutOfRange(h) => write!(f, "hour {h} out of range (0-23)"),
            ParseError::MinuteOutOfRange(m) => write!(f, "minute {m} out of range (0-59)"),
        }
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeError {
    Parse(ParseError),
    InvalidInterval { start: Minutes, end: Minutes },
    OutOfDay(Minutes),
}

impl fmt::Display for TimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeError::Parse(e) => write!(f, "{e}"),
            TimeError::InvalidInterval { start, end } => write!(
                f,
                "start {} must be before end {}",
                format_time(*start),
                format_time(*end)
            ),
            TimeError::OutOfDay(m) => write!(f, "minute {m} is past the end of the day"),
        }
    }
}

impl std::error::Error for TimeError {}

impl From<ParseError> for TimeError {
    fn from(e: ParseError) -> Self {
        TimeError::Parse(e)
    }
}

/// First existing band a candidate collides with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapError {
    pub conflicting: TimeInterval,
    /// Position of `conflicting` in its set.
    pub index: usize,
}

impl fmt::Display for OverlapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Overlaps {}", self.conflicting)
    }
}

impl std::error::Error for OverlapError {}

/// Validation outcome surfaced by the timeframe editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    Field { field: Field, error: ParseError },
    Interval(TimeError),
    Overlap(OverlapError),
    NoPendingEdit,
    IndexOutOfRange(usize),
}

impl fmt::Display for EditorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorError::Field { field, error } => write!(f, "{field}: {error}"),
            EditorError::Interval(e) => write!(f, "{e}"),
            EditorError::Overlap(e) => write!(f, "{e}"),
            EditorError::NoPendingEdit => write!(f, "no band is being edited"),
            EditorError::IndexOutOfRange(i) => write!(f, "no band at position {i}"),
        }
    }
}

impl std::error::Error for EditorError {}

/// Data-integrity findings that never block resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationWarning {
    OverlappingSeasons {
        date: NaiveDate,
        chosen: Ulid,
        shadowed: Vec<Ulid>,
    },
    DuplicateOverrides {
        date: NaiveDate,
        chosen: Ulid,
        shadowed: Vec<Ulid>,
    },
    SeasonRangesIntersect {
        first: Ulid,
        second: Ulid,
        from: NaiveDate,
        to: NaiveDate,
    },
}

impl fmt::Display for ConfigurationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationWarning::OverlappingSeasons { date, chosen, shadowed } => write!(
                f,
                "{} seasons cover {date}; using most recent {chosen}, shadowing {shadowed:?}",
                shadowed.len() + 1
            ),
            ConfigurationWarning::DuplicateOverrides { date, chosen, shadowed } => write!(
                f,
                "{} overrides on {date}; using most recent {chosen}, shadowing {shadowed:?}",
                shadowed.len() + 1
            ),
            ConfigurationWarning::SeasonRangesIntersect { first, second, from, to } => {
                write!(f, "seasons {first} and {second} both cover {from}..={to}")
            }
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    DuplicateOverrideDate { date: NaiveDate, existing: Ulid },
    /// Tee time already held by an unexpired cart.
    Conflict(Ulid),
    /// Template is the course default.
    InUse(Ulid),
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
    CourseUnavailable(CourseStatus),
    NotBookable { date: NaiveDate, tee_time: Minutes },
    Validation(EditorError),
    LimitExceeded(&'static str),
    WalError(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::DuplicateOverrideDate { date, existing } => {
                write!(f, "override {existing} already exists for {date}")
            }
            EngineError::Conflict(id) => write!(f, "tee time held by cart {id}"),
            EngineError::InUse(id) => write!(f, "template {id} is the course default"),
            EngineError::InvalidDateRange { start, end } => {
                write!(f, "season start {start} is after end {end}")
            }
            EngineError::CourseUnavailable(status) => write!(f, "course is {status}"),
            EngineError::NotBookable { date, tee_time } => {
                write!(f, "{} on {date} is outside every band", format_time(*tee_time))
            }
            EngineError::Validation(e) => write!(f, "validation failed: {e}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<EditorError> for EngineError {
    fn from(e: EditorError) -> Self {
        EngineError::Validation(e)
    }
}
