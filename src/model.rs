use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::engine::{validate_set, OverlapError, ParseError, TimeError};
use crate::limits::*;

/// Unix milliseconds.
pub type Ms = i64;

/// Minutes since local midnight, `0..=1440`.
pub type Minutes = u16;

pub const MINUTES_PER_DAY: Minutes = 1440;

/// Parse `"HH:MM"` (or `"H:MM"`) into minutes-of-day.
pub fn parse_time(raw: &str) -> Result<Minutes, ParseError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(ParseError::Empty);
    }
    let malformed = || ParseError::Malformed(s.to_string());
    let (h, m) = s.split_once(':').ok_or_else(malformed)?;
    if h.is_empty()
        || h.len() > 2
        || m.len() != 2
        || !h.bytes().all(|b| b.is_ascii_digit())
        || !m.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(malformed());
    }
    let hour: Minutes = h.parse().map_err(|_| malformed())?;
    let minute: Minutes = m.parse().map_err(|_| malformed())?;
    if hour > 23 {
        return Err(ParseError::HourOutOfRange(hour));
    }
    if minute > 59 {
        return Err(ParseError::MinuteOutOfRange(minute));
    }
    Ok(hour * 60 + minute)
}

/// Like [`parse_time`], but also accepts `"24:00"` as the end of the day.
pub fn parse_end_time(raw: &str) -> Result<Minutes, ParseError> {
    if raw.trim() == "24:00" {
        return Ok(MINUTES_PER_DAY);
    }
    parse_time(raw)
}

/// Zero-padded `"HH:MM"`. `1440` renders as `"24:00"`.
pub fn format_time(minutes: Minutes) -> String {
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}

/// Half-open band `[start, end)` within one day. Only built through
/// [`TimeInterval::new`], decoding included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawInterval")]
pub struct TimeInterval {
    start: Minutes,
    end: Minutes,
}

#[derive(Deserialize)]
struct RawInterval {
    start: Minutes,
    end: Minutes,
}

impl TryFrom<RawInterval> for TimeInterval {
    type Error = TimeError;

    fn try_from(raw: RawInterval) -> Result<Self, TimeError> {
        TimeInterval::new(raw.start, raw.end)
    }
}

impl TimeInterval {
    pub fn new(start: Minutes, end: Minutes) -> Result<Self, TimeError> {
        if end > MINUTES_PER_DAY {
            return Err(TimeError::OutOfDay(end));
        }
        if start >= end {
            return Err(TimeError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    /// Skips the range checks, for exercising the engine's re-validation.
    #[cfg(test)]
    pub(crate) fn new_unchecked(start: Minutes, end: Minutes) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> Minutes {
        self.start
    }

    pub fn end(&self) -> Minutes {
        self.end
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, TimeError> {
        let start = parse_time(start)?;
        let end = parse_end_time(end)?;
        Self::new(start, end)
    }

    pub fn duration_minutes(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_minute(&self, minute: Minutes) -> bool {
        self.start <= minute && minute < self.end
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}–{}", format_time(self.start), format_time(self.end))
    }
}

/// Bands for one template, season or override, kept in insertion order.
/// No two members overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeSet {
    intervals: Vec<TimeInterval>,
}

impl TimeframeSet {
    pub fn new(intervals: Vec<TimeInterval>) -> Result<Self, OverlapError> {
        validate_set(&intervals)?;
        Ok(Self { intervals })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Caller has already checked the pairwise invariant.
    pub(crate) fn from_validated(intervals: Vec<TimeInterval>) -> Self {
        Self { intervals }
    }

    pub fn as_slice(&self) -> &[TimeInterval] {
        &self.intervals
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeInterval> {
        self.intervals.iter()
    }

    pub fn get(&self, index: usize) -> Option<&TimeInterval> {
        self.intervals.get(index)
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Members ordered by start time, for display and slot generation.
    pub fn sorted(&self) -> Vec<TimeInterval> {
        let mut sorted = self.intervals.clone();
        sorted.sort_by_key(|i| i.start);
        sorted
    }

    pub fn contains_minute(&self, minute: Minutes) -> bool {
        self.intervals.iter().any(|i| i.contains_minute(minute))
    }
}

/// Date-range-scoped default bands. Both range ends are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub id: Ulid,
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub color: Option<String>,
    pub timeframes: TimeframeSet,
    pub created_at: Ms,
}

impl Season {
    pub fn new(
        id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        timeframes: TimeframeSet,
    ) -> Self {
        Self {
            id,
            name: DEFAULT_SEASON_NAME.to_string(),
            start_date,
            end_date,
            color: None,
            timeframes,
            created_at: id.timestamp_ms() as Ms,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_created_at(mut self, created_at: Ms) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

/// Single-date exception. Without its own bands it only changes the color.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Override {
    pub id: Ulid,
    pub name: String,
    pub date: NaiveDate,
    pub color: Option<String>,
    pub timeframes: Option<TimeframeSet>,
    pub created_at: Ms,
}

impl Override {
    pub fn new(id: Ulid, date: NaiveDate) -> Self {
        Self {
            id,
            name: DEFAULT_OVERRIDE_NAME.to_string(),
            date,
            color: None,
            timeframes: None,
            created_at: id.timestamp_ms() as Ms,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_timeframes(mut self, timeframes: TimeframeSet) -> Self {
        self.timeframes = Some(timeframes);
        self
    }

    pub fn with_created_at(mut self, created_at: Ms) -> Self {
        self.created_at = created_at;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: Ulid,
    pub name: String,
    pub color: Option<String>,
    pub timeframes: TimeframeSet,
    pub created_at: Ms,
}

impl Template {
    pub fn new(id: Ulid, timeframes: TimeframeSet) -> Self {
        Self {
            id,
            name: DEFAULT_TEMPLATE_NAME.to_string(),
            color: None,
            timeframes,
            created_at: id.timestamp_ms() as Ms,
        }
    }

    /// Fallback used when a course has no default template configured.
    pub fn untitled() -> Self {
        Self::new(Ulid::nil(), TimeframeSet::empty())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

/// Which entity's bands an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeframeOwner {
    Season(Ulid),
    Override(Ulid),
    Template(Ulid),
}

impl TimeframeOwner {
    pub fn id(&self) -> Ulid {
        match self {
            TimeframeOwner::Season(id)
            | TimeframeOwner::Override(id)
            | TimeframeOwner::Template(id) => *id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TimeframeOwner::Season(_) => "season",
            TimeframeOwner::Override(_) => "override",
            TimeframeOwner::Template(_) => "template",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseStatus {
    #[default]
    Active,
    Inactive,
    Suspended,
}

impl CourseStatus {
    pub fn accepts_bookings(&self) -> bool {
        matches!(self, CourseStatus::Active)
    }
}

impl fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourseStatus::Active => write!(f, "Active"),
            CourseStatus::Inactive => write!(f, "Inactive"),
            CourseStatus::Suspended => write!(f, "Suspended"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSettings {
    pub status: CourseStatus,
    /// Local time at which the next day's tee sheet opens for booking.
    pub daily_release_local: Option<Minutes>,
    pub default_template: Option<Ulid>,
}

impl CourseSettings {
    pub fn with_release_time(mut self, raw: &str) -> Result<Self, ParseError> {
        self.daily_release_local = Some(parse_time(raw)?);
        Ok(self)
    }

    /// Stored form of `daily_release_local`.
    pub fn release_time_label(&self) -> Option<String> {
        self.daily_release_local.map(format_time)
    }
}

/// Temporary lock on one tee time while a customer checks out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartHold {
    pub id: Ulid,
    pub date: NaiveDate,
    pub tee_time: Minutes,
    pub created_at: Ms,
    pub ttl_seconds: u32,
}

impl CartHold {
    pub fn remaining_seconds(&self, now: Ms) -> u32 {
        crate::engine::remaining_seconds(self.created_at, now, self.ttl_seconds)
    }

    pub fn is_expired(&self, now: Ms) -> bool {
        self.remaining_seconds(now) == 0
    }

    pub fn expires_at(&self) -> Ms {
        self.created_at + Ms::from(self.ttl_seconds) * 1000
    }
}

/// Where the effective bands for a date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Override,
    Season,
    Template,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Override => "override",
            Source::Season => "season",
            Source::Template => "template",
        }
    }
}

/// Fully resolved bands and color for one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveTimeframe {
    pub date: NaiveDate,
    pub timeframes: TimeframeSet,
    pub color: Option<String>,
    pub source: Source,
}

/// One committed change to a course. This is the WAL record format.
/// Saved entities are replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    SeasonSaved { season: Season },
    SeasonDeleted { id: Ulid },
    OverrideSaved { entry: Override },
    OverrideDeleted { id: Ulid },
    TemplateSaved { template: Template },
    TemplateDeleted { id: Ulid },
    SettingsUpdated { settings: CourseSettings },
    HoldPlaced { hold: CartHold },
    HoldReleased { id: Ulid },
}

impl Event {
    pub fn label(&self) -> &'static str {
        match self {
            Event::SeasonSaved { .. } => "season_saved",
            Event::SeasonDeleted { .. } => "season_deleted",
            Event::OverrideSaved { .. } => "override_saved",
            Event::OverrideDeleted { .. } => "override_deleted",
            Event::TemplateSaved { .. } => "template_saved",
            Event::TemplateDeleted { .. } => "template_deleted",
            Event::SettingsUpdated { .. } => "settings_updated",
            Event::HoldPlaced { .. } => "hold_placed",
            Event::HoldReleased { .. } => "hold_released",
        }
    }
}
