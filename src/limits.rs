use crate::model::Ms;

// ── Schema ───────────────────────────────────────────────

/// `name VARCHAR(120)` on seasons, overrides and templates.
pub const MAX_NAME_LEN: usize = 120;
/// `color VARCHAR(16)`.
pub const MAX_COLOR_LEN: usize = 16;
/// `daily_release_local VARCHAR(8)`.
pub const MAX_RELEASE_TIME_LEN: usize = 8;

pub const DEFAULT_SEASON_NAME: &str = "Untitled Season";
pub const DEFAULT_TEMPLATE_NAME: &str = "Untitled Template";
pub const DEFAULT_OVERRIDE_NAME: &str = "Untitled Override";

// ── Per-course caps ──────────────────────────────────────

pub const MAX_INTERVALS_PER_SET: usize = 96;
pub const MAX_SEASONS: usize = 512;
pub const MAX_OVERRIDES: usize = 4096;
pub const MAX_TEMPLATES: usize = 256;
pub const MAX_ACTIVE_HOLDS: usize = 10_000;

// ── Holds ────────────────────────────────────────────────

pub const DEFAULT_HOLD_TTL_SECONDS: u32 = 300;
pub const DEFAULT_REAPER_INTERVAL_MS: Ms = 5_000;

// ── Courses ──────────────────────────────────────────────

pub const MAX_COURSES: usize = 1024;
pub const MAX_COURSE_NAME_LEN: usize = 128;

// ── WAL ──────────────────────────────────────────────────

/// Largest payload a record may claim. A bigger length prefix is corruption.
pub const MAX_WAL_RECORD_BYTES: usize = 1 << 20;
