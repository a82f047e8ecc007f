use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::info;

use crate::engine::Engine;
use crate::limits::*;
use crate::notify::NotifyHub;
use crate::reaper;

/// Opens one engine per golf course, keyed by its sanitized slug. Each
/// course gets its own WAL, hold sweeper and compactor.
pub struct CourseManager {
    engines: DashMap<String, Arc<Engine>>,
    data_dir: PathBuf,
    compact_threshold: u64,
    hold_ttl_seconds: u32,
    reaper_interval: Duration,
}

impl CourseManager {
    pub fn new(data_dir: PathBuf, compact_threshold: u64, hold_ttl_seconds: u32) -> Self {
        Self {
            engines: DashMap::new(),
            data_dir,
            compact_threshold,
            hold_ttl_seconds,
            reaper_interval: Duration::from_millis(DEFAULT_REAPER_INTERVAL_MS as u64),
        }
    }

    pub fn with_reaper_interval(mut self, every: Duration) -> Self {
        self.reaper_interval = every;
        self
    }

    /// Get or lazily open the engine for `course`. Names that sanitize to
    /// the same slug share one engine and one WAL.
    pub fn get_or_create(&self, course: &str) -> io::Result<Arc<Engine>> {
        if course.len() > MAX_COURSE_NAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "course name too long",
            ));
        }
        // The slug becomes a file name.
        let slug = sanitize(course);
        if slug.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty course name",
            ));
        }
        if let Some(engine) = self.engines.get(&slug) {
            return Ok(engine.value().clone());
        }
        if self.engines.len() >= MAX_COURSES {
            return Err(io::Error::other("too many courses"));
        }

        // Background tasks start only once the engine owns its map slot.
        let engine = match self.engines.entry(slug.clone()) {
            Entry::Occupied(existing) => return Ok(existing.get().clone()),
            Entry::Vacant(slot) => {
                let wal_path = self.data_dir.join(format!("{slug}.wal"));
                let notify = Arc::new(NotifyHub::new());
                let engine = Arc::new(Engine::new(wal_path, notify, self.hold_ttl_seconds)?);
                tokio::spawn(reaper::run_reaper(engine.clone(), self.reaper_interval));
                tokio::spawn(reaper::run_compactor(
                    engine.clone(),
                    self.compact_threshold,
                    self.reaper_interval,
                ));
                slot.insert(engine.clone());
                engine
            }
        };

        info!("opened course {slug}");
        metrics::gauge!(crate::observability::COURSES_ACTIVE).set(self.engines.len() as f64);
        Ok(engine)
    }

    /// Open every course that already has a WAL in the data directory.
    pub fn open_existing(&self) -> io::Result<Vec<String>> {
        let mut opened = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wal") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                self.get_or_create(stem)?;
                opened.push(stem.to_string());
            }
        }
        opened.sort();
        Ok(opened)
    }

    pub fn course_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.engines.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}

fn sanitize(course: &str) -> String {
    course
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-')
        .collect()
}
