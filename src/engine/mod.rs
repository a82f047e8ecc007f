mod conflict;
mod editor;
mod error;
mod hold;
mod mutations;
mod queries;
mod resolver;

pub use conflict::{overlaps, validate_candidate, validate_set};
pub use editor::{Edit, Field, PendingEdit, TimeframeEditor};
pub use error::{
    ConfigurationWarning, EditorError, EngineError, OverlapError, ParseError, TimeError,
};
pub use hold::remaining_seconds;
pub use resolver::{audit_seasons, resolve, Resolution};

pub(crate) use conflict::now_ms;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};
use ulid::Ulid;

use crate::model::*;
use crate::notify::NotifyHub;
use crate::wal::Wal;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// Blocks for the first append, drains whatever else is queued, then does a
/// single flush + fsync for the batch before answering every sender.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut deferred = None;
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                        Ok(other) => {
                            deferred = Some(other);
                            break;
                        }
                        Err(_) => break,
                    }
                }

                metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE)
                    .record(batch.len() as f64);
                let flush_start = std::time::Instant::now();
                let result = flush_batch(&mut wal, &batch);
                metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
                    .record(flush_start.elapsed().as_secs_f64());
                respond_batch(batch, &result);

                if let Some(other) = deferred {
                    handle_non_append(&mut wal, other);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_batch(
    wal: &mut Wal,
    batch: &[(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Flush even after a failed append so stale bytes don't ride along with
    // the next batch.
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

fn respond_batch(batch: Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

// ── Course state ─────────────────────────────────────────

/// Everything an admin configures for one course. Entities are replaced
/// wholesale, never patched.
#[derive(Debug, Clone, Default)]
pub struct CourseState {
    pub seasons: Vec<Season>,
    pub overrides: Vec<Override>,
    pub templates: Vec<Template>,
    pub settings: CourseSettings,
}

impl CourseState {
    pub fn season(&self, id: &Ulid) -> Option<&Season> {
        self.seasons.iter().find(|s| s.id == *id)
    }

    pub fn override_entry(&self, id: &Ulid) -> Option<&Override> {
        self.overrides.iter().find(|o| o.id == *id)
    }

    pub fn template(&self, id: &Ulid) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == *id)
    }

    /// The configured default template, or an empty untitled one.
    pub fn default_template(&self) -> Template {
        self.settings
            .default_template
            .and_then(|id| self.template(&id).cloned())
            .unwrap_or_else(Template::untitled)
    }

    fn apply(&mut self, event: &Event) {
        match event {
            Event::SeasonSaved { season } => upsert(&mut self.seasons, season.clone(), |s| s.id),
            Event::SeasonDeleted { id } => self.seasons.retain(|s| s.id != *id),
            Event::OverrideSaved { entry } => upsert(&mut self.overrides, entry.clone(), |o| o.id),
            Event::OverrideDeleted { id } => self.overrides.retain(|o| o.id != *id),
            Event::TemplateSaved { template } => {
                upsert(&mut self.templates, template.clone(), |t| t.id)
            }
            Event::TemplateDeleted { id } => self.templates.retain(|t| t.id != *id),
            Event::SettingsUpdated { settings } => self.settings = settings.clone(),
            // Holds live in the engine's concurrent map, not here.
            Event::HoldPlaced { .. } | Event::HoldReleased { .. } => {}
        }
    }
}

fn upsert<T>(items: &mut Vec<T>, item: T, id_of: impl Fn(&T) -> Ulid) {
    let id = id_of(&item);
    match items.iter().position(|existing| id_of(existing) == id) {
        Some(pos) => items[pos] = item,
        None => items.push(item),
    }
}

/// Apply a hold event. Returns whether the map changed.
fn apply_hold(holds: &DashMap<Ulid, CartHold>, event: &Event) -> bool {
    match event {
        Event::HoldPlaced { hold } => holds.insert(hold.id, hold.clone()).is_none(),
        Event::HoldReleased { id } => holds.remove(id).is_some(),
        _ => false,
    }
}

/// One course's tee-sheet configuration and active cart holds, backed by a WAL.
pub struct Engine {
    pub(super) state: RwLock<CourseState>,
    pub(super) holds: DashMap<Ulid, CartHold>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub notify: Arc<NotifyHub>,
    hold_ttl_seconds: u32,
}

impl Engine {
    /// Replay the WAL at `wal_path` and start its writer task.
    /// Must be called from within a tokio runtime.
    pub fn new(
        wal_path: PathBuf,
        notify: Arc<NotifyHub>,
        hold_ttl_seconds: u32,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let mut state = CourseState::default();
        let holds = DashMap::new();
        for event in &events {
            state.apply(event);
            apply_hold(&holds, event);
        }
        metrics::gauge!(crate::observability::HOLDS_ACTIVE).increment(holds.len() as f64);

        Ok(Self {
            state: RwLock::new(state),
            holds,
            wal_tx,
            notify,
            hold_ttl_seconds,
        })
    }

    pub fn hold_ttl_seconds(&self) -> u32 {
        self.hold_ttl_seconds
    }

    /// Write event to WAL via the background group-commit writer.
    pub(super) async fn wal_append(&self, event: &Event) -> Result<(), EngineError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    /// WAL-append, then apply and notify. State is untouched if the append fails.
    pub(super) async fn persist_and_apply(
        &self,
        state: &mut CourseState,
        event: &Event,
    ) -> Result<(), EngineError> {
        self.wal_append(event).await?;
        state.apply(event);
        self.notify.send(event);
        Ok(())
    }
}
