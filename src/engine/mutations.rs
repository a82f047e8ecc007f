use chrono::NaiveDate;
use tokio::sync::oneshot;
use tracing::{info, warn};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::*;

use super::conflict::{validate_color, validate_name, validate_timeframes};
use super::resolver::{audit_seasons, resolve};
use super::{apply_hold, ConfigurationWarning, CourseState, Engine, EngineError, WalCommand};

impl Engine {
    /// Insert or replace a season. A date range that intersects another
    /// season is accepted and reported back as a warning.
    pub async fn save_season(
        &self,
        season: Season,
    ) -> Result<Vec<ConfigurationWarning>, EngineError> {
        validate_name(&season.name)?;
        validate_color(season.color.as_deref())?;
        validate_timeframes(&season.timeframes)?;
        if season.start_date > season.end_date {
            return Err(EngineError::InvalidDateRange {
                start: season.start_date,
                end: season.end_date,
            });
        }

        let id = season.id;
        let mut guard = self.state.write().await;
        if guard.season(&id).is_none() && guard.seasons.len() >= MAX_SEASONS {
            return Err(EngineError::LimitExceeded("too many seasons"));
        }
        self.persist_and_apply(&mut guard, &Event::SeasonSaved { season }).await?;

        let warnings: Vec<ConfigurationWarning> = audit_seasons(&guard.seasons)
            .into_iter()
            .filter(|w| {
                matches!(w, ConfigurationWarning::SeasonRangesIntersect { first, second, .. }
                    if *first == id || *second == id)
            })
            .collect();
        for w in &warnings {
            warn!("season {id} saved with ambiguous range: {w}");
        }
        metrics::counter!(CONFIG_WARNINGS_TOTAL).increment(warnings.len() as u64);
        Ok(warnings)
    }

    pub async fn delete_season(&self, id: Ulid) -> Result<(), EngineError> {
        let mut guard = self.state.write().await;
        if guard.season(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        self.persist_and_apply(&mut guard, &Event::SeasonDeleted { id }).await
    }

    /// Insert or replace an override. At most one override per date.
    pub async fn save_override(&self, entry: Override) -> Result<(), EngineError> {
        validate_name(&entry.name)?;
        validate_color(entry.color.as_deref())?;
        if let Some(set) = &entry.timeframes {
            validate_timeframes(set)?;
        }

        let mut guard = self.state.write().await;
        let same_date = guard
            .overrides
            .iter()
            .find(|o| o.date == entry.date && o.id != entry.id);
        if let Some(existing) = same_date {
            return Err(EngineError::DuplicateOverrideDate {
                date: entry.date,
                existing: existing.id,
            });
        }
        if guard.override_entry(&entry.id).is_none() && guard.overrides.len() >= MAX_OVERRIDES {
            return Err(EngineError::LimitExceeded("too many overrides"));
        }
        self.persist_and_apply(&mut guard, &Event::OverrideSaved { entry }).await
    }

    /// Drop an override; its date reverts to the season default.
    pub async fn delete_override(&self, id: Ulid) -> Result<(), EngineError> {
        let mut guard = self.state.write().await;
        if guard.override_entry(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        self.persist_and_apply(&mut guard, &Event::OverrideDeleted { id }).await
    }

    pub async fn save_template(&self, template: Template) -> Result<(), EngineError> {
        validate_name(&template.name)?;
        validate_color(template.color.as_deref())?;
        validate_timeframes(&template.timeframes)?;

        let mut guard = self.state.write().await;
        if guard.template(&template.id).is_none() && guard.templates.len() >= MAX_TEMPLATES {
            return Err(EngineError::LimitExceeded("too many templates"));
        }
        self.persist_and_apply(&mut guard, &Event::TemplateSaved { template }).await
    }

    pub async fn delete_template(&self, id: Ulid) -> Result<(), EngineError> {
        let mut guard = self.state.write().await;
        if guard.template(&id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        if guard.settings.default_template == Some(id) {
            return Err(EngineError::InUse(id));
        }
        self.persist_and_apply(&mut guard, &Event::TemplateDeleted { id }).await
    }

    pub async fn update_settings(&self, settings: CourseSettings) -> Result<(), EngineError> {
        let mut guard = self.state.write().await;
        if let Some(tid) = settings.default_template
            && guard.template(&tid).is_none()
        {
            return Err(EngineError::NotFound(tid));
        }
        if guard.settings.status != settings.status {
            info!("course status {} -> {}", guard.settings.status, settings.status);
        }
        self.persist_and_apply(&mut guard, &Event::SettingsUpdated { settings }).await
    }

    /// Swap in the bands an editor committed for `owner`.
    pub async fn replace_timeframes(
        &self,
        owner: TimeframeOwner,
        timeframes: TimeframeSet,
    ) -> Result<(), EngineError> {
        let result = self.replace_timeframes_inner(owner, timeframes).await;
        let status = if result.is_ok() { "ok" } else { "error" };
        metrics::counter!(TIMEFRAME_COMMITS_TOTAL, "owner" => owner.kind(), "status" => status)
            .increment(1);
        result
    }

    async fn replace_timeframes_inner(
        &self,
        owner: TimeframeOwner,
        timeframes: TimeframeSet,
    ) -> Result<(), EngineError> {
        validate_timeframes(&timeframes)?;
        let mut guard = self.state.write().await;
        let event = match owner {
            TimeframeOwner::Season(id) => {
                let mut season = guard.season(&id).cloned().ok_or(EngineError::NotFound(id))?;
                season.timeframes = timeframes;
                Event::SeasonSaved { season }
            }
            TimeframeOwner::Override(id) => {
                let mut entry =
                    guard.override_entry(&id).cloned().ok_or(EngineError::NotFound(id))?;
                entry.timeframes = Some(timeframes);
                Event::OverrideSaved { entry }
            }
            TimeframeOwner::Template(id) => {
                let mut template = guard.template(&id).cloned().ok_or(EngineError::NotFound(id))?;
                template.timeframes = timeframes;
                Event::TemplateSaved { template }
            }
        };
        self.persist_and_apply(&mut guard, &event).await
    }

    /// Hold `tee_time` on `date` for one cart. `now` becomes the hold's
    /// creation time.
    pub async fn place_hold(
        &self,
        id: Ulid,
        date: NaiveDate,
        tee_time: Minutes,
        now: Ms,
    ) -> Result<CartHold, EngineError> {
        // The write guard serializes competing holds on the same tee time.
        let guard = self.state.write().await;
        if !guard.settings.status.accepts_bookings() {
            return Err(EngineError::CourseUnavailable(guard.settings.status));
        }
        if self.holds.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        let effective =
            resolve(date, &guard.seasons, &guard.overrides, &guard.default_template()).effective;
        if !effective.timeframes.contains_minute(tee_time) {
            return Err(EngineError::NotBookable { date, tee_time });
        }
        let taken = self
            .holds
            .iter()
            .find(|h| h.date == date && h.tee_time == tee_time && !h.is_expired(now))
            .map(|h| *h.key());
        if let Some(existing) = taken {
            return Err(EngineError::Conflict(existing));
        }
        if self.holds.len() >= MAX_ACTIVE_HOLDS {
            return Err(EngineError::LimitExceeded("too many active holds"));
        }

        let hold = CartHold {
            id,
            date,
            tee_time,
            created_at: now,
            ttl_seconds: self.hold_ttl_seconds(),
        };
        let event = Event::HoldPlaced { hold: hold.clone() };
        self.wal_append(&event).await?;
        apply_hold(&self.holds, &event);
        self.notify.send(&event);
        metrics::counter!(HOLDS_PLACED_TOTAL).increment(1);
        metrics::gauge!(HOLDS_ACTIVE).increment(1.0);
        Ok(hold)
    }

    /// Release a hold. Only the call that actually removes it gets `true`,
    /// so overlapping sweeps release each hold at most once.
    pub async fn release_hold(&self, id: Ulid) -> Result<bool, EngineError> {
        // Shared guard keeps releases out of an in-progress compaction.
        let _guard = self.state.read().await;
        if !self.holds.contains_key(&id) {
            return Ok(false);
        }
        let event = Event::HoldReleased { id };
        self.wal_append(&event).await?;
        let released = apply_hold(&self.holds, &event);
        if released {
            self.notify.send(&event);
            metrics::gauge!(HOLDS_ACTIVE).decrement(1.0);
        }
        Ok(released)
    }

    pub fn collect_expired_holds(&self, now: Ms) -> Vec<Ulid> {
        self.holds
            .iter()
            .filter(|h| h.is_expired(now))
            .map(|h| *h.key())
            .collect()
    }

    /// Rewrite the WAL with only the events needed to recreate the current state.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let guard = self.state.write().await;
        let events = snapshot_events(&guard, self.holds.iter().map(|h| h.value().clone()));

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

fn snapshot_events(state: &CourseState, holds: impl Iterator<Item = CartHold>) -> Vec<Event> {
    let mut events = Vec::new();
    for template in &state.templates {
        events.push(Event::TemplateSaved {
            template: template.clone(),
        });
    }
    for season in &state.seasons {
        events.push(Event::SeasonSaved { season: season.clone() });
    }
    for entry in &state.overrides {
        events.push(Event::OverrideSaved { entry: entry.clone() });
    }
    events.push(Event::SettingsUpdated {
        settings: state.settings.clone(),
    });
    events.extend(holds.map(|hold| Event::HoldPlaced { hold }));
    events
}
