use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::*;
use crate::observability::RESOLUTIONS_TOTAL;

use super::resolver::{audit_seasons, resolve};
use super::{ConfigurationWarning, Engine, EngineError, Resolution, TimeframeEditor};

impl Engine {
    /// Effective bands and color for `date`, with any ambiguity warnings.
    pub async fn resolve(&self, date: NaiveDate) -> Resolution {
        let guard = self.state.read().await;
        let resolution = resolve(date, &guard.seasons, &guard.overrides, &guard.default_template());
        let source = resolution.effective.source.as_str();
        metrics::counter!(RESOLUTIONS_TOTAL, "source" => source).increment(1);
        resolution
    }

    pub async fn effective_timeframe(&self, date: NaiveDate) -> EffectiveTimeframe {
        self.resolve(date).await.effective
    }

    /// Whether a new hold could land on `minute` of `date`, ignoring other holds.
    pub async fn is_bookable(&self, date: NaiveDate, minute: Minutes) -> bool {
        let guard = self.state.read().await;
        guard.settings.status.accepts_bookings()
            && resolve(date, &guard.seasons, &guard.overrides, &guard.default_template())
                .effective
                .timeframes
                .contains_minute(minute)
    }

    /// Open an editor on the bands `owner` currently holds. An override
    /// without its own bands starts from what its date would otherwise get.
    pub async fn editor_for(&self, owner: TimeframeOwner) -> Result<TimeframeEditor, EngineError> {
        let guard = self.state.read().await;
        let set = match owner {
            TimeframeOwner::Season(id) => {
                guard.season(&id).ok_or(EngineError::NotFound(id))?.timeframes.clone()
            }
            TimeframeOwner::Template(id) => {
                guard.template(&id).ok_or(EngineError::NotFound(id))?.timeframes.clone()
            }
            TimeframeOwner::Override(id) => {
                let entry = guard.override_entry(&id).ok_or(EngineError::NotFound(id))?;
                match &entry.timeframes {
                    Some(own) => own.clone(),
                    None => {
                        resolve(entry.date, &guard.seasons, &[], &guard.default_template())
                            .effective
                            .timeframes
                    }
                }
            }
        };
        Ok(TimeframeEditor::new(set))
    }

    /// Season date ranges that intersect, for admin review.
    pub async fn audit(&self) -> Vec<ConfigurationWarning> {
        audit_seasons(&self.state.read().await.seasons)
    }

    pub async fn seasons(&self) -> Vec<Season> {
        self.state.read().await.seasons.clone()
    }

    pub async fn overrides(&self) -> Vec<Override> {
        self.state.read().await.overrides.clone()
    }

    pub async fn templates(&self) -> Vec<Template> {
        self.state.read().await.templates.clone()
    }

    pub async fn settings(&self) -> CourseSettings {
        self.state.read().await.settings.clone()
    }

    /// Active holds, oldest first.
    pub fn holds(&self) -> Vec<CartHold> {
        let mut holds: Vec<CartHold> = self.holds.iter().map(|h| h.value().clone()).collect();
        holds.sort_by_key(|h| (h.created_at, h.id));
        holds
    }

    pub fn hold(&self, id: &Ulid) -> Option<CartHold> {
        self.holds.get(id).map(|h| h.value().clone())
    }

    pub fn hold_remaining_seconds(&self, id: &Ulid, now: Ms) -> Option<u32> {
        self.holds.get(id).map(|h| h.remaining_seconds(now))
    }
}
