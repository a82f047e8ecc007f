use chrono::NaiveDate;
use tracing::warn;
use ulid::Ulid;

use crate::model::*;

use super::ConfigurationWarning;

/// Effective bands for a date plus any data-integrity findings met on the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub effective: EffectiveTimeframe,
    pub warnings: Vec<ConfigurationWarning>,
}

/// Resolve the bands and color in force on `date`.
///
/// Precedence: an override with its own bands, then the season covering the
/// date, then `template_default`. Color falls through override, season and
/// template in that order. Ambiguous seasons or overrides resolve to the most
/// recently created entry and produce a warning instead of an error.
pub fn resolve(
    date: NaiveDate,
    seasons: &[Season],
    overrides: &[Override],
    template_default: &Template,
) -> Resolution {
    let mut warnings = Vec::new();

    let on_date = overrides.iter().filter(|o| o.date == date);
    let entry = pick_most_recent(on_date, |o: &Override| (o.created_at, o.id));
    let entry = entry.map(|(chosen, shadowed)| {
        if !shadowed.is_empty() {
            warnings.push(ConfigurationWarning::DuplicateOverrides {
                date,
                chosen: chosen.id,
                shadowed,
            });
        }
        chosen
    });

    let covering = seasons.iter().filter(|s| s.contains_date(date));
    let season = pick_most_recent(covering, |s: &Season| (s.created_at, s.id));
    let season = season.map(|(chosen, shadowed)| {
        if !shadowed.is_empty() {
            warnings.push(ConfigurationWarning::OverlappingSeasons {
                date,
                chosen: chosen.id,
                shadowed,
            });
        }
        chosen
    });

    for warning in &warnings {
        warn!("tee sheet configuration: {warning}");
    }

    let (timeframes, source) = match (entry.and_then(|o| o.timeframes.as_ref()), season) {
        (Some(own), _) => (own.clone(), Source::Override),
        (None, Some(season)) => (season.timeframes.clone(), Source::Season),
        (None, None) => (template_default.timeframes.clone(), Source::Template),
    };

    let color = entry
        .and_then(|o| o.color.clone())
        .or_else(|| season.and_then(|s| s.color.clone()))
        .or_else(|| template_default.color.clone());

    Resolution {
        effective: EffectiveTimeframe {
            date,
            timeframes,
            color,
            source,
        },
        warnings,
    }
}

/// Every pair of seasons whose inclusive date ranges intersect.
pub fn audit_seasons(seasons: &[Season]) -> Vec<ConfigurationWarning> {
    let mut findings = Vec::new();
    for (i, a) in seasons.iter().enumerate() {
        for b in &seasons[i + 1..] {
            let from = a.start_date.max(b.start_date);
            let to = a.end_date.min(b.end_date);
            if from <= to {
                findings.push(ConfigurationWarning::SeasonRangesIntersect {
                    first: a.id,
                    second: b.id,
                    from,
                    to,
                });
            }
        }
    }
    findings
}

/// Newest candidate by `key`, plus the ids it shadows.
fn pick_most_recent<'a, T: 'a>(
    candidates: impl Iterator<Item = &'a T>,
    key: impl Fn(&T) -> (Ms, Ulid),
) -> Option<(&'a T, Vec<Ulid>)> {
    let mut all: Vec<&T> = candidates.collect();
    all.sort_by_key(|c| std::cmp::Reverse(key(*c)));
    let mut iter = all.into_iter();
    let chosen = iter.next()?;
    let shadowed = iter.map(|c| key(c).1).collect();
    Some((chosen, shadowed))
}
