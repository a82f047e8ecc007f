use crate::limits::*;
use crate::model::*;

use super::{EditorError, EngineError, OverlapError};

pub(crate) fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

/// Half-open overlap: touching endpoints do not collide.
pub fn overlaps(a: &TimeInterval, b: &TimeInterval) -> bool {
    a.start() < b.end() && b.start() < a.end()
}

/// Check `candidate` against `existing` in insertion order, skipping the
/// member at `replacing` (the band being edited in place).
pub fn validate_candidate(
    candidate: &TimeInterval,
    existing: &[TimeInterval],
    replacing: Option<usize>,
) -> Result<(), OverlapError> {
    for (index, other) in existing.iter().enumerate() {
        if Some(index) == replacing {
            continue;
        }
        if overlaps(candidate, other) {
            return Err(OverlapError {
                conflicting: *other,
                index,
            });
        }
    }
    Ok(())
}

/// Whole-set invariant. Reports the earlier member of the first colliding pair.
pub fn validate_set(intervals: &[TimeInterval]) -> Result<(), OverlapError> {
    for (i, candidate) in intervals.iter().enumerate().skip(1) {
        validate_candidate(candidate, &intervals[..i], None)?;
    }
    Ok(())
}

pub(crate) fn validate_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::LimitExceeded("name is empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("name too long"));
    }
    Ok(())
}

pub(crate) fn validate_color(color: Option<&str>) -> Result<(), EngineError> {
    if let Some(c) = color
        && (c.is_empty() || c.len() > MAX_COLOR_LEN)
    {
        return Err(EngineError::LimitExceeded("color must be 1-16 characters"));
    }
    Ok(())
}

pub(crate) fn validate_timeframes(set: &TimeframeSet) -> Result<(), EngineError> {
    if set.len() > MAX_INTERVALS_PER_SET {
        return Err(EngineError::LimitExceeded("too many bands"));
    }
    // Decoded sets skip `TimeframeSet::new`, so recheck bands and overlaps.
    for band in set.iter() {
        TimeInterval::new(band.start(), band.end())
            .map_err(|e| EngineError::Validation(EditorError::Interval(e)))?;
    }
    validate_set(set.as_slice()).map_err(|e| EngineError::Validation(EditorError::Overlap(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(start: &str, end: &str) -> TimeInterval {
        TimeInterval::parse(start, end).unwrap()
    }

    #[test]
    fn touching_bands_do_not_overlap() {
        let pairs = [
            (band("07:00", "08:00"), band("08:00", "09:00")),
            (band("00:00", "00:01"), band("00:01", "24:00")),
            (band("06:00", "07:00"), band("12:00", "13:00")),
        ];
        for (a, b) in pairs {
            assert!(!overlaps(&a, &b), "{a} vs {b}");
            assert!(!overlaps(&b, &a), "{b} vs {a}");
        }
    }

    #[test]
    fn intersecting_bands_overlap() {
        let pairs = [
            (band("07:00", "08:00"), band("07:30", "08:30")),
            (band("07:00", "12:00"), band("09:00", "10:00")),
            (band("07:00", "08:00"), band("07:00", "08:00")),
            (band("07:00", "08:01"), band("08:00", "09:00")),
        ];
        for (a, b) in pairs {
            assert!(overlaps(&a, &b), "{a} vs {b}");
            assert!(overlaps(&b, &a), "{b} vs {a}");
        }
    }

    #[test]
    fn candidate_between_defaults_is_clean() {
        let existing = [band("07:00", "08:00"), band("09:00", "11:00")];
        assert!(validate_candidate(&band("08:00", "09:00"), &existing, None).is_ok());
    }

    #[test]
    fn candidate_reports_first_conflict_in_insertion_order() {
        let existing = [band("09:00", "11:00"), band("07:00", "08:00")];
        let err = validate_candidate(&band("07:30", "10:00"), &existing, None).unwrap_err();
        assert_eq!(err.conflicting, band("09:00", "11:00"));
        assert_eq!(err.index, 0);
        assert_eq!(err.to_string(), "Overlaps 09:00–11:00");
    }

    #[test]
    fn candidate_skips_band_being_replaced() {
        let existing = [band("07:00", "08:00"), band("09:00", "11:00")];
        assert!(validate_candidate(&band("07:00", "08:30"), &existing, Some(0)).is_ok());
        let err = validate_candidate(&band("07:00", "09:30"), &existing, Some(0)).unwrap_err();
        assert_eq!(err.index, 1);
    }

    #[test]
    fn clean_set_validates_in_any_order() {
        let bands = [band("07:00", "08:00"), band("08:00", "09:00"), band("09:00", "11:00")];
        let orders = [[0, 1, 2], [0, 2, 1], [1, 0, 2], [1, 2, 0], [2, 0, 1], [2, 1, 0]];
        for order in orders {
            let permuted: Vec<_> = order.iter().map(|&i| bands[i]).collect();
            assert!(validate_set(&permuted).is_ok(), "{permuted:?}");
        }
    }

    #[test]
    fn set_reports_earlier_member_of_first_pair() {
        let bands = [band("12:00", "13:00"), band("07:00", "08:00"), band("07:30", "12:30")];
        let err = validate_set(&bands).unwrap_err();
        assert_eq!(err.conflicting, band("12:00", "13:00"));
    }

    #[test]
    fn names_and_colors_follow_schema() {
        assert!(validate_name("Summer").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
        assert!(validate_color(None).is_ok());
        assert!(validate_color(Some("#1b5e20")).is_ok());
        assert!(validate_color(Some("")).is_err());
        assert!(validate_color(Some(&"f".repeat(MAX_COLOR_LEN + 1))).is_err());
    }
}
