use std::fmt;

use crate::model::*;

use super::conflict::validate_candidate;
use super::{EditorError, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Start,
    End,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Start => write!(f, "start"),
            Field::End => write!(f, "end"),
        }
    }
}

/// Candidate band as typed. `index` is `None` for a band not yet in the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEdit {
    pub index: Option<usize>,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Begin(usize),
    BeginNew,
    SetField(Field, String),
    Commit,
    Cancel,
    Add(TimeInterval),
    Remove(usize),
}

/// Admin-side editing state for one set of bands.
///
/// Every change re-runs validation against the rest of the set, so
/// `errors()` always reflects the current candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeframeEditor {
    set: TimeframeSet,
    pending: Option<PendingEdit>,
    errors: Vec<EditorError>,
}

impl TimeframeEditor {
    pub fn new(set: TimeframeSet) -> Self {
        Self {
            set,
            pending: None,
            errors: Vec::new(),
        }
    }

    pub fn set(&self) -> &TimeframeSet {
        &self.set
    }

    pub fn pending(&self) -> Option<&PendingEdit> {
        self.pending.as_ref()
    }

    pub fn errors(&self) -> &[EditorError] {
        &self.errors
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_set(self) -> TimeframeSet {
        self.set
    }

    pub fn begin_edit(&mut self, index: usize) -> Result<(), EditorError> {
        let current = *self.set.get(index).ok_or(EditorError::IndexOutOfRange(index))?;
        self.pending = Some(PendingEdit {
            index: Some(index),
            start: format_time(current.start()),
            end: format_time(current.end()),
        });
        self.revalidate();
        Ok(())
    }

    pub fn begin_new(&mut self) {
        self.pending = Some(PendingEdit {
            index: None,
            start: String::new(),
            end: String::new(),
        });
        self.errors.clear();
    }

    pub fn cancel(&mut self) {
        self.pending = None;
        self.errors.clear();
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) -> Result<(), EditorError> {
        let pending = self.pending.as_mut().ok_or(EditorError::NoPendingEdit)?;
        match field {
            Field::Start => pending.start = value.into(),
            Field::End => pending.end = value.into(),
        }
        self.revalidate();
        Ok(())
    }

    /// Apply the pending edit and return the resulting set.
    pub fn commit(&mut self) -> Result<TimeframeSet, EditorError> {
        let pending = self.pending.clone().ok_or(EditorError::NoPendingEdit)?;
        let candidate = match self.evaluate(&pending, true) {
            Ok(candidate) => candidate,
            Err(errors) => {
                let first = errors.first().cloned().unwrap_or(EditorError::NoPendingEdit);
                self.errors = errors;
                return Err(first);
            }
        };

        let mut intervals = self.set.as_slice().to_vec();
        match pending.index {
            Some(index) => intervals[index] = candidate,
            None => intervals.push(candidate),
        }
        self.set = TimeframeSet::from_validated(intervals);
        self.pending = None;
        self.errors.clear();
        Ok(self.set.clone())
    }

    pub fn add_interval(&mut self, interval: TimeInterval) -> Result<&TimeframeSet, EditorError> {
        if let Err(e) = validate_candidate(&interval, self.set.as_slice(), None) {
            let err = EditorError::Overlap(e);
            self.errors = vec![err.clone()];
            return Err(err);
        }
        let mut intervals = self.set.as_slice().to_vec();
        intervals.push(interval);
        self.set = TimeframeSet::from_validated(intervals);
        self.revalidate();
        Ok(&self.set)
    }

    pub fn remove_interval(&mut self, index: usize) -> Result<TimeInterval, EditorError> {
        if index >= self.set.len() {
            return Err(EditorError::IndexOutOfRange(index));
        }
        let mut intervals = self.set.as_slice().to_vec();
        let removed = intervals.remove(index);
        self.set = TimeframeSet::from_validated(intervals);

        match self.pending.as_ref().and_then(|p| p.index) {
            Some(i) if i == index => self.pending = None,
            Some(i) if i > index => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.index = Some(i - 1);
                }
            }
            _ => {}
        }
        self.revalidate();
        Ok(removed)
    }

    /// Pure transition: the editor after `edit`, plus the errors to show.
    pub fn apply(&self, edit: Edit) -> (TimeframeEditor, Vec<EditorError>) {
        let mut next = self.clone();
        let outcome = match edit {
            Edit::Begin(index) => next.begin_edit(index),
            Edit::BeginNew => {
                next.begin_new();
                Ok(())
            }
            Edit::SetField(field, value) => next.set_field(field, value),
            Edit::Commit => next.commit().map(|_| ()),
            Edit::Cancel => {
                next.cancel();
                Ok(())
            }
            Edit::Add(interval) => next.add_interval(interval).map(|_| ()),
            Edit::Remove(index) => next.remove_interval(index).map(|_| ()),
        };
        let mut errors = next.errors.clone();
        if let Err(e) = outcome
            && !errors.contains(&e)
        {
            errors.insert(0, e);
        }
        (next, errors)
    }

    fn revalidate(&mut self) {
        self.errors = match &self.pending {
            Some(pending) => self.evaluate(pending, false).err().unwrap_or_default(),
            None => Vec::new(),
        };
    }

    /// Parse and check the candidate. While typing (`require_complete` false)
    /// blank fields are not reported.
    fn evaluate(
        &self,
        pending: &PendingEdit,
        require_complete: bool,
    ) -> Result<TimeInterval, Vec<EditorError>> {
        let mut errors = Vec::new();
        let start =
            read_field(Field::Start, &pending.start, parse_time, require_complete, &mut errors);
        let end =
            read_field(Field::End, &pending.end, parse_end_time, require_complete, &mut errors);
        let (Some(start), Some(end)) = (start, end) else {
            return Err(errors);
        };

        let candidate = TimeInterval::new(start, end).map_err(|e| vec![EditorError::Interval(e)])?;
        validate_candidate(&candidate, self.set.as_slice(), pending.index)
            .map_err(|e| vec![EditorError::Overlap(e)])?;
        Ok(candidate)
    }
}

fn read_field(
    field: Field,
    raw: &str,
    parse: fn(&str) -> Result<Minutes, ParseError>,
    require_complete: bool,
    errors: &mut Vec<EditorError>,
) -> Option<Minutes> {
    match parse(raw) {
        Ok(minutes) => Some(minutes),
        Err(ParseError::Empty) if !require_complete => None,
        Err(error) => {
            errors.push(EditorError::Field { field, error });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band(start: &str, end: &str) -> TimeInterval {
        TimeInterval::parse(start, end).unwrap()
    }

    fn default_editor() -> TimeframeEditor {
        let set = TimeframeSet::new(vec![band("07:00", "08:00"), band("09:00", "11:00")]).unwrap();
        TimeframeEditor::new(set)
    }

    #[test]
    fn new_band_in_gap_has_no_errors() {
        let mut editor = default_editor();
        editor.begin_new();
        editor.set_field(Field::Start, "08:00").unwrap();
        editor.set_field(Field::End, "09:00").unwrap();
        assert!(editor.errors().is_empty());

        let set = editor.commit().unwrap();
        assert_eq!(set.len(), 3);
        assert_eq!(set.get(2), Some(&band("08:00", "09:00")));
        assert!(editor.pending().is_none());
    }

    #[test]
    fn overlapping_candidate_populates_errors_immediately() {
        let mut editor = default_editor();
        editor.begin_new();
        editor.set_field(Field::Start, "07:30").unwrap();
        assert!(editor.errors().is_empty(), "end not typed yet");
        editor.set_field(Field::End, "08:30").unwrap();

        let messages = editor.error_messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Overlaps"));
        assert!(messages[0].contains("07:00") && messages[0].contains("08:00"));

        let err = editor.commit().unwrap_err();
        assert!(matches!(err, EditorError::Overlap(_)));
        assert_eq!(editor.set().len(), 2, "failed commit leaves the set alone");
    }

    #[test]
    fn fixing_the_field_clears_errors() {
        let mut editor = default_editor();
        editor.begin_new();
        editor.set_field(Field::Start, "07:30").unwrap();
        editor.set_field(Field::End, "08:30").unwrap();
        assert!(!editor.is_valid());
        editor.set_field(Field::Start, "08:00").unwrap();
        assert!(editor.is_valid());
    }

    #[test]
    fn editing_in_place_ignores_its_own_band() {
        let mut editor = default_editor();
        editor.begin_edit(0).unwrap();
        assert_eq!(editor.pending().unwrap().start, "07:00");
        editor.set_field(Field::End, "08:45").unwrap();
        assert!(editor.is_valid());
        let set = editor.commit().unwrap();
        assert_eq!(set.as_slice(), &[band("07:00", "08:45"), band("09:00", "11:00")]);
    }

    #[test]
    fn malformed_and_inverted_fields_are_reported() {
        let mut editor = default_editor();
        editor.begin_new();
        editor.set_field(Field::Start, "7am").unwrap();
        editor.set_field(Field::End, "25:00").unwrap();
        assert_eq!(editor.errors().len(), 2);
        assert!(matches!(editor.errors()[0], EditorError::Field { field: Field::Start, .. }));
        assert!(matches!(editor.errors()[1], EditorError::Field { field: Field::End, .. }));

        editor.set_field(Field::Start, "13:00").unwrap();
        editor.set_field(Field::End, "12:00").unwrap();
        assert!(matches!(editor.errors()[0], EditorError::Interval(_)));
    }

    #[test]
    fn commit_requires_both_fields() {
        let mut editor = default_editor();
        editor.begin_new();
        editor.set_field(Field::Start, "12:00").unwrap();
        let err = editor.commit().unwrap_err();
        assert_eq!(
            err,
            EditorError::Field {
                field: Field::End,
                error: ParseError::Empty
            }
        );
    }

    #[test]
    fn set_field_without_pending_edit_fails() {
        let mut editor = default_editor();
        assert_eq!(editor.set_field(Field::Start, "12:00"), Err(EditorError::NoPendingEdit));
        assert_eq!(editor.commit(), Err(EditorError::NoPendingEdit));
    }

    #[test]
    fn add_interval_runs_the_same_gate() {
        let mut editor = default_editor();
        assert!(editor.add_interval(band("11:00", "12:00")).is_ok());
        let err = editor.add_interval(band("10:30", "11:30")).unwrap_err();
        assert_eq!(err.to_string(), "Overlaps 09:00–11:00");
        assert_eq!(editor.errors(), &[err]);
        assert_eq!(editor.set().len(), 3);
    }

    #[test]
    fn remove_interval_shifts_pending_index() {
        let mut editor = default_editor();
        editor.add_interval(band("12:00", "13:00")).unwrap();
        editor.begin_edit(2).unwrap();
        assert_eq!(editor.remove_interval(0).unwrap(), band("07:00", "08:00"));
        assert_eq!(editor.pending().unwrap().index, Some(1));

        editor.remove_interval(1).unwrap();
        assert!(editor.pending().is_none());
        assert_eq!(editor.remove_interval(5), Err(EditorError::IndexOutOfRange(5)));
    }

    #[test]
    fn removing_a_band_can_resolve_a_pending_overlap() {
        let mut editor = default_editor();
        editor.begin_new();
        editor.set_field(Field::Start, "07:30").unwrap();
        editor.set_field(Field::End, "08:30").unwrap();
        assert!(!editor.is_valid());
        editor.remove_interval(0).unwrap();
        assert!(editor.is_valid());
    }

    #[test]
    fn apply_is_a_pure_transition() {
        let editor = default_editor();
        let (editing, errors) = editor.apply(Edit::BeginNew);
        assert!(errors.is_empty());
        let (editing, _) = editing.apply(Edit::SetField(Field::Start, "07:30".into()));
        let (editing, errors) = editing.apply(Edit::SetField(Field::End, "08:30".into()));
        assert_eq!(errors.len(), 1);

        let (after, errors) = editing.apply(Edit::Commit);
        assert!(matches!(errors[0], EditorError::Overlap(_)));
        assert_eq!(after.set().len(), 2);

        // The source state never moves.
        assert!(editor.pending().is_none());
        assert!(editor.errors().is_empty());

        let (after, errors) = editor.apply(Edit::Remove(9));
        assert_eq!(errors, vec![EditorError::IndexOutOfRange(9)]);
        assert_eq!(after.set().len(), 2);
    }
}
