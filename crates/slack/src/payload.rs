use std::collections::HashMap;

use thiserror::Error;

/// A single selected entry of a multi select, as echoed back by the platform
/// on submission. `label` is the option text, `value` the reference url.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedOption {
    pub label: String,
    pub value: String,
}

impl SelectedOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self { label: label.into(), value: value.into() }
    }
}

/// The value a single input held at submission time. Optional inputs that the
/// user left blank arrive as `Text(None)` / an empty selection, which is not
/// an error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(Option<String>),
    SelectedOptions(Vec<SelectedOption>),
    SelectedUser(Option<String>),
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "plain_text_input",
            Self::SelectedOptions(_) => "multi_static_select",
            Self::SelectedUser(_) => "users_select",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("submission is missing field `{action_id}` in block `{block_id}`")]
    MissingField { block_id: String, action_id: String },
    #[error(
        "field `{action_id}` in block `{block_id}` holds a {found} value, expected {expected}"
    )]
    WrongKind {
        block_id: String,
        action_id: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// Typed view of a dialog submission's state, keyed by
/// `(block id, action id)`. Lookups fail loudly when a field the caller
/// relies on is absent, instead of silently yielding nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SubmissionState {
    values: HashMap<(String, String), FieldValue>,
}

impl SubmissionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(
        mut self,
        block_id: impl Into<String>,
        action_id: impl Into<String>,
        value: FieldValue,
    ) -> Self {
        self.insert(block_id, action_id, value);
        self
    }

    pub fn insert(
        &mut self,
        block_id: impl Into<String>,
        action_id: impl Into<String>,
        value: FieldValue,
    ) {
        self.values.insert((block_id.into(), action_id.into()), value);
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn get(&self, block_id: &str, action_id: &str) -> Result<&FieldValue, PayloadError> {
        self.values.get(&(block_id.to_string(), action_id.to_string())).ok_or_else(|| {
            PayloadError::MissingField {
                block_id: block_id.to_string(),
                action_id: action_id.to_string(),
            }
        })
    }

    /// Text of a `plain_text_input`. A present-but-blank optional input maps
    /// to the empty string.
    pub fn text(&self, block_id: &str, action_id: &str) -> Result<String, PayloadError> {
        match self.get(block_id, action_id)? {
            FieldValue::Text(value) => Ok(value.clone().unwrap_or_default()),
            other => Err(PayloadError::WrongKind {
                block_id: block_id.to_string(),
                action_id: action_id.to_string(),
                expected: "plain_text_input",
                found: other.kind(),
            }),
        }
    }

    /// Selection of a `multi_static_select` that is known to be rendered.
    pub fn selected_options(
        &self,
        block_id: &str,
        action_id: &str,
    ) -> Result<&[SelectedOption], PayloadError> {
        match self.get(block_id, action_id)? {
            FieldValue::SelectedOptions(options) => Ok(options),
            other => Err(PayloadError::WrongKind {
                block_id: block_id.to_string(),
                action_id: action_id.to_string(),
                expected: "multi_static_select",
                found: other.kind(),
            }),
        }
    }

    /// Selection of a `multi_static_select` that may not have been rendered
    /// at all (zero available options). Absence is `None`; a present field
    /// of the wrong element type is still an error.
    pub fn selected_options_opt(
        &self,
        block_id: &str,
        action_id: &str,
    ) -> Result<Option<&[SelectedOption]>, PayloadError> {
        match self.selected_options(block_id, action_id) {
            Ok(options) => Ok(Some(options)),
            Err(PayloadError::MissingField { .. }) => Ok(None),
            Err(error) => Err(error),
        }
    }

    pub fn selected_user(
        &self,
        block_id: &str,
        action_id: &str,
    ) -> Result<Option<&str>, PayloadError> {
        match self.get(block_id, action_id)? {
            FieldValue::SelectedUser(user) => Ok(user.as_deref()),
            other => Err(PayloadError::WrongKind {
                block_id: block_id.to_string(),
                action_id: action_id.to_string(),
                expected: "users_select",
                found: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, PayloadError, SelectedOption, SubmissionState};

    fn state() -> SubmissionState {
        SubmissionState::new()
            .with_field(
                "report.items.v1",
                "report.items.select.v1",
                FieldValue::SelectedOptions(vec![
                    SelectedOption::new("Fix bug #1", "https://t.test/i/1"),
                    SelectedOption::new("Write docs", "https://t.test/i/2"),
                ]),
            )
            .with_field("report.extra.v1", "report.extra.input.v1", FieldValue::Text(None))
            .with_field(
                "report.notes.v1",
                "report.notes.input.v1",
                FieldValue::Text(Some("On vacation Friday".to_string())),
            )
    }

    #[test]
    fn blank_optional_text_maps_to_empty_string() {
        let text = state().text("report.extra.v1", "report.extra.input.v1").expect("present");
        assert_eq!(text, "");
    }

    #[test]
    fn present_text_round_trips() {
        let text = state().text("report.notes.v1", "report.notes.input.v1").expect("present");
        assert_eq!(text, "On vacation Friday");
    }

    #[test]
    fn missing_field_error_names_the_pair() {
        let error = state().text("report.absent.v1", "report.absent.input.v1").expect_err("absent");
        assert_eq!(
            error,
            PayloadError::MissingField {
                block_id: "report.absent.v1".to_string(),
                action_id: "report.absent.input.v1".to_string(),
            }
        );
        assert!(error.to_string().contains("report.absent.v1"));
    }

    #[test]
    fn wrong_kind_is_reported_with_both_kinds() {
        let error = state()
            .selected_options("report.notes.v1", "report.notes.input.v1")
            .expect_err("text field read as select");
        assert!(matches!(
            error,
            PayloadError::WrongKind { expected: "multi_static_select", found: "plain_text_input", .. }
        ));
    }

    #[test]
    fn selections_preserve_order() {
        let state = state();
        let options =
            state.selected_options("report.items.v1", "report.items.select.v1").expect("present");
        assert_eq!(options[0].label, "Fix bug #1");
        assert_eq!(options[1].value, "https://t.test/i/2");
    }

    #[test]
    fn optional_lookup_distinguishes_absent_from_wrong_kind() {
        let state = state();
        assert_eq!(
            state.selected_options_opt("report.absent.v1", "x").expect("absent is not an error"),
            None
        );
        assert!(state
            .selected_options_opt("report.notes.v1", "report.notes.input.v1")
            .is_err());
    }
}
