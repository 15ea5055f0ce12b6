use serde::{Deserialize, Serialize};

/// A unit of trackable work in the external issue tracker, snapshotted at
/// fetch time. Upstream return order is preserved end to end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub title: String,
    pub url: String,
}

impl WorkItem {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self { title: title.into(), url: url.into() }
    }
}

/// Which of the two daily report flows an interaction belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    CheckIn,
    CheckOut,
}

impl ReportKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CheckIn => "check-in",
            Self::CheckOut => "check-out",
        }
    }
}

/// Everything a submitted dialog boils down to. Built transiently from the
/// submission payload, rendered once, never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportDraft {
    pub kind: ReportKind,
    pub author_user_id: String,
    pub selected_items: Vec<WorkItem>,
    pub extra_tasks: String,
    pub notes: String,
}
