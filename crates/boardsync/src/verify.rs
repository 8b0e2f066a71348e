//! Schema drift detection
//!
//! Boards are edited by people; columns, labels, and groups an automation
//! depends on can disappear or be renamed at any time. Verification checks
//! the loaded schema against a declared set of required elements and can
//! alert a configured recipient list when something is gone.

use crate::board::Board;
use boardsync_common::Result;

/// Outbound alert channel. The crate ships no concrete sender; callers
/// plug in whatever their deployment uses.
pub trait Notifier {
    fn send(&self, to: &[String], subject: &str, body: &str) -> Result<()>;
}

/// A column the board must carry, optionally with labels it must define
#[derive(Debug, Clone)]
pub struct RequiredColumn {
    pub name: String,
    pub labels: Vec<String>,
}

impl RequiredColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }
}

/// Everything the board must still have for dependent automation to work
#[derive(Debug, Clone, Default)]
pub struct RequiredElements {
    pub groups: Vec<String>,
    pub columns: Vec<RequiredColumn>,
    pub sub_columns: Vec<RequiredColumn>,
}

/// What verification found missing
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    pub missing_groups: Vec<String>,
    pub missing_columns: Vec<String>,
    pub missing_labels: Vec<String>,
    pub missing_sub_columns: Vec<String>,
    pub missing_sub_labels: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.missing_groups.is_empty()
            && self.missing_columns.is_empty()
            && self.missing_labels.is_empty()
            && self.missing_sub_columns.is_empty()
            && self.missing_sub_labels.is_empty()
    }

    /// Plain-text alert body listing every missing element by kind
    pub fn message(&self, board_name: &str, board_id: i64) -> String {
        let mut body = format!(
            "ALERT: altered board [{}] (id {})\n",
            board_name, board_id
        );
        let sections: [(&str, &[String]); 5] = [
            ("groups", &self.missing_groups),
            ("columns", &self.missing_columns),
            ("labels", &self.missing_labels),
            ("sub-columns", &self.missing_sub_columns),
            ("sub-labels", &self.missing_sub_labels),
        ];
        for (kind, items) in sections {
            if items.is_empty() {
                continue;
            }
            body.push_str(&format!("expected {} missing or modified:\n", kind));
            for item in items {
                body.push_str(&format!("  - {}\n", item));
            }
        }
        body
    }
}

fn check_columns(
    required: &[RequiredColumn],
    lookup: impl Fn(&str) -> Option<Vec<String>>,
    missing_columns: &mut Vec<String>,
    missing_labels: &mut Vec<String>,
) {
    for column in required {
        match lookup(&column.name) {
            None => missing_columns.push(column.name.clone()),
            Some(labels) => {
                for label in &column.labels {
                    if !labels.iter().any(|have| have == label) {
                        missing_labels.push(label.clone());
                    }
                }
            }
        }
    }
}

/// Check the board against its required elements. A dirty report marks the
/// board altered and, when a notifier and recipients are supplied, sends
/// the alert before returning.
pub fn verify(
    board: &mut Board,
    required: &RequiredElements,
    notifier: Option<&dyn Notifier>,
    alert_to: &[String],
) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    for group in &required.groups {
        if board.group_id(group).is_none() {
            report.missing_groups.push(group.clone());
        }
    }

    check_columns(
        &required.columns,
        |name| board.registry.get(name).map(|column| column.labels.clone()),
        &mut report.missing_columns,
        &mut report.missing_labels,
    );
    check_columns(
        &required.sub_columns,
        |name| {
            board
                .sub_registry
                .as_ref()
                .and_then(|registry| registry.get(name))
                .map(|column| column.labels.clone())
        },
        &mut report.missing_sub_columns,
        &mut report.missing_sub_labels,
    );

    if !report.is_clean() {
        board.was_altered = true;
        board.missing_columns = report.missing_columns.clone();
        board.missing_labels = report.missing_labels.clone();
        tracing::warn!(
            "missing columns or labels on board [{}]",
            board.name
        );
        if let Some(notifier) = notifier {
            if !alert_to.is_empty() {
                let subject = format!(
                    "Alert: missing columns or labels on board [{}]",
                    board.name
                );
                notifier.send(alert_to, &subject, &report.message(&board.name, board.board_id))?;
            }
        }
    }

    Ok(report)
}
