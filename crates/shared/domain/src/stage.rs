//! Canonical pipeline stages and the legacy labels that map onto them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Colour family of a stage chip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageTone {
    #[default]
    Progress,
    Success,
    Warning,
    Danger,
}

impl StageTone {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Danger => "danger",
        }
    }
}

impl fmt::Display for StageTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical stage: a stable key, its human label and a tone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageDef {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub tone: StageTone,
}

impl StageDef {
    pub fn new(key: impl Into<String>, label: impl Into<String>, tone: StageTone) -> Self {
        Self { key: key.into(), label: label.into(), tone }
    }
}

/// The CRM's canonical pipeline, in board order.
pub const STANDARD_STAGES: &[(&str, &str, StageTone)] = &[
    ("new", "New", StageTone::Progress),
    ("qualified", "Qualified", StageTone::Progress),
    ("negotiating", "Negotiating", StageTone::Warning),
    ("clear_to_close", "Clear to Close", StageTone::Success),
    ("won", "Won", StageTone::Success),
    ("lost", "Lost", StageTone::Danger),
];

/// Legacy mortgage-pipeline labels folded into the canonical stages.
pub const STANDARD_ALIASES: &[(&str, &str)] = &[
    // new
    ("Long Shot", "new"),
    ("Lead", "new"),
    ("Leads", "new"),
    ("Prospect", "new"),
    ("New Lead", "new"),
    ("Buyer Lead", "new"),
    // qualified
    ("Application", "qualified"),
    ("Application Started", "qualified"),
    ("App Started", "qualified"),
    ("Nurture", "qualified"),
    ("Pre-Approved", "qualified"),
    ("Pre App", "qualified"),
    ("Preapp", "qualified"),
    ("Pre Application", "qualified"),
    ("Preapproval", "qualified"),
    // negotiating
    ("Processing", "negotiating"),
    ("Underwriting", "negotiating"),
    ("UW", "negotiating"),
    ("Underwrite", "negotiating"),
    ("Approved", "negotiating"),
    // clear_to_close
    ("CTC", "clear_to_close"),
    ("Clear 2 Close", "clear_to_close"),
    ("Cleared to Close", "clear_to_close"),
    // won
    ("Funded", "won"),
    ("Funded/Closed", "won"),
    ("Closed", "won"),
    ("Closed Won", "won"),
    ("Post Close", "won"),
    ("Past Client", "won"),
    ("Past Clients", "won"),
    ("Client", "won"),
    ("Clients", "won"),
    // lost
    ("Denied", "lost"),
    ("Cancelled", "lost"),
    ("Canceled", "lost"),
    ("Withdrawn", "lost"),
    ("Closed Lost", "lost"),
];

#[must_use]
pub fn standard_stages() -> Vec<StageDef> {
    STANDARD_STAGES.iter().map(|&(key, label, tone)| StageDef::new(key, label, tone)).collect()
}

#[must_use]
pub fn standard_aliases() -> BTreeMap<String, String> {
    STANDARD_ALIASES.iter().map(|&(alias, key)| (alias.to_owned(), key.to_owned())).collect()
}

/// Derives a stage key from a label: lowercase, runs of non-alphanumerics
/// become a single `_`, no leading or trailing `_`.
///
/// ```rust
/// use crm_domain::stage::stage_key_from_label;
///
/// assert_eq!(stage_key_from_label("Clear to Close"), "clear_to_close");
/// assert_eq!(stage_key_from_label("  Funded/Closed! "), "funded_closed");
/// ```
#[must_use]
pub fn stage_key_from_label(label: &str) -> String {
    let mut key = String::with_capacity(label.len());
    let mut pending_sep = false;
    for ch in label.chars().flat_map(char::to_lowercase) {
        if ch.is_alphanumeric() {
            if pending_sep && !key.is_empty() {
                key.push('_');
            }
            pending_sep = false;
            key.push(ch);
        } else {
            pending_sep = true;
        }
    }
    key
}
