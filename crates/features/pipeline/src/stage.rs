//! Stage canonicalization.
//!
//! A [`StageRegistry`] owns the closed list of canonical stages and maps any
//! label a board may carry (legacy names, casing and accent variants,
//! punctuation noise) onto exactly one of them.

use crate::error::PipelineError;
use crm_domain::config::PipelineConfig;
use crm_domain::stage::{StageDef, standard_aliases, standard_stages};
use fxhash::FxHashMap;
use std::borrow::Cow;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Ordered set of canonical stages plus every spelling that resolves to them.
#[derive(Debug, Clone)]
pub struct StageRegistry {
    stages: Vec<StageDef>,
    /// Key, label and alias variants used by [`StageRegistry::normalize`].
    lookup: FxHashMap<String, usize>,
    /// Slug, lowercase and token forms of labels and keys.
    index: FxHashMap<String, usize>,
}

/// A registry under construction, collecting every conflicting spelling.
struct Assembly {
    registry: StageRegistry,
    conflicts: Vec<String>,
}

impl StageRegistry {
    /// Builds a registry, rejecting duplicates and ambiguous spellings.
    ///
    /// # Errors
    /// Returns [`PipelineError::InvalidRegistry`] if the stage list is empty,
    /// two stages share a key or label, an alias targets an unknown key, or
    /// one spelling would resolve to two different stages.
    pub fn new<I, A, K>(stages: Vec<StageDef>, aliases: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = (A, K)>,
        A: AsRef<str>,
        K: AsRef<str>,
    {
        if stages.is_empty() {
            return Err(PipelineError::InvalidRegistry {
                message: "EMPTY".into(),
                context: Some("A pipeline needs at least one stage".into()),
            });
        }

        let Assembly { registry, conflicts } = Self::assemble(stages, aliases);
        if !conflicts.is_empty() {
            return Err(PipelineError::InvalidRegistry {
                message: conflicts.join("; ").into(),
                context: Some("Stage spellings must resolve to exactly one stage".into()),
            });
        }

        debug!(stages = registry.stages.len(), spellings = registry.lookup.len(), "Stage registry built");
        Ok(registry)
    }

    /// The CRM's canonical pipeline with its legacy alias table.
    #[must_use]
    pub fn standard() -> Self {
        Self::assemble(standard_stages(), standard_aliases()).registry
    }

    /// Builds the registry declared by a configuration.
    ///
    /// # Errors
    /// See [`StageRegistry::new`].
    pub fn from_config(config: &PipelineConfig) -> Result<Self, PipelineError> {
        Self::new(config.stages.clone(), &config.aliases)
    }

    /// Stages in board order.
    #[must_use]
    pub fn stages(&self) -> &[StageDef] {
        &self.stages
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StageDef> {
        self.stages.iter().find(|stage| stage.key == key)
    }

    /// Exact lookup of a key, label or alias, tolerant to casing and whitespace.
    ///
    /// ```rust
    /// use crm_pipeline::StageRegistry;
    ///
    /// let registry = StageRegistry::standard();
    /// assert_eq!(registry.normalize("  pre-approved ").map(|s| s.key.as_str()), Some("qualified"));
    /// assert_eq!(registry.normalize("CLEAR TO CLOSE").map(|s| s.key.as_str()), Some("clear_to_close"));
    /// assert!(registry.normalize("Prospecting").is_none());
    /// ```
    #[must_use]
    pub fn normalize(&self, raw: &str) -> Option<&StageDef> {
        variants(raw).into_iter().find_map(|variant| self.lookup.get(&variant)).map(|&i| &self.stages[i])
    }

    /// Resolves an arbitrary label to its canonical stage.
    ///
    /// Tries [`StageRegistry::normalize`], then an accent-insensitive token,
    /// then a dash slug. Pure and total.
    ///
    /// ```rust
    /// use crm_pipeline::StageRegistry;
    ///
    /// let registry = StageRegistry::standard();
    /// assert_eq!(registry.canonicalize("Négotiating!").map(|s| s.key.as_str()), Some("negotiating"));
    /// assert_eq!(registry.canonicalize("clear-to-close").map(|s| s.key.as_str()), Some("clear_to_close"));
    /// assert!(registry.canonicalize("   ").is_none());
    /// ```
    #[must_use]
    pub fn canonicalize(&self, raw: &str) -> Option<&StageDef> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        if let Some(stage) = self.normalize(raw) {
            return Some(stage);
        }

        [normalize_token(raw), dash_slug(raw)]
            .into_iter()
            .filter(|form| !form.is_empty())
            .find_map(|form| self.index.get(&form))
            .map(|&i| &self.stages[i])
    }

    /// Canonical key of a label, if it resolves.
    #[must_use]
    pub fn canonical_key(&self, raw: &str) -> Option<&str> {
        self.canonicalize(raw).map(|stage| stage.key.as_str())
    }

    fn assemble<I, A, K>(stages: Vec<StageDef>, aliases: I) -> Assembly
    where
        I: IntoIterator<Item = (A, K)>,
        A: AsRef<str>,
        K: AsRef<str>,
    {
        let mut assembly = Assembly {
            registry: Self { stages, lookup: FxHashMap::default(), index: FxHashMap::default() },
            conflicts: Vec::new(),
        };

        let mut keys = FxHashMap::default();
        let mut labels = FxHashMap::default();
        for (i, stage) in assembly.registry.stages.iter().enumerate() {
            if keys.insert(stage.key.clone(), i).is_some() {
                assembly.conflicts.push(format!("duplicate key '{}'", stage.key));
            }
            if labels.insert(stage.label.to_lowercase(), i).is_some() {
                assembly.conflicts.push(format!("duplicate label '{}'", stage.label));
            }
        }

        let count = assembly.registry.stages.len();
        for i in 0..count {
            let (key, label) = {
                let stage = &assembly.registry.stages[i];
                (stage.key.clone(), stage.label.clone())
            };
            for variant in variants(&key).into_iter().chain(variants(&label)) {
                assembly.claim_lookup(variant, i);
            }
            let forms = [
                dash_slug(&label),
                label.to_lowercase(),
                normalize_token(&label),
                key.clone(),
                key.replace('_', "-"),
            ];
            for form in forms {
                assembly.claim_index(form, i);
            }
        }

        for (alias, target) in aliases {
            let (alias, target) = (alias.as_ref(), target.as_ref());
            let Some(&i) = keys.get(target) else {
                assembly.conflicts.push(format!("alias '{alias}' targets unknown stage '{target}'"));
                continue;
            };
            for variant in variants(alias) {
                assembly.claim_lookup(variant, i);
            }
        }

        assembly
    }
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl Assembly {
    fn claim_lookup(&mut self, spelling: String, stage: usize) {
        Self::claim(&mut self.registry.lookup, &mut self.conflicts, &self.registry.stages, spelling, stage);
    }

    fn claim_index(&mut self, spelling: String, stage: usize) {
        Self::claim(&mut self.registry.index, &mut self.conflicts, &self.registry.stages, spelling, stage);
    }

    // First claim wins; a claim by another stage is recorded as a conflict.
    fn claim(
        map: &mut FxHashMap<String, usize>,
        conflicts: &mut Vec<String>,
        stages: &[StageDef],
        spelling: String,
        stage: usize,
    ) {
        if spelling.is_empty() {
            return;
        }
        match map.get(&spelling) {
            Some(&owner) if owner != stage => conflicts.push(format!(
                "'{spelling}' resolves to both '{}' and '{}'",
                stages[owner].key, stages[stage].key
            )),
            Some(_) => {}
            None => {
                map.insert(spelling, stage);
            }
        }
    }
}

/// Lowercase, lowercase without whitespace, lowercase ASCII alphanumerics only.
fn variants(raw: &str) -> Vec<String> {
    let lower = raw.trim().to_lowercase();
    let compact: String = lower.chars().filter(|c| !c.is_whitespace()).collect();
    let alnum: String = lower.chars().filter(char::is_ascii_alphanumeric).collect();

    let mut out = Vec::with_capacity(3);
    for variant in [lower, compact, alnum] {
        if !variant.is_empty() && !out.contains(&variant) {
            out.push(variant);
        }
    }
    out
}

/// Accent-insensitive token: `"  Clear-to Clôse "` becomes `clear_to_close`.
///
/// Lowercases, decomposes (NFKD), strips combining marks, drops everything
/// but word characters and whitespace, then joins the words with `_`.
pub(crate) fn normalize_token(raw: &str) -> String {
    let folded: String = raw
        .trim()
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| *c == ' ' || *c == '_' || c.is_alphanumeric())
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join("_")
}

/// `"Clear to Close!"` becomes `clear-to-close`.
pub(crate) fn dash_slug(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut pending = false;
    for c in raw.trim().to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending && !slug.is_empty() {
                slug.push('-');
            }
            pending = false;
            slug.push(c);
        } else {
            pending = true;
        }
    }
    slug
}

/// Message used when a label does not resolve.
pub(crate) fn unresolved(label: &str) -> PipelineError {
    PipelineError::NormalizationFailure {
        label: label.to_owned(),
        context: Some(Cow::Borrowed("Label matched no key, label, alias or slug")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_domain::stage::{STANDARD_ALIASES, StageTone};

    fn stage(key: &str, label: &str) -> StageDef {
        StageDef::new(key, label, StageTone::Progress)
    }

    fn no_aliases() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn standard_registry_is_valid() {
        let strict = StageRegistry::new(standard_stages(), standard_aliases());
        assert!(strict.is_ok(), "{strict:?}");
    }

    #[test]
    fn every_standard_alias_resolves_to_its_target() {
        let registry = StageRegistry::standard();
        for (alias, key) in STANDARD_ALIASES {
            assert_eq!(registry.canonical_key(alias), Some(*key), "alias {alias}");
        }
    }

    #[test]
    fn token_and_slug_forms() {
        assert_eq!(normalize_token("  Clear-to   Clôse "), "clearto_close");
        assert_eq!(normalize_token("Négociation_Phase"), "negociation_phase");
        assert_eq!(dash_slug("--Clear  to Close!!"), "clear-to-close");
        assert_eq!(dash_slug("???"), "");
    }

    #[test]
    fn resolution_order() {
        let registry = StageRegistry::standard();
        assert_eq!(registry.canonical_key("qualified"), Some("qualified"));
        assert_eq!(registry.canonical_key("Clear 2 Close"), Some("clear_to_close"));
        assert_eq!(registry.canonical_key("clear_to_close"), Some("clear_to_close"));
        assert_eq!(registry.canonical_key("clear-to-close"), Some("clear_to_close"));
        assert_eq!(registry.canonical_key("Wön"), Some("won"));
        assert_eq!(registry.canonical_key("Unknown stage"), None);
        assert_eq!(registry.canonical_key(""), None);
    }

    #[test]
    fn rejects_empty_registry() {
        let err = StageRegistry::new(Vec::new(), no_aliases()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidRegistry { .. }));
    }

    #[test]
    fn rejects_duplicate_keys_and_labels() {
        let dup_key = StageRegistry::new(vec![stage("open", "Open"), stage("open", "Opened")], no_aliases());
        assert!(matches!(dup_key, Err(PipelineError::InvalidRegistry { .. })));

        let dup_label = StageRegistry::new(vec![stage("a", "Open"), stage("b", "OPEN")], no_aliases());
        assert!(matches!(dup_label, Err(PipelineError::InvalidRegistry { .. })));
    }

    #[test]
    fn rejects_ambiguous_spellings() {
        // "in progress" and "in-progress" fold to the same slug.
        let ambiguous = StageRegistry::new(
            vec![stage("in_progress", "In Progress"), stage("in_progress_2", "In-Progress")],
            no_aliases(),
        );
        assert!(matches!(ambiguous, Err(PipelineError::InvalidRegistry { .. })));

        let alias_clash = StageRegistry::new(
            vec![stage("open", "Open"), stage("closed", "Closed")],
            [("Open", "closed")],
        );
        assert!(matches!(alias_clash, Err(PipelineError::InvalidRegistry { .. })));
    }

    #[test]
    fn rejects_alias_to_unknown_stage() {
        let err = StageRegistry::new(vec![stage("open", "Open")], [("Lead", "new")]).unwrap_err();
        assert!(err.to_string().contains("unknown stage 'new'"), "{err}");
    }
}
