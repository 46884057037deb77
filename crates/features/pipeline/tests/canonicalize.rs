use crm_domain::stage::{STANDARD_ALIASES, STANDARD_STAGES, stage_key_from_label};
use crm_pipeline::StageRegistry;
use proptest::prelude::*;
use std::sync::LazyLock;

static REGISTRY: LazyLock<StageRegistry> = LazyLock::new(StageRegistry::standard);

const COMBINING_ACUTE: char = '\u{0301}';
const WRAPPERS: &[&str] = &["", " ", "  ", "\t", "!", "--", "** ", " ."];

/// Flips casing and sprinkles accents over `label` without changing its letters.
fn disguise(label: &str, upper: &[bool], accent: &[bool]) -> String {
    let mut out = String::with_capacity(label.len() * 2);
    for (i, ch) in label.chars().enumerate() {
        if upper.get(i).copied().unwrap_or(false) {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        if "aeiouAEIOU".contains(ch) && accent.get(i).copied().unwrap_or(false) {
            out.push(COMBINING_ACUTE);
        }
    }
    out
}

fn flags() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 24)
}

proptest! {
    #[test]
    fn disguised_labels_resolve_to_their_stage(
        index in 0..STANDARD_STAGES.len(),
        upper in flags(),
        accent in flags(),
        before in prop::sample::select(WRAPPERS),
        after in prop::sample::select(WRAPPERS),
    ) {
        let (key, label, _) = STANDARD_STAGES[index];
        let raw = format!("{before}{}{after}", disguise(label, &upper, &accent));

        prop_assert_eq!(REGISTRY.canonical_key(&raw), Some(key));
        prop_assert_eq!(stage_key_from_label(label), key);
    }

    #[test]
    fn disguised_aliases_resolve_to_their_target(
        index in 0..STANDARD_ALIASES.len(),
        upper in flags(),
        accent in flags(),
        before in prop::sample::select(WRAPPERS),
        after in prop::sample::select(WRAPPERS),
    ) {
        let (alias, target) = STANDARD_ALIASES[index];
        let raw = format!("{before}{}{after}", disguise(alias, &upper, &accent));

        prop_assert_eq!(REGISTRY.canonical_key(&raw), Some(target));
    }

    #[test]
    fn unknown_labels_do_not_resolve(suffix in "[a-z ]{0,12}") {
        let raw = format!("zz{suffix}");
        prop_assert_eq!(REGISTRY.canonical_key(&raw), None);
    }

    #[test]
    fn resolution_is_stable(raw in "\\PC{0,24}") {
        if let Some(key) = REGISTRY.canonical_key(&raw) {
            prop_assert_eq!(REGISTRY.canonical_key(key), Some(key));
            prop_assert!(REGISTRY.get(key).is_some());
        }
    }
}

#[test]
fn blank_input_never_resolves() {
    for raw in ["", " ", "\t\n", "   "] {
        assert_eq!(REGISTRY.canonical_key(raw), None);
    }
}
