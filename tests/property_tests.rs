//! Property-Based Tests for stagerun
//!
//! These tests verify:
//! - Activation is a pure OR over the module's activation keys
//! - Activation ignores frequency and never mutates the config
//! - Enum string round-trips (parse → to_string → parse)
//! - Module name canonicalization ignores spelling variants

use proptest::prelude::*;
use serde_json::{Value, json};
use stagerun::{
    CloudConfig, Frequency, Module, ModuleContext, ModuleDetails, ModuleMeta, Stage,
    canonical_module_name, is_active,
};
use std::sync::Arc;

struct Stub(ModuleMeta);

impl Module for Stub {
    fn meta(&self) -> &ModuleMeta {
        &self.0
    }

    fn run(&self, _ctx: &ModuleContext<'_>, _args: &[Value]) -> anyhow::Result<()> {
        Ok(())
    }
}

fn details(keys: Option<Vec<String>>, frequency: Frequency) -> ModuleDetails {
    let mut builder = ModuleMeta::builder("my_module", "title").frequency(frequency);
    if let Some(keys) = keys {
        builder = builder.activate_by_schema_keys(keys);
    }
    let module: Arc<dyn Module> = Arc::new(Stub(builder.build().unwrap()));
    ModuleDetails::new(module, "my_module", frequency, vec![json!("<arg>")]).unwrap()
}

/// Details built from deserialized metadata, which skips builder validation
fn details_from_json(keys: &[String]) -> ModuleDetails {
    let meta: ModuleMeta = serde_json::from_value(json!({
        "name": "my_module",
        "id": "cc_my_module",
        "title": "title",
        "frequency": "once",
        "activate_by_schema_keys": keys,
    }))
    .unwrap();
    let module: Arc<dyn Module> = Arc::new(Stub(meta));
    ModuleDetails::new(module, "my_module", Frequency::Once, vec![]).unwrap()
}

/// Distinct activation keys, as the builder requires
fn unique_keys_strategy(size: std::ops::Range<usize>) -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set(key_strategy(), size).prop_map(|keys| keys.into_iter().collect())
}

fn frequency_strategy() -> impl Strategy<Value = Frequency> {
    prop_oneof![
        Just(Frequency::Always),
        Just(Frequency::Once),
        Just(Frequency::OncePerInstance),
    ]
}

fn stage_strategy() -> impl Strategy<Value = Stage> {
    prop_oneof![Just(Stage::Init), Just(Stage::Config), Just(Stage::Final)]
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z_]{1,8}"
}

fn cfg_strategy() -> impl Strategy<Value = CloudConfig> {
    prop::collection::btree_map(key_strategy(), any::<u8>(), 0..6).prop_map(|map| {
        map.into_iter()
            .map(|(k, v)| (k, Value::from(v)))
            .collect()
    })
}

// =============================================================================
// Activation Scenarios
// =============================================================================

#[test]
fn test_activation_scenarios_every_frequency() {
    let cases: Vec<(Option<Vec<&str>>, Value, bool)> = vec![
        (Some(vec!["module_name"]), json!({"module_name": {"x": "y"}}), true),
        (Some(vec!["module_name"]), json!({}), false),
        (Some(vec!["module_name", "other"]), json!({"other": null}), true),
        (Some(vec![]), json!({}), true),
        (None, json!({}), true),
        (None, json!({"anything": 1}), true),
    ];

    for frequency in [Frequency::Always, Frequency::Once, Frequency::OncePerInstance] {
        for (keys, cfg, expected) in &cases {
            let keys = keys
                .as_ref()
                .map(|k| k.iter().map(|s| s.to_string()).collect());
            let d = details(keys, frequency);
            let cfg = cfg.as_object().cloned().unwrap();
            assert_eq!(is_active(&d, &cfg), *expected, "cfg={:?} freq={}", cfg, frequency);
        }
    }
}

#[test]
fn test_repeated_keys_from_json() {
    let keys = vec!["a".to_string(), "a".to_string()];
    let d = details_from_json(&keys);
    assert_eq!(d.module().meta().activation_keys(), &keys[..]);

    let with_a = json!({"a": 1}).as_object().cloned().unwrap();
    let without_a = json!({"b": 1}).as_object().cloned().unwrap();
    assert!(is_active(&d, &with_a));
    assert!(!is_active(&d, &without_a));
}

// =============================================================================
// Activation Properties
// =============================================================================

proptest! {
    /// No activation keys: active for any config
    #[test]
    fn ungated_module_always_active(cfg in cfg_strategy(), freq in frequency_strategy()) {
        prop_assert!(is_active(&details(None, freq), &cfg));
        prop_assert!(is_active(&details(Some(vec![]), freq), &cfg));
    }

    /// Keyed module: active iff at least one key is a top-level config key
    #[test]
    fn keyed_module_active_iff_any_key_present(
        keys in unique_keys_strategy(1..4),
        cfg in cfg_strategy(),
        freq in frequency_strategy(),
    ) {
        let expected = keys.iter().any(|k| cfg.contains_key(k));
        prop_assert_eq!(is_active(&details(Some(keys), freq), &cfg), expected);
    }

    /// Frequency never changes the activation decision
    #[test]
    fn activation_independent_of_frequency(
        keys in unique_keys_strategy(0..4),
        cfg in cfg_strategy(),
    ) {
        let results: Vec<bool> = [Frequency::Always, Frequency::Once, Frequency::OncePerInstance]
            .into_iter()
            .map(|f| is_active(&details(Some(keys.clone()), f), &cfg))
            .collect();
        prop_assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    /// Activation leaves the config untouched
    #[test]
    fn activation_does_not_mutate_config(
        keys in unique_keys_strategy(0..4),
        cfg in cfg_strategy(),
    ) {
        let before = cfg.clone();
        let _ = is_active(&details(Some(keys), Frequency::Once), &cfg);
        prop_assert_eq!(before, cfg);
    }

    /// Repeated keys in deserialized metadata keep the same OR semantics
    #[test]
    fn repeated_keys_from_json_active_iff_any_key_present(
        keys in prop::collection::vec(key_strategy(), 1..4),
        cfg in cfg_strategy(),
    ) {
        let doubled: Vec<String> = keys.iter().chain(keys.iter()).cloned().collect();
        let expected = keys.iter().any(|k| cfg.contains_key(k));
        prop_assert_eq!(is_active(&details_from_json(&doubled), &cfg), expected);
    }
}

// =============================================================================
// Enum Property Tests
// =============================================================================

proptest! {
    /// Frequency: to_string → parse round-trip is identity
    #[test]
    fn frequency_roundtrip(freq in frequency_strategy()) {
        let parsed: Frequency = freq.to_string().parse().expect("Should parse");
        prop_assert_eq!(freq, parsed);
        prop_assert_eq!(freq.to_string(), freq.as_str());
    }

    /// Stage: section names all follow the `cloud_<stage>_modules` pattern
    #[test]
    fn stage_section_name_is_valid(stage in stage_strategy()) {
        let parsed: Stage = stage.to_string().parse().expect("Should parse");
        prop_assert_eq!(stage, parsed);
        prop_assert_eq!(stage.section(), format!("cloud_{}_modules", stage));
    }
}

// =============================================================================
// Name Canonicalization Property Tests
// =============================================================================

proptest! {
    /// Every spelling of a module name maps to the same registry key
    #[test]
    fn canonical_name_ignores_spelling(base in "[d-z][a-z_]{0,10}") {
        let canonical = Some(base.clone());
        prop_assert_eq!(canonical_module_name(&base), canonical.clone());
        prop_assert_eq!(canonical_module_name(&format!("cc_{}", base)), canonical.clone());
        prop_assert_eq!(canonical_module_name(&format!("cc_{}.py", base)), canonical.clone());
        prop_assert_eq!(canonical_module_name(&base.replace('_', "-")), canonical);
    }
}
