//! Activation rule: is a module applicable to this configuration?
//!
//! A module that declares `activate_by_schema_keys` is applicable only when at
//! least one of those keys is a top-level key of the effective configuration.
//! A module declaring none (or an empty list) is always applicable. Frequency
//! plays no part here; the execution runner owns that check.

use crate::config::CloudConfig;
use crate::logic::resolver::ModuleDetails;

/// Decide whether `details` applies to `cfg`. Pure and total.
pub fn is_active(details: &ModuleDetails, cfg: &CloudConfig) -> bool {
    let keys = details.module().meta().activation_keys();
    keys.is_empty() || keys.iter().any(|key| cfg.contains_key(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_meta::{Module, ModuleContext, ModuleMeta};
    use crate::types::{Distros, Frequency};
    use serde_json::{Value, json};
    use std::sync::Arc;
    use strum::IntoEnumIterator;

    struct Stub(ModuleMeta);

    impl Module for Stub {
        fn meta(&self) -> &ModuleMeta {
            &self.0
        }

        fn run(&self, _ctx: &ModuleContext<'_>, _args: &[Value]) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn details(keys: Option<Vec<&str>>, frequency: Frequency) -> ModuleDetails {
        let mut builder = ModuleMeta::builder("module_name", "title")
            .id("cc_module_name")
            .description("description")
            .distros(Distros::All)
            .example("example_0")
            .example("example_1")
            .frequency(frequency);
        if let Some(keys) = keys {
            builder = builder.activate_by_schema_keys(keys);
        }
        let module = Arc::new(Stub(builder.build().unwrap()));
        ModuleDetails::new(module, "name", frequency, vec![]).unwrap()
    }

    fn cfg(value: Value) -> CloudConfig {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_is_active_table() {
        let cases = vec![
            (None, json!({}), true),
            (None, json!({"module_name": {"x": "y"}}), true),
            (Some(vec![]), json!({"module_name": {"x": "y"}}), true),
            (Some(vec!["module_name"]), json!({"module_name": {"x": "y"}}), true),
            (
                Some(vec!["module_name", "other_module"]),
                json!({"module_name": {"x": "y"}}),
                true,
            ),
            (Some(vec!["module_name"]), json!({"other_module": {"x": "y"}}), false),
            (
                Some(vec!["x"]),
                json!({"module_name": {"x": "y"}, "other_module": {"x": "y"}}),
                false,
            ),
        ];

        for frequency in Frequency::iter() {
            for (keys, doc, expected) in cases.clone() {
                let d = details(keys.clone(), frequency);
                assert_eq!(
                    is_active(&d, &cfg(doc.clone())),
                    expected,
                    "keys={:?} cfg={} frequency={}",
                    keys,
                    doc,
                    frequency
                );
            }
        }
    }

    #[test]
    fn test_is_active_does_not_mutate_inputs() {
        let d = details(Some(vec!["runcmd"]), Frequency::Once);
        let doc = cfg(json!({"runcmd": ["ls"]}));
        let before = doc.clone();

        assert!(is_active(&d, &doc));
        assert_eq!(doc, before);
        assert_eq!(d.name(), "name");
    }
}
