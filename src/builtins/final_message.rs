//! `final_message`: announce the end of the boot sequence.

use crate::error::Result;
use crate::module_meta::{Module, ModuleContext, ModuleMeta};
use crate::types::Frequency;
use anyhow::Context;
use serde_json::Value;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

const DEFAULT_MESSAGE: &str = "stagerun finished for instance $INSTANCE_ID";

/// Marker file written into the instance dir once the final stage ran
pub const BOOT_FINISHED: &str = "boot-finished";

#[derive(Debug)]
pub struct FinalMessage {
    meta: ModuleMeta,
}

impl FinalMessage {
    pub fn new() -> Result<Self> {
        let meta = ModuleMeta::builder("final_message", "Output final message when boot is done")
            .description(
                "Logs a configurable message and writes the boot-finished marker. \
                 `$INSTANCE_ID` and `$TIMESTAMP` are substituted.",
            )
            .example(r#"{"final_message": "up since $TIMESTAMP"}"#)
            .frequency(Frequency::Always)
            .build()?;
        Ok(Self { meta })
    }
}

fn render(template: &str, instance_id: &str, timestamp: u64) -> String {
    template
        .replace("$INSTANCE_ID", instance_id)
        .replace("$TIMESTAMP", &timestamp.to_string())
}

impl Module for FinalMessage {
    fn meta(&self) -> &ModuleMeta {
        &self.meta
    }

    fn run(&self, ctx: &ModuleContext<'_>, args: &[Value]) -> anyhow::Result<()> {
        // A positional argument overrides the configured message
        let template = args
            .first()
            .and_then(Value::as_str)
            .or_else(|| ctx.cfg.get("final_message").and_then(Value::as_str))
            .unwrap_or(DEFAULT_MESSAGE);

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let message = render(template, ctx.paths.instance_id(), timestamp);
        info!("{}", message);

        let instance_dir = ctx.paths.instance_dir();
        fs::create_dir_all(&instance_dir)
            .with_context(|| format!("Failed to create {}", instance_dir.display()))?;
        let marker = instance_dir.join(BOOT_FINISHED);
        fs::write(&marker, format!("{}\n", timestamp))
            .with_context(|| format!("Failed to write {}", marker.display()))?;

        Ok(())
    }
}
