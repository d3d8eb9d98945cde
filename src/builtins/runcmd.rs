//! `runcmd`: render the configured command list into a per-instance script.
//!
//! The script is only written here; a later boot step executes the scripts
//! dir. String items are copied verbatim, list items are shell-quoted and
//! joined with spaces.

use crate::error::Result;
use crate::module_meta::{Module, ModuleContext, ModuleMeta};
use crate::types::Frequency;
use anyhow::{Context, bail};
use serde_json::Value;
use std::fs;
use tracing::debug;

#[derive(Debug)]
pub struct Runcmd {
    meta: ModuleMeta,
}

impl Runcmd {
    pub fn new() -> Result<Self> {
        let meta = ModuleMeta::builder("runcmd", "Run arbitrary commands")
            .description("Write the runcmd list to a per-instance shell script")
            .example(r#"{"runcmd": [["ls", "-l", "/"], "echo $(date) > /run/boot-time"]}"#)
            .frequency(Frequency::OncePerInstance)
            .activate_by_schema_keys(["runcmd"])
            .build()?;
        Ok(Self { meta })
    }
}

/// Quote `word` for a POSIX shell when it needs it
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "@%+=:,./-_".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r#"'"'"'"#))
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Render a command list into a `#!/bin/sh` script
pub fn shellify(commands: &[Value]) -> anyhow::Result<String> {
    let mut lines = vec!["#!/bin/sh".to_string()];
    for (index, command) in commands.iter().enumerate() {
        match command {
            Value::String(line) => lines.push(line.clone()),
            Value::Array(words) => {
                let mut quoted = Vec::with_capacity(words.len());
                for word in words {
                    match scalar_to_string(word) {
                        Some(word) => quoted.push(shell_quote(&word)),
                        None => bail!("runcmd item {} contains a non-scalar word: {}", index, word),
                    }
                }
                lines.push(quoted.join(" "));
            }
            other => bail!("Unable to shellify runcmd item {}: {}", index, other),
        }
    }
    Ok(lines.join("\n") + "\n")
}

impl Module for Runcmd {
    fn meta(&self) -> &ModuleMeta {
        &self.meta
    }

    fn run(&self, ctx: &ModuleContext<'_>, _args: &[Value]) -> anyhow::Result<()> {
        let commands = match ctx.cfg.get("runcmd") {
            Some(Value::Array(commands)) => commands,
            Some(other) => bail!("runcmd must be a list, got {}", other),
            None => {
                debug!("Skipping module named {}, no 'runcmd' key in configuration", ctx.name);
                return Ok(());
            }
        };

        let script = shellify(commands)?;
        let scripts_dir = ctx.paths.scripts_dir();
        fs::create_dir_all(&scripts_dir)
            .with_context(|| format!("Failed to create {}", scripts_dir.display()))?;
        let path = scripts_dir.join("runcmd");
        fs::write(&path, script).with_context(|| format!("Failed to write {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o700))
                .with_context(|| format!("Failed to chmod {}", path.display()))?;
        }

        debug!("Wrote {} runcmd entries to {}", commands.len(), path.display());
        Ok(())
    }
}
