//! `write_files`: write arbitrary files below the target root.

use crate::error::Result;
use crate::module_meta::{Module, ModuleContext, ModuleMeta};
use crate::types::Frequency;
use anyhow::{Context, bail};
use serde::Deserialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const DEFAULT_PERMISSIONS: u32 = 0o644;

#[derive(Debug)]
pub struct WriteFiles {
    meta: ModuleMeta,
}

impl WriteFiles {
    pub fn new() -> Result<Self> {
        let meta = ModuleMeta::builder("write_files", "Write arbitrary files")
            .description("Write the files listed under `write_files`, relative to the target root")
            .example(
                r#"{"write_files": [{"path": "/etc/motd", "content": "hello\n", "permissions": "0644"}]}"#,
            )
            .frequency(Frequency::OncePerInstance)
            .activate_by_schema_keys(["write_files"])
            .build()?;
        Ok(Self { meta })
    }
}

/// One `write_files` entry
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    #[serde(default)]
    pub content: String,
    /// Octal mode string such as `"0600"`
    #[serde(default)]
    pub permissions: Option<String>,
    #[serde(default)]
    pub append: bool,
}

impl FileEntry {
    /// Parsed mode, defaulting to 0644
    pub fn mode(&self) -> anyhow::Result<u32> {
        match &self.permissions {
            None => Ok(DEFAULT_PERMISSIONS),
            Some(raw) => {
                let digits = raw.trim().trim_start_matches("0o");
                u32::from_str_radix(digits, 8)
                    .with_context(|| format!("Invalid permissions '{}' for {}", raw, self.path))
            }
        }
    }

    /// Destination of this entry under `root`
    pub fn destination(&self, root: &Path) -> anyhow::Result<PathBuf> {
        let path = Path::new(&self.path);
        if !path.is_absolute() {
            bail!("write_files path must be absolute: {}", self.path);
        }
        if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            bail!("write_files path must not contain '..': {}", self.path);
        }
        Ok(root.join(self.path.trim_start_matches('/')))
    }
}

fn write_entry(entry: &FileEntry, root: &Path) -> anyhow::Result<()> {
    let dest = entry.destination(root)?;
    let mode = entry.mode()?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(entry.append)
        .truncate(!entry.append)
        .open(&dest)
        .with_context(|| format!("Failed to open {}", dest.display()))?;
    file.write_all(entry.content.as_bytes())
        .with_context(|| format!("Failed to write {}", dest.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&dest, fs::Permissions::from_mode(mode))
            .with_context(|| format!("Failed to chmod {}", dest.display()))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    debug!("Wrote {} bytes to {}", entry.content.len(), dest.display());
    Ok(())
}

impl Module for WriteFiles {
    fn meta(&self) -> &ModuleMeta {
        &self.meta
    }

    fn run(&self, ctx: &ModuleContext<'_>, _args: &[Value]) -> anyhow::Result<()> {
        let Some(raw) = ctx.cfg.get("write_files") else {
            debug!("Skipping module named {}, no 'write_files' key in configuration", ctx.name);
            return Ok(());
        };
        let entries: Vec<FileEntry> = serde_json::from_value(raw.clone())
            .context("write_files must be a list of {path, content, permissions, append}")?;

        for entry in &entries {
            write_entry(entry, ctx.target_root)?;
        }
        Ok(())
    }
}
