//! Type-safe vocabulary shared by the registry, resolver and runner.
//!
//! Frequencies and stages are closed sets, so they are enums with strum
//! conversions instead of strings compared all over the codebase.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// Module run cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum Frequency {
    /// Run on every invocation of the section
    #[serde(rename = "always")]
    #[strum(serialize = "always")]
    Always,
    /// Run exactly once for the lifetime of the cloud dir
    #[serde(rename = "once")]
    #[strum(serialize = "once")]
    Once,
    /// Run once for each distinct instance id
    #[serde(rename = "once-per-instance")]
    #[strum(serialize = "once-per-instance")]
    OncePerInstance,
}

impl Frequency {
    /// Returns the canonical string form
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Once => "once",
            Self::OncePerInstance => "once-per-instance",
        }
    }

    /// Whether a run must be recorded so it is not repeated
    pub fn is_gated(&self) -> bool {
        !matches!(self, Self::Always)
    }
}

/// Boot stage selecting one module section of the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    /// Early boot, right after the network is up
    Init,
    /// Main configuration pass
    Config,
    /// Late boot, user scripts and final message
    Final,
}

impl Stage {
    /// Config key holding the module list for this stage
    pub const fn section(self) -> &'static str {
        match self {
            Self::Init => "cloud_init_modules",
            Self::Config => "cloud_config_modules",
            Self::Final => "cloud_final_modules",
        }
    }

    /// Section keys of every stage, in boot order
    pub fn all_sections() -> Vec<&'static str> {
        Self::iter().map(Self::section).collect()
    }
}

/// Sentinel distro entry meaning "every platform"
pub const ALL_DISTROS: &str = "all";

/// Platforms a module is verified on
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub enum Distros {
    #[default]
    All,
    Only(Vec<String>),
}

impl Distros {
    /// Restrict to the given distro names
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from(names.into_iter().map(Into::into).collect::<Vec<String>>())
    }

    /// Whether the module is verified on `distro`
    pub fn supports(&self, distro: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.iter().any(|n| n == distro),
        }
    }
}

impl From<Vec<String>> for Distros {
    fn from(names: Vec<String>) -> Self {
        if names.is_empty() || names.iter().any(|n| n == ALL_DISTROS) {
            Self::All
        } else {
            Self::Only(names)
        }
    }
}

impl From<Distros> for Vec<String> {
    fn from(distros: Distros) -> Self {
        match distros {
            Distros::All => vec![ALL_DISTROS.to_string()],
            Distros::Only(names) => names,
        }
    }
}
