//! Built-in modules shipped with stagerun.
//!
//! Each module is a unit struct holding its `ModuleMeta`; `all()` builds one
//! instance of each for the registry.

pub mod final_message;
pub mod runcmd;
pub mod write_files;

use crate::error::Result;
use crate::module_meta::Module;
use std::sync::Arc;

pub use final_message::FinalMessage;
pub use runcmd::Runcmd;
pub use write_files::WriteFiles;

/// One instance of every built-in module
pub fn all() -> Result<Vec<Arc<dyn Module>>> {
    Ok(vec![
        Arc::new(FinalMessage::new()?),
        Arc::new(Runcmd::new()?),
        Arc::new(WriteFiles::new()?),
    ])
}
