//! The compiler context threaded through every pipeline stage

use crate::diagnostics::Diagnostics;
use crate::meta::{MetaDefinitions, PlatformFlags};
use serde::{Deserialize, Serialize};

/// Switches that alter compilation behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerFlags {
    /// When set, the runtime type table globals are initialized to null/0
    /// instead of the reduced type table.
    pub no_type_info: bool,
}

/// General information about the current compilation, passed `&mut` through
/// the pipeline instead of living in module-level state.
#[derive(Debug, Clone, Default)]
pub struct CompilerContext {
    pub flags: CompilerFlags,
    pub meta: MetaDefinitions,
    pub diagnostics: Diagnostics,
}

impl CompilerContext {
    /// A context seeded with host platform meta definitions.
    pub fn new() -> Self {
        Self {
            flags: CompilerFlags::default(),
            meta: MetaDefinitions::seeded(PlatformFlags::host()),
            diagnostics: Diagnostics::new(),
        }
    }

    pub fn with_flags(flags: CompilerFlags) -> Self {
        Self { flags, ..Self::new() }
    }
}
