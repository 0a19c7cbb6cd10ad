//! Build-time meta definitions
//!
//! A flat keyed set of values consulted by the parser's `#if` conditionals,
//! seeded from the host platform.

use serde::{Deserialize, Serialize};

/// Host platform flags used to seed the meta definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFlags {
    pub windows: bool,
    pub macos: bool,
    pub unix: bool,
    pub linux: bool,
}

impl PlatformFlags {
    /// Flags for the platform the compiler itself is running on.
    pub fn host() -> Self {
        Self {
            windows: cfg!(target_os = "windows"),
            macos: cfg!(target_os = "macos"),
            unix: cfg!(unix),
            linux: cfg!(target_os = "linux"),
        }
    }
}

/// A single build-time definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaDefinition {
    pub name: String,
    pub value: bool,
}

/// The flat set of build-time definitions for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaDefinitions {
    definitions: Vec<MetaDefinition>,
}

impl MetaDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the definition set from host platform flags.
    pub fn seeded(flags: PlatformFlags) -> Self {
        let mut meta = Self::new();
        meta.define("__windows__", flags.windows);
        meta.define("__macos__", flags.macos);
        meta.define("__unix__", flags.unix);
        meta.define("__linux__", flags.linux);
        meta
    }

    /// Define or redefine a meta value.
    pub fn define(&mut self, name: impl Into<String>, value: bool) {
        let name = name.into();
        match self.definitions.iter_mut().find(|d| d.name == name) {
            Some(existing) => existing.value = value,
            None => self.definitions.push(MetaDefinition { name, value }),
        }
    }

    /// Remove a definition. Undefining an unknown name is not an error.
    pub fn undefine(&mut self, name: &str) {
        self.definitions.retain(|d| d.name != name);
    }

    /// Look up a definition; undefined names evaluate to false.
    pub fn lookup(&self, name: &str) -> bool {
        self.definitions.iter().any(|d| d.name == name && d.value)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.iter().any(|d| d.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_definitions() {
        let meta = MetaDefinitions::seeded(PlatformFlags {
            windows: false,
            macos: false,
            unix: true,
            linux: true,
        });
        assert!(meta.lookup("__unix__"));
        assert!(meta.lookup("__linux__"));
        assert!(!meta.lookup("__windows__"));
        assert!(meta.is_defined("__macos__"));
    }

    #[test]
    fn test_define_undefine() {
        let mut meta = MetaDefinitions::new();
        meta.define("DEBUG", true);
        assert!(meta.lookup("DEBUG"));
        meta.define("DEBUG", false);
        assert!(!meta.lookup("DEBUG"));
        meta.undefine("DEBUG");
        assert!(!meta.is_defined("DEBUG"));
    }
}
