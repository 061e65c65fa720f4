//! Per-document build settings and their cache.
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Configuration section key for `workspace/configuration` requests.
pub const CONFIG_SECTION: &str = "asm6fLang";

/// Build configuration for one document, or the shared global fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSettings {
    /// Assembler executable to invoke.
    #[serde(default = "default_assembler_path")]
    pub assembler_path: String,
    /// Entry file passed as the first positional argument.
    #[serde(default = "default_main_file")]
    pub main_file: String,
    /// Output file passed as the second positional argument.
    #[serde(default)]
    pub out_file: String,
}

fn default_assembler_path() -> String {
    "asm6f_64".to_string()
}

fn default_main_file() -> String {
    "main.asm".to_string()
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            assembler_path: default_assembler_path(),
            main_file: default_main_file(),
            out_file: String::new(),
        }
    }
}

impl BuildSettings {
    /// Deserialize settings from a configuration payload, falling back to
    /// the defaults on a malformed value.
    pub fn from_value(value: &serde_json::Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Cached build settings: one global fallback plus per-document entries.
///
/// Clients without the workspace-configuration capability only ever touch
/// the global instance; clients with it get per-document entries keyed by
/// normalized URI. Owned by the server and passed by reference — there is
/// no ambient state.
#[derive(Debug, Default)]
pub struct SettingsCache {
    global: BuildSettings,
    per_document: HashMap<String, BuildSettings>,
}

impl SettingsCache {
    /// Create a cache with default global settings and no document entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// The global fallback settings.
    pub fn global(&self) -> &BuildSettings {
        &self.global
    }

    /// Replace the global fallback settings.
    pub fn set_global(&mut self, settings: BuildSettings) {
        self.global = settings;
    }

    /// Look up the cached settings for a document.
    pub fn get(&self, uri: &str) -> Option<&BuildSettings> {
        self.per_document.get(uri)
    }

    /// Cache resolved settings for a document.
    pub fn insert(&mut self, uri: String, settings: BuildSettings) {
        self.per_document.insert(uri, settings);
    }

    /// Drop every per-document entry (configuration changed).
    pub fn invalidate_all(&mut self) {
        self.per_document.clear();
    }

    /// Drop one document's entry (document closed).
    pub fn remove(&mut self, uri: &str) {
        self.per_document.remove(uri);
    }

    /// Number of cached per-document entries.
    pub fn cached_count(&self) -> usize {
        self.per_document.len()
    }
}
