//! Per-build diagnostic aggregation.
//!
//! Collects parsed diagnostics grouped by owning file. Files that were
//! dirty in the previous build are seeded with an empty list so the
//! editor clears their stale markers when they come back clean.
use std::collections::{HashMap, HashSet};

use crate::types::Diagnostic;

/// The complete per-file diagnostic picture for one build.
///
/// Created fresh per build, seeded, populated during parsing, and handed
/// off whole for publication at process exit.
#[derive(Debug, Default)]
pub struct FileDiagnosticSet {
    files: HashMap<String, Vec<Diagnostic>>,
}

impl FileDiagnosticSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a set with every previously-dirty URI mapped to an empty
    /// list.
    pub fn seeded<I>(prior: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            files: prior.into_iter().map(|uri| (uri, Vec::new())).collect(),
        }
    }

    /// Append a diagnostic to its owning file, creating the entry if
    /// absent. Order within a file is arrival order.
    pub fn push(&mut self, uri: String, diagnostic: Diagnostic) {
        self.files.entry(uri).or_default().push(diagnostic);
    }

    /// Diagnostics recorded for a URI.
    pub fn get(&self, uri: &str) -> &[Diagnostic] {
        self.files.get(uri).map_or(&[], |v| v.as_slice())
    }

    /// Whether the set has an entry for a URI (possibly empty).
    pub fn contains(&self, uri: &str) -> bool {
        self.files.contains_key(uri)
    }

    /// Number of files in the set, cleared ones included.
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Total number of diagnostics across all files.
    pub fn total_count(&self) -> usize {
        self.files.values().map(|v| v.len()).sum()
    }

    /// URIs that ended the build with at least one diagnostic — the seed
    /// for the next build.
    pub fn non_empty_uris(&self) -> HashSet<String> {
        self.files
            .iter()
            .filter(|(_, diags)| !diags.is_empty())
            .map(|(uri, _)| uri.clone())
            .collect()
    }

    /// Consume the set into `(uri, diagnostics)` pairs for publication.
    pub fn into_publishes(self) -> impl Iterator<Item = (String, Vec<Diagnostic>)> {
        self.files.into_iter()
    }
}
