//! Ignore/include pattern matching against paths relative to the traversal root.

use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{Diagnostic, DiagnosticKind};

/// `*` crosses `/`, and names are matched case-sensitively.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

#[derive(Debug, Default)]
pub struct PatternFilter {
    ignore: Vec<Pattern>,
    include: Vec<Pattern>,
}

impl PatternFilter {
    /// Compiles both sets. A pattern that is not a valid glob is matched literally
    /// and reported.
    pub fn new(ignore: &BTreeSet<String>, include: &BTreeSet<String>) -> (Self, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let filter = Self {
            ignore: compile(ignore, &mut diagnostics),
            include: compile(include, &mut diagnostics),
        };
        (filter, diagnostics)
    }

    pub fn is_excluded(&self, relative_path: &str) -> bool {
        let hit = self
            .ignore
            .iter()
            .find(|p| p.matches_with(relative_path, MATCH_OPTIONS));
        if let Some(pattern) = hit {
            debug!(path = relative_path, pattern = pattern.as_str(), "[TRAVERSE] Excluded by pattern");
        }
        hit.is_some()
    }

    /// True when no include pattern is configured or one of them matches.
    pub fn is_included(&self, relative_path: &str) -> bool {
        self.include.is_empty()
            || self
                .include
                .iter()
                .any(|p| p.matches_with(relative_path, MATCH_OPTIONS))
    }
}

fn compile(patterns: &BTreeSet<String>, diagnostics: &mut Vec<Diagnostic>) -> Vec<Pattern> {
    patterns
        .iter()
        .filter_map(|raw| match Pattern::new(raw) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::Manifest,
                    None,
                    format!("Invalid pattern {raw:?} ({e}), matching it literally"),
                ));
                Pattern::new(&Pattern::escape(raw)).ok()
            }
        })
        .collect()
}
