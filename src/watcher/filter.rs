//! Extension filter for change events.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind};

/// Keeps only events that touch files with one of the given extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionFilter {
    extensions: Vec<String>,
}

impl ExtensionFilter {
    /// Create a filter. Leading dots are ignored, so `".py"` and `"py"` are
    /// equivalent. An empty list matches every file.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_string())
            .filter(|e| !e.is_empty())
            .collect();
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether a path has one of the configured extensions
    pub fn matches(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|e| e == ext),
            None => false,
        }
    }

    /// First matching path of a create/modify/remove event
    pub fn relevant_path(&self, event: &Event) -> Option<PathBuf> {
        match event.kind {
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) | EventKind::Any => {
                event.paths.iter().find(|p| self.matches(p)).cloned()
            }
            _ => None,
        }
    }
}
