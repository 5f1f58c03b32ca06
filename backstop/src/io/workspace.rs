//! Workspace roots that must be backed up before any mutation.

use std::path::{Path, PathBuf};

use crate::core::types::WorkspaceRoot;

/// Source of the workspace folders currently open.
pub trait WorkspaceRoots: Send + Sync {
    /// Ordered roots. May be empty.
    fn roots(&self) -> Vec<WorkspaceRoot>;
}

/// A fixed list of roots, e.g. from `--workspace` flags.
#[derive(Debug, Clone, Default)]
pub struct StaticRoots {
    roots: Vec<WorkspaceRoot>,
}

impl StaticRoots {
    pub fn new(roots: Vec<WorkspaceRoot>) -> Self {
        Self { roots }
    }

    /// Build roots from folder paths, naming each after its base name.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::new(
            paths
                .into_iter()
                .map(|path| workspace_root(path.into()))
                .collect(),
        )
    }
}

impl WorkspaceRoots for StaticRoots {
    fn roots(&self) -> Vec<WorkspaceRoot> {
        self.roots.clone()
    }
}

/// Name a root after the last component of its path.
///
/// Paths without a usable last component (`/`, `..`) fall back to `workspace`.
pub fn workspace_root(path: PathBuf) -> WorkspaceRoot {
    WorkspaceRoot {
        name: root_name(&path),
        path,
    }
}

fn root_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "workspace".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roots_are_named_after_base_name() {
        let roots = StaticRoots::from_paths(["/home/me/proj", "/srv/site"]).roots();
        let names: Vec<&str> = roots.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["proj", "site"]);
        assert_eq!(roots[0].path, PathBuf::from("/home/me/proj"));
    }

    #[test]
    fn root_path_falls_back_to_generic_name() {
        assert_eq!(workspace_root(PathBuf::from("/")).name, "workspace");
    }

    #[test]
    fn empty_roots_stay_empty() {
        assert!(StaticRoots::default().roots().is_empty());
    }
}
