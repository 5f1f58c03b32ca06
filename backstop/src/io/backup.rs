//! Timestamped snapshots of workspace roots.
//!
//! A snapshot copies each root into `<backup root>/<name>_<timestamp>`. Roots
//! are copied concurrently on the blocking pool and joined before the report is
//! returned, so callers can rely on every copy having finished.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::core::timestamp::filesystem_safe_now;
use crate::core::types::{BackupRecord, BackupReport, RootOutcome, WorkspaceRoot};

/// Recursive directory copy primitive.
pub trait TreeCopier: Send + Sync {
    /// Copy every file under `source` into `target`, creating directories as needed.
    fn copy_tree(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Copier backed by the local filesystem.
///
/// Regular files are byte-copied. Symlinks are followed when they point at a
/// regular file and skipped otherwise. Permissions and timestamps are not kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTreeCopier;

impl TreeCopier for FsTreeCopier {
    fn copy_tree(&self, source: &Path, target: &Path) -> Result<()> {
        fs::create_dir_all(target).with_context(|| format!("create {}", target.display()))?;
        // Compare canonical forms so a backup root inside the source is excluded
        // whatever spelling the caller used for it.
        let source = fs::canonicalize(source)
            .with_context(|| format!("resolve {}", source.display()))?;
        let target = fs::canonicalize(target)
            .with_context(|| format!("resolve {}", target.display()))?;
        let backup_root = target.parent();
        let walker = WalkDir::new(&source)
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                Some(entry.path()) != backup_root && !entry.path().starts_with(&target)
            });
        for entry in walker {
            let entry = entry.with_context(|| format!("walk {}", source.display()))?;
            let relative = entry
                .path()
                .strip_prefix(&source)
                .with_context(|| format!("relativize {}", entry.path().display()))?;
            let dest = target.join(relative);
            let file_type = entry.file_type();
            if file_type.is_dir() {
                fs::create_dir_all(&dest)
                    .with_context(|| format!("create {}", dest.display()))?;
                continue;
            }
            if file_type.is_symlink() && !points_to_file(entry.path()) {
                debug!(path = %entry.path().display(), "skipping symlink");
                continue;
            }
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create {}", parent.display()))?;
            }
            fs::copy(entry.path(), &dest).with_context(|| {
                format!("copy {} to {}", entry.path().display(), dest.display())
            })?;
        }
        Ok(())
    }
}

fn points_to_file(path: &Path) -> bool {
    fs::metadata(path).is_ok_and(|meta| meta.is_file())
}

/// Snapshot every root into `destination_root`.
///
/// Missing roots are skipped. A failed copy only marks its own root as failed.
/// Returns an error only when `destination_root` itself cannot be created.
#[instrument(skip_all, fields(roots = roots.len(), destination = %destination_root.display()))]
pub async fn snapshot(
    roots: &[WorkspaceRoot],
    destination_root: &Path,
    copier: Arc<dyn TreeCopier>,
) -> Result<BackupReport> {
    fs::create_dir_all(destination_root)
        .with_context(|| format!("create backup root {}", destination_root.display()))?;
    let destination_root = std::path::absolute(destination_root)
        .with_context(|| format!("resolve backup root {}", destination_root.display()))?;

    let copies = roots.iter().cloned().map(|root| {
        snapshot_root(root, destination_root.clone(), Arc::clone(&copier))
    });
    let outcomes = join_all(copies).await;
    Ok(BackupReport { outcomes })
}

async fn snapshot_root(
    root: WorkspaceRoot,
    destination_root: PathBuf,
    copier: Arc<dyn TreeCopier>,
) -> RootOutcome {
    if !root.path.exists() {
        debug!(name = %root.name, source = %root.path.display(), "root missing, skipped");
        return RootOutcome::Skipped {
            name: root.name,
            source: root.path,
        };
    }
    if !root.path.is_dir() {
        let error = format!("{} is not a directory", root.path.display());
        warn!(name = %root.name, error = %error, "root backup failed");
        return RootOutcome::Failed {
            name: root.name,
            source: root.path,
            error,
        };
    }

    let timestamp = filesystem_safe_now();
    let target = destination_root.join(format!("{}_{}", root.name, timestamp));
    let source = root.path.clone();
    let copy_target = target.clone();
    let copied =
        tokio::task::spawn_blocking(move || copier.copy_tree(&source, &copy_target)).await;

    let error = match copied {
        Ok(Ok(())) => {
            info!(name = %root.name, target = %target.display(), "root backed up");
            return RootOutcome::Copied(BackupRecord {
                root_name: root.name,
                source: root.path,
                path: target,
                timestamp,
            });
        }
        Ok(Err(err)) => format!("{err:#}"),
        Err(err) => format!("copy task failed: {err}"),
    };
    warn!(name = %root.name, error = %error, "root backup failed");
    RootOutcome::Failed {
        name: root.name,
        source: root.path,
        error,
    }
}

/// Names of the entries under the backup root, sorted ascending.
///
/// A backup root that does not exist yet has no backups.
pub fn list_backups(destination_root: &Path) -> Result<Vec<String>> {
    if !destination_root.exists() {
        return Ok(Vec::new());
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(destination_root)
        .with_context(|| format!("read {}", destination_root.display()))?
    {
        let entry = entry.context("read entry")?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::workspace::workspace_root;
    use crate::test_support::{FailingCopier, read_tree, write_files};
    use std::time::Duration;

    fn fs_copier() -> Arc<dyn TreeCopier> {
        Arc::new(FsTreeCopier)
    }

    #[tokio::test]
    async fn snapshot_copies_every_file_with_identical_bytes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let proj = temp.path().join("proj");
        write_files(
            &proj,
            &[
                ("a.txt", "hi"),
                ("src/main.rs", "fn main() {}\n"),
                ("src/deep/nested/data.bin", "\u{0}\u{1}\u{2}"),
            ],
        );
        fs::create_dir_all(proj.join("empty")).expect("mkdir");
        let backup_root = temp.path().join("bk");

        let report = snapshot(&[workspace_root(proj.clone())], &backup_root, fs_copier())
            .await
            .expect("snapshot");

        let records = report.records();
        assert_eq!(records.len(), 1);
        assert!(records[0].path.starts_with(&backup_root));
        assert_eq!(read_tree(&records[0].path), read_tree(&proj));
        assert!(records[0].path.join("empty").is_dir());
    }

    #[tokio::test]
    async fn snapshot_leaves_sources_untouched() {
        let temp = tempfile::tempdir().expect("tempdir");
        let proj = temp.path().join("proj");
        write_files(&proj, &[("a.txt", "hi"), ("b/c.txt", "nested")]);
        let before = read_tree(&proj);

        snapshot(&[workspace_root(proj.clone())], &temp.path().join("bk"), fs_copier())
            .await
            .expect("snapshot");

        assert_eq!(read_tree(&proj), before);
    }

    #[tokio::test]
    async fn missing_root_is_skipped() {
        let temp = tempfile::tempdir().expect("tempdir");
        let backup_root = temp.path().join("bk");

        let report = snapshot(
            &[workspace_root(temp.path().join("gone"))],
            &backup_root,
            fs_copier(),
        )
        .await
        .expect("snapshot");

        assert!(report.records().is_empty());
        assert!(matches!(report.outcomes[0], RootOutcome::Skipped { .. }));
        assert!(backup_root.is_dir());
        assert!(list_backups(&backup_root).expect("list").is_empty());
    }

    #[tokio::test]
    async fn failed_root_does_not_hide_other_roots() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = temp.path().join("first");
        let broken = temp.path().join("broken");
        let last = temp.path().join("last");
        for dir in [&first, &broken, &last] {
            write_files(dir, &[("f.txt", "x")]);
        }
        let copier = Arc::new(FailingCopier::on("broken"));

        let report = snapshot(
            &[
                workspace_root(first),
                workspace_root(broken),
                workspace_root(last),
            ],
            &temp.path().join("bk"),
            copier,
        )
        .await
        .expect("snapshot");

        assert!(report.is_partial());
        let names: Vec<String> = report.records().into_iter().map(|r| r.root_name).collect();
        assert_eq!(names, vec!["first", "last"]);
        match &report.outcomes[1] {
            RootOutcome::Failed { name, error, .. } => {
                assert_eq!(name, "broken");
                assert!(error.contains("disk full"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn uncreatable_backup_root_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let proj = temp.path().join("proj");
        write_files(&proj, &[("a.txt", "hi")]);
        let blocker = temp.path().join("blocker");
        fs::write(&blocker, "not a directory").expect("write");

        let err = snapshot(&[workspace_root(proj)], &blocker.join("bk"), fs_copier())
            .await
            .expect_err("backup root under a file");
        assert!(err.to_string().contains("create backup root"));
    }

    #[tokio::test]
    async fn snapshots_a_second_apart_do_not_overlap() {
        let temp = tempfile::tempdir().expect("tempdir");
        let proj = temp.path().join("proj");
        write_files(&proj, &[("a.txt", "hi")]);
        let backup_root = temp.path().join("bk");
        let roots = [workspace_root(proj.clone())];

        let first = snapshot(&roots, &backup_root, fs_copier())
            .await
            .expect("first");
        tokio::time::sleep(Duration::from_millis(1100)).await;
        let second = snapshot(&roots, &backup_root, fs_copier())
            .await
            .expect("second");

        let first = &first.records()[0];
        let second = &second.records()[0];
        assert_ne!(first.path, second.path);
        assert_eq!(read_tree(&first.path), read_tree(&proj));
        assert_eq!(read_tree(&second.path), read_tree(&proj));
        assert_eq!(list_backups(&backup_root).expect("list").len(), 2);
    }

    #[tokio::test]
    async fn backup_root_inside_workspace_is_not_copied_into_itself() {
        let temp = tempfile::tempdir().expect("tempdir");
        let proj = temp.path().join("proj");
        write_files(&proj, &[("a.txt", "hi")]);
        let backup_root = proj.join(".backups");

        let report = snapshot(&[workspace_root(proj)], &backup_root, fs_copier())
            .await
            .expect("snapshot");

        let record = &report.records()[0];
        assert!(record.path.join("a.txt").is_file());
        assert!(!record.path.join(".backups").exists());
    }

    #[tokio::test]
    async fn unnormalized_backup_root_inside_workspace_is_still_excluded() {
        let temp = tempfile::tempdir().expect("tempdir");
        let proj = temp.path().join("proj");
        write_files(&proj, &[("a.txt", "hi"), ("src/lib.rs", "pub fn f() {}\n")]);
        // Same folder as `proj/.bk`, spelled so that a plain prefix check misses it.
        let backup_root = proj.join("src").join("..").join(".bk");

        let report = snapshot(&[workspace_root(proj.clone())], &backup_root, fs_copier())
            .await
            .expect("snapshot");

        let records = report.records();
        assert_eq!(records.len(), 1, "outcomes: {:?}", report.outcomes);
        assert!(records[0].path.is_absolute());
        assert!(!records[0].path.join(".bk").exists());
        let mut expected = read_tree(&proj);
        expected.retain(|path, _| !path.starts_with(".bk"));
        assert_eq!(read_tree(&records[0].path), expected);
    }

    #[tokio::test]
    async fn file_given_as_root_is_reported_failed() {
        let temp = tempfile::tempdir().expect("tempdir");
        let notes = temp.path().join("notes.txt");
        fs::write(&notes, "not a folder").expect("write");
        let backup_root = temp.path().join("bk");

        let report = snapshot(&[workspace_root(notes)], &backup_root, fs_copier())
            .await
            .expect("snapshot");

        assert!(report.records().is_empty());
        match &report.outcomes[0] {
            RootOutcome::Failed { name, error, .. } => {
                assert_eq!(name, "notes.txt");
                assert!(error.contains("not a directory"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(list_backups(&backup_root).expect("list").is_empty());
    }

    #[test]
    fn listing_is_sorted_and_tolerates_missing_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(list_backups(&temp.path().join("none")).expect("list").is_empty());

        for name in ["proj_b", "proj_a", "other_c"] {
            fs::create_dir_all(temp.path().join(name)).expect("mkdir");
        }
        assert_eq!(
            list_backups(temp.path()).expect("list"),
            vec!["other_c", "proj_a", "proj_b"]
        );
    }
}
