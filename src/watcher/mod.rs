pub mod event;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;

use crate::filter::IgnoreMatcher;
use event::{ChangeEvent, ChangeKind};

/// A configured watch root and whether it existed at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTarget {
    pub path: PathBuf,
    pub exists: bool,
}

impl WatchTarget {
    /// Resolve `dir` against the repository directory and probe it once.
    pub fn resolve(repo: &Path, dir: &Path) -> Self {
        let path = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            repo.join(dir)
        };
        let exists = path.is_dir();
        Self { path, exists }
    }
}

/// Handle to a running watcher. Dropping it stops the OS subscription.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
    /// Forwards events from the notify callback thread into tokio.
    _bridge_task: JoinHandle<()>,
}

/// Per-root filtering: configured ignore patterns plus, optionally, the root's `.gitignore`.
pub struct PathFilter {
    matcher: Arc<IgnoreMatcher>,
    gitignore: Option<Gitignore>,
}

impl PathFilter {
    pub fn new(matcher: Arc<IgnoreMatcher>) -> Self {
        Self {
            matcher,
            gitignore: None,
        }
    }

    /// Also honour `<root>/.gitignore`. A missing or unreadable file matches nothing.
    pub fn with_gitignore(mut self, root: &Path) -> Self {
        self.gitignore = Some(build_gitignore_matcher(root));
        self
    }

    /// `relative` is relative to the watch root.
    fn is_ignored(&self, relative: &Path) -> bool {
        if self.matcher.is_ignored_path(relative) {
            return true;
        }
        match &self.gitignore {
            Some(gitignore) => {
                let candidate = gitignore.path().join(relative);
                gitignore
                    .matched_path_or_any_parents(&candidate, candidate.is_dir())
                    .is_ignore()
            }
            None => false,
        }
    }
}

fn build_gitignore_matcher(root: &Path) -> Gitignore {
    let mut builder = GitignoreBuilder::new(root);
    let gitignore_path = root.join(".gitignore");
    if gitignore_path.exists()
        && let Some(err) = builder.add(&gitignore_path)
    {
        tracing::warn!(path = %gitignore_path.display(), error = %err, "could not read .gitignore");
    }
    builder.build().unwrap_or_else(|_| Gitignore::empty())
}

/// Turn one raw notification into the change events worth forwarding.
///
/// `canonical_root` is the directory actually subscribed to (notify reports paths
/// under it); `root` is the configured spelling used in the emitted events.
pub fn classify_event(
    event: &notify::Event,
    root: &Path,
    canonical_root: &Path,
    filter: &PathFilter,
) -> Vec<ChangeEvent> {
    let Some(kind) = ChangeKind::from_notify(&event.kind) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for absolute in &event.paths {
        let Ok(relative) = absolute.strip_prefix(canonical_root) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        if filter.is_ignored(relative) {
            tracing::trace!(path = %relative.display(), "ignored change");
            continue;
        }
        let change = ChangeEvent {
            kind,
            root: root.to_path_buf(),
            path: relative.to_path_buf(),
        };
        if !out.contains(&change) {
            out.push(change);
        }
    }
    out
}

/// Subscribe recursively to `target` and forward filtered changes on `tx`.
///
/// Returns `Ok(None)` (after a warning) when the directory did not exist at
/// startup; it is not retried. A subscription failure is returned as an error
/// and affects this directory only.
pub fn start_watcher(
    target: &WatchTarget,
    filter: PathFilter,
    tx: tokio_mpsc::Sender<ChangeEvent>,
) -> anyhow::Result<Option<WatcherHandle>> {
    if !target.exists {
        tracing::warn!(dir = %target.path.display(), "watch directory not found; skipping");
        return Ok(None);
    }

    let canonical_root = std::fs::canonicalize(&target.path)
        .with_context(|| format!("failed to resolve {}", target.path.display()))?;

    let (std_tx, std_rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        let _ = std_tx.send(res);
    })
    .context("failed to create filesystem watcher")?;
    watcher
        .watch(&canonical_root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", target.path.display()))?;

    let root = target.path.clone();
    let bridge_task = tokio::task::spawn_blocking(move || {
        while let Ok(result) = std_rx.recv() {
            match result {
                Ok(event) => {
                    for change in classify_event(&event, &root, &canonical_root, &filter) {
                        tracing::info!(
                            kind = ?change.kind,
                            path = %change.full_path().display(),
                            "file changed"
                        );
                        if tx.blocking_send(change).is_err() {
                            return; // receiver dropped, shutdown
                        }
                    }
                }
                Err(err) => {
                    tracing::error!(dir = %root.display(), error = %err, "watcher error");
                }
            }
        }
    });

    tracing::info!(dir = %target.path.display(), "watching directory");
    Ok(Some(WatcherHandle {
        _watcher: watcher,
        _bridge_task: bridge_task,
    }))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind, RenameMode};
    use notify::{Event, EventKind};

    use super::*;
    use crate::aggregator::{CommitCycleController, ControllerSettings};
    use crate::git::fake::FakeGit;
    use crate::message::MessageStyle;
    use crate::pipeline::{CommitPipeline, PushTarget};

    fn filter(patterns: &[&str]) -> PathFilter {
        PathFilter::new(Arc::new(IgnoreMatcher::new(patterns).unwrap()))
    }

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    fn modify() -> EventKind {
        EventKind::Modify(ModifyKind::Data(DataChange::Content))
    }

    #[test]
    fn test_resolve_target_probes_existence() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("api")).unwrap();

        let present = WatchTarget::resolve(dir.path(), Path::new("api"));
        assert!(present.exists);
        assert_eq!(present.path, dir.path().join("api"));

        let missing = WatchTarget::resolve(dir.path(), Path::new("frontend"));
        assert!(!missing.exists);
    }

    #[test]
    fn test_classify_strips_root_and_keeps_configured_spelling() {
        let f = filter(&[]);
        let changes = classify_event(
            &event(modify(), &["/abs/repo/api/src/app.py"]),
            Path::new("api"),
            Path::new("/abs/repo/api"),
            &f,
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, PathBuf::from("src/app.py"));
        assert_eq!(changes[0].full_path(), PathBuf::from("api/src/app.py"));
        assert_eq!(changes[0].kind, ChangeKind::Modify);
    }

    #[test]
    fn test_classify_treats_all_change_kinds_alike() {
        let f = filter(&[]);
        let kinds = [
            (EventKind::Create(CreateKind::File), ChangeKind::Create),
            (modify(), ChangeKind::Modify),
            (EventKind::Remove(RemoveKind::File), ChangeKind::Remove),
            (EventKind::Modify(ModifyKind::Name(RenameMode::Both)), ChangeKind::Rename),
            (EventKind::Any, ChangeKind::Other),
        ];
        for (raw, expected) in kinds {
            let changes = classify_event(&event(raw, &["/r/f.txt"]), Path::new("r"), Path::new("/r"), &f);
            assert_eq!(changes.len(), 1, "{expected:?} should be forwarded");
            assert_eq!(changes[0].kind, expected);
        }
    }

    #[test]
    fn test_classify_drops_read_only_access() {
        let f = filter(&[]);
        let changes = classify_event(
            &event(EventKind::Access(AccessKind::Read), &["/r/f.txt"]),
            Path::new("r"),
            Path::new("/r"),
            &f,
        );
        assert!(changes.is_empty());
    }

    #[test]
    fn test_classify_applies_ignore_patterns_to_relative_path() {
        let f = filter(&["node_modules", "*.log"]);
        let changes = classify_event(
            &event(
                modify(),
                &["/r/web/node_modules/a.js", "/r/y.log", "/r/x.txt"],
            ),
            Path::new("r"),
            Path::new("/r"),
            &f,
        );
        let kept: Vec<_> = changes.iter().map(|c| c.path.clone()).collect();
        assert_eq!(kept, vec![PathBuf::from("x.txt")]);
    }

    #[test]
    fn test_classify_skips_root_itself_and_foreign_paths() {
        let f = filter(&[]);
        let changes = classify_event(
            &event(modify(), &["/r", "/elsewhere/file"]),
            Path::new("r"),
            Path::new("/r"),
            &f,
        );
        assert!(changes.is_empty());
    }

    #[test]
    fn test_gitignore_is_honoured_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join(".gitignore"), "generated/\n*.tmp\n").unwrap();
        fs::create_dir(root.join("generated")).unwrap();

        let f = filter(&[]).with_gitignore(root);
        let changes = classify_event(
            &event(
                modify(),
                &[
                    root.join("generated/out.js").to_str().unwrap(),
                    root.join("scratch.tmp").to_str().unwrap(),
                    root.join("main.py").to_str().unwrap(),
                ],
            ),
            root,
            root,
            &f,
        );
        let kept: Vec<_> = changes.iter().map(|c| c.path.clone()).collect();
        assert_eq!(kept, vec![PathBuf::from("main.py")]);
    }

    #[tokio::test]
    async fn test_missing_directory_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let target = WatchTarget::resolve(dir.path(), Path::new("nope"));
        let (tx, _rx) = tokio_mpsc::channel(8);
        let handle = start_watcher(&target, filter(&[]), tx).unwrap();
        assert!(handle.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_watcher_reports_real_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("api")).unwrap();
        let target = WatchTarget::resolve(dir.path(), Path::new("api"));
        let (tx, mut rx) = tokio_mpsc::channel(64);
        let _handle = start_watcher(&target, filter(&["*.log"]), tx)
            .unwrap()
            .expect("directory exists");

        fs::write(dir.path().join("api/debug.log"), "noise").unwrap();
        fs::write(dir.path().join("api/app.py"), "print('hi')").unwrap();

        let change = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let change = rx.recv().await.expect("watcher alive");
                if change.path == Path::new("app.py") {
                    return change;
                }
                assert_ne!(change.path, Path::new("debug.log"), "ignored file forwarded");
            }
        })
        .await
        .expect("change observed");
        assert_eq!(change.full_path(), dir.path().join("api/app.py"));
    }

    /// Root `A` with changes to `x.txt` and `y.log` under a `*.log` ignore rule:
    /// only `x.txt` reaches the changeset.
    #[tokio::test(start_paused = true)]
    async fn test_ignored_paths_never_reach_the_changeset() {
        let git = Arc::new(FakeGit::dirty());
        let pipeline = CommitPipeline::new(
            git.clone(),
            MessageStyle {
                prefix: "Auto-commit".to_string(),
                use_timestamp: true,
            },
            PushTarget {
                enabled: false,
                remote: "origin".to_string(),
                branch: "main".to_string(),
            },
        );
        let mut ctl = CommitCycleController::start(
            Arc::new(pipeline),
            ControllerSettings {
                debounce: Duration::from_secs(3),
                max_files_per_commit: 50,
            },
        );

        let f = filter(&["*.log"]);
        let raw = event(modify(), &["/work/A/x.txt", "/work/A/y.log"]);
        for change in classify_event(&raw, Path::new("A"), Path::new("/work/A"), &f) {
            ctl.handle.notify(change.full_path());
        }

        let report = ctl.reports.recv().await.expect("cycle");
        assert_eq!(report.paths, vec![PathBuf::from("A/x.txt")]);
        assert!(report.outcome.is_success());
    }
}
