//! Native rename/unlink notifications
//!
//! Advisory only. The hook watches the file's parent directory and nudges
//! the path's poll loop to re-check existence early; the poll loop decides
//! what actually happened.

use crate::{Result, WatchError};
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Keeps the native watch alive; dropping it closes the handle
pub(crate) struct NativeHook {
    _watcher: RecommendedWatcher,
}

impl std::fmt::Debug for NativeHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeHook").finish_non_exhaustive()
    }
}

/// Register a native watch for `path`, sending a nudge on `hint_tx` for
/// every create/remove/rename touching it.
///
/// `hint_tx` should have capacity 1; bursts collapse into a single nudge.
pub(crate) fn register(path: &Path, hint_tx: mpsc::Sender<()>) -> Result<NativeHook> {
    let target = path.to_path_buf();
    let watch_dir = parent_dir(path);

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) if is_existence_signal(&event, &target) => {
            trace!(path = %target.display(), kind = ?event.kind, "native existence signal");
            let _ = hint_tx.try_send(());
        }
        Ok(_) => {}
        Err(e) => debug!(path = %target.display(), error = %e, "native watch error"),
    })
    .map_err(|source| WatchError::Notify {
        path: path.to_path_buf(),
        source,
    })?;

    watcher
        .watch(&watch_dir, RecursiveMode::NonRecursive)
        .map_err(|source| WatchError::Notify {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(NativeHook { _watcher: watcher })
}

/// Whether a native event is a rename/unlink-class change of `target`.
///
/// The watch is on the parent directory, so a matching file name is enough
/// and relative and absolute spellings of the path compare equal.
pub(crate) fn is_existence_signal(event: &Event, target: &Path) -> bool {
    let existence_kind = matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(_))
    );

    existence_kind
        && target.file_name().is_some_and(|name| {
            event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(name))
        })
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind, RenameMode};
    use std::time::Duration;
    use tempfile::TempDir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn test_create_remove_rename_are_signals() {
        let target = Path::new("/var/log/app.log");

        assert!(is_existence_signal(
            &event(EventKind::Create(CreateKind::File), "/var/log/app.log"),
            target
        ));
        assert!(is_existence_signal(
            &event(EventKind::Remove(RemoveKind::Any), "/var/log/app.log"),
            target
        ));
        assert!(is_existence_signal(
            &event(
                EventKind::Modify(ModifyKind::Name(RenameMode::From)),
                "/var/log/app.log"
            ),
            target
        ));
    }

    #[test]
    fn test_data_writes_and_other_files_are_ignored() {
        let target = Path::new("/var/log/app.log");

        assert!(!is_existence_signal(
            &event(
                EventKind::Modify(ModifyKind::Data(DataChange::Content)),
                "/var/log/app.log"
            ),
            target
        ));
        assert!(!is_existence_signal(
            &event(EventKind::Remove(RemoveKind::File), "/var/log/other.log"),
            target
        ));
    }

    #[test]
    fn test_relative_target_matches_absolute_event() {
        assert!(is_existence_signal(
            &event(EventKind::Create(CreateKind::Any), "/home/me/./a.log"),
            Path::new("a.log")
        ));
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("a.log")), PathBuf::from("."));
        assert_eq!(
            parent_dir(Path::new("/var/log/a.log")),
            PathBuf::from("/var/log")
        );
    }

    #[test]
    fn test_register_fails_for_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("no-such-dir").join("a.log");
        let (tx, _rx) = mpsc::channel(1);

        assert!(matches!(
            register(&path, tx),
            Err(WatchError::Notify { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_nudges_on_create() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.log");
        let (tx, mut rx) = mpsc::channel(1);

        let Ok(_hook) = register(&path, tx) else {
            // No native backend in this environment; polling covers it
            return;
        };

        std::fs::write(&path, b"x").unwrap();
        let nudged = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(nudged, Ok(Some(()))));
    }
}
