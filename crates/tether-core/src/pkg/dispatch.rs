//! Parallel update of a dependency set.
//!
//! A fixed pool of workers drains a bounded queue of dependency records.
//! Each failure is logged as it happens and kept; the caller gets one
//! combined error once every record has been attempted.

use super::dependency::Dependency;
use super::error::PkgError;
use super::vcs::{UpdateOptions, Vcs};
use crossbeam_channel::bounded;
use parking_lot::Mutex;
use std::path::Path;
use std::thread;
use tracing::{debug, warn};

/// Number of update workers, regardless of how many dependencies there are.
pub const CONCURRENT_WORKERS: usize = 20;

/// Update every dependency in `deps` into `vendor`.
///
/// Returns once all workers have exited. No record is processed twice.
///
/// # Errors
/// Every per-dependency failure, combined with [`PkgError::multiple`].
pub fn concurrent_update(
    deps: &[Dependency],
    vendor: &Path,
    vcs: &dyn Vcs,
    opts: &UpdateOptions,
) -> Result<(), PkgError> {
    if deps.is_empty() {
        return Ok(());
    }

    let (sender, receiver) = bounded::<&Dependency>(CONCURRENT_WORKERS);
    let failures: Mutex<Vec<PkgError>> = Mutex::new(Vec::new());

    thread::scope(|scope| {
        for worker in 0..CONCURRENT_WORKERS {
            let receiver = receiver.clone();
            let failures = &failures;
            scope.spawn(move || {
                // Ends when the sender is dropped and the queue is drained
                for dep in receiver.iter() {
                    debug!(worker, package = %dep.name, "Updating dependency");
                    if let Err(e) = vcs.update(dep, vendor, opts) {
                        warn!(package = %dep.name, error = %e, "Update failed");
                        failures.lock().push(PkgError::update_failed(&dep.name, e));
                    }
                }
            });
        }
        drop(receiver);

        for dep in deps {
            if sender.send(dep).is_err() {
                break;
            }
        }
        drop(sender);
    });

    let failures = failures.into_inner();
    if failures.is_empty() {
        Ok(())
    } else {
        Err(PkgError::multiple(failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::testing::RecordingVcs;
    use tempfile::tempdir;

    fn deps(names: &[&str]) -> Vec<Dependency> {
        names.iter().map(|n| Dependency::new(*n)).collect()
    }

    #[test]
    fn test_empty_list_is_noop() {
        let vendor = tempdir().unwrap();
        let vcs = RecordingVcs::default();
        concurrent_update(&[], vendor.path(), &vcs, &UpdateOptions::default()).unwrap();
        assert!(vcs.updated.lock().is_empty());
    }

    #[test]
    fn test_every_record_processed_once() {
        let vendor = tempdir().unwrap();
        let vcs = RecordingVcs::default();
        let names: Vec<String> = (0..57).map(|i| format!("github.com/org/repo{i}")).collect();
        let list: Vec<Dependency> = names.iter().map(|n| Dependency::new(n.clone())).collect();

        concurrent_update(&list, vendor.path(), &vcs, &UpdateOptions::default()).unwrap();

        let mut updated = vcs.updated.lock().clone();
        updated.sort();
        let mut expected = names.clone();
        expected.sort();
        assert_eq!(updated, expected);
    }

    #[test]
    fn test_failures_are_collected() {
        let vendor = tempdir().unwrap();
        let vcs = RecordingVcs::failing(&["github.com/a/a", "github.com/c/c"]);
        let list = deps(&["github.com/a/a", "github.com/b/b", "github.com/c/c"]);

        let err =
            concurrent_update(&list, vendor.path(), &vcs, &UpdateOptions::default()).unwrap_err();

        assert_eq!(vcs.updated.lock().len(), 3);
        assert!(vendor.path().join("github.com/b/b").is_dir());
        assert_eq!(err.related().len(), 2);
        assert!(err.message().contains("github.com/a/a"));
        assert!(err.message().contains("github.com/c/c"));
        assert!(!err.message().contains("github.com/b/b"));
    }

    #[test]
    fn test_single_failure_names_package() {
        let vendor = tempdir().unwrap();
        let vcs = RecordingVcs::failing(&["github.com/x/x"]);
        let list = deps(&["github.com/x/x"]);

        let err =
            concurrent_update(&list, vendor.path(), &vcs, &UpdateOptions::default()).unwrap_err();
        assert_eq!(err.code(), "PKG_UPDATE_FAILED");
        assert!(err.message().starts_with("Update failed for github.com/x/x"));
    }
}
