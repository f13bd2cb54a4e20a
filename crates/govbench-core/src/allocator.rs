//! Sequential allocation of numbered run directories.
//!
//! Listing the base directory, picking `max + 1`, creating the directory and
//! populating it all happen under one lock. Splitting that region lets two
//! callers observe the same maximum.

use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::{RunDir, StoreError};

/// Hands out gapless run identifiers under a base directory.
///
/// Exclusivity holds within one process; use a single allocator per base
/// directory.
#[derive(Debug)]
pub struct RunAllocator {
    base: PathBuf,
    lock: Mutex<()>,
}

impl RunAllocator {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Allocate an empty run directory.
    pub fn allocate(&self) -> Result<RunDir, StoreError> {
        self.allocate_with(|_| Ok(())).map(|(run, ())| run)
    }

    /// Allocate a run directory and populate it inside the critical section.
    ///
    /// If `populate` fails the new directory is removed again, so the number
    /// is handed to the next caller instead of leaving a gap.
    pub fn allocate_with<T, F>(&self, populate: F) -> Result<(RunDir, T), StoreError>
    where
        F: FnOnce(&RunDir) -> Result<T, StoreError>,
    {
        let _guard = self.lock.lock();

        fs::create_dir_all(&self.base).map_err(|source| StoreError::Io {
            path: self.base.clone(),
            source,
        })?;

        let next = next_run_number(&self.base)?;
        let run = RunDir::new(self.base.join(next.to_string()));
        fs::create_dir(run.path()).map_err(|source| StoreError::Io {
            path: run.path().to_path_buf(),
            source,
        })?;

        match populate(&run) {
            Ok(value) => {
                tracing::debug!(run = next, "Allocated run directory");
                Ok((run, value))
            }
            Err(e) => {
                let _ = fs::remove_dir_all(run.path());
                Err(e)
            }
        }
    }
}

/// `max + 1` over the numeric directory names in `base`, or 1 if none.
fn next_run_number(base: &Path) -> Result<u64, StoreError> {
    let entries = fs::read_dir(base).map_err(|source| StoreError::Io {
        path: base.to_path_buf(),
        source,
    })?;

    let max = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u64>().ok())
        .max();

    Ok(max.map_or(1, |n| n + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_first_allocation_creates_base() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("data");
        let allocator = RunAllocator::new(&base);

        let run = allocator.allocate().unwrap();
        assert_eq!(run.name(), "1");
        assert!(base.join("1").is_dir());
    }

    #[test]
    fn test_continues_after_existing_runs() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("4")).unwrap();
        fs::create_dir(dir.path().join("archive")).unwrap();
        fs::write(dir.path().join("9"), "a file, not a run").unwrap();

        let allocator = RunAllocator::new(dir.path());
        assert_eq!(allocator.allocate().unwrap().name(), "5");
    }

    #[test]
    fn test_failed_populate_leaves_no_gap() {
        let dir = TempDir::new().unwrap();
        let allocator = RunAllocator::new(dir.path());

        let result = allocator.allocate_with(|run| -> Result<(), StoreError> {
            Err(StoreError::MissingInput(run.scenario_path()))
        });
        assert!(result.is_err());
        assert!(!dir.path().join("1").exists());

        assert_eq!(allocator.allocate().unwrap().name(), "1");
    }

    #[test]
    fn test_concurrent_allocations_are_gapless() {
        let dir = TempDir::new().unwrap();
        let allocator = Arc::new(RunAllocator::new(dir.path()));
        let n = 32;

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let allocator = Arc::clone(&allocator);
                std::thread::spawn(move || allocator.allocate().unwrap().name())
            })
            .collect();

        let ids: BTreeSet<u64> = handles
            .into_iter()
            .map(|h| h.join().unwrap().parse().unwrap())
            .collect();

        assert_eq!(ids, (1..=n).collect::<BTreeSet<u64>>());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            #[test]
            fn prop_allocations_follow_existing_max(
                existing in proptest::collection::btree_set(1u64..200, 0..8),
                count in 1usize..6,
            ) {
                let dir = TempDir::new().unwrap();
                for n in &existing {
                    fs::create_dir(dir.path().join(n.to_string())).unwrap();
                }

                let allocator = RunAllocator::new(dir.path());
                let start = existing.iter().max().copied().unwrap_or(0);
                for offset in 1..=count as u64 {
                    let run = allocator.allocate().unwrap();
                    prop_assert_eq!(run.name(), (start + offset).to_string());
                }
            }
        }
    }
}
