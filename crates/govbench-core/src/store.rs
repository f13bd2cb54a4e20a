//! Run-directory layout and record persistence.
//!
//! A base directory holds numbered run directories, each with up to three
//! artifacts, plus one aggregate summary at the root:
//!
//! ```text
//! data/
//!   evaluation_summary.json
//!   1/scenario.json
//!   1/governance.json
//!   1/evaluation.json
//!   2/...
//! ```
//!
//! Writes go through a temp file and a rename, so a failed write never leaves
//! a truncated artifact behind.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::records::{EvaluationRecord, GovernanceLog, RecordError, ScenarioRecord};

pub const SCENARIO_FILE: &str = "scenario.json";
pub const GOVERNANCE_FILE: &str = "governance.json";
pub const EVALUATION_FILE: &str = "evaluation.json";
pub const SUMMARY_FILE: &str = "evaluation_summary.json";

/// Errors from reading or writing run artifacts.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Base directory not found: {}", .0.display())]
    MissingBaseDir(PathBuf),

    #[error("{} not found", .0.display())]
    MissingInput(PathBuf),

    #[error("Invalid JSON in {}: {source}", path.display())]
    Malformed { path: PathBuf, source: RecordError },

    #[error("I/O error on {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("Failed to serialize {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One run directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name, used in log lines.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    pub fn scenario_path(&self) -> PathBuf {
        self.path.join(SCENARIO_FILE)
    }

    pub fn governance_path(&self) -> PathBuf {
        self.path.join(GOVERNANCE_FILE)
    }

    pub fn evaluation_path(&self) -> PathBuf {
        self.path.join(EVALUATION_FILE)
    }

    pub fn has_scenario(&self) -> bool {
        self.scenario_path().is_file()
    }

    pub fn has_governance(&self) -> bool {
        self.governance_path().is_file()
    }

    pub fn has_evaluation(&self) -> bool {
        self.evaluation_path().is_file()
    }

    pub fn load_scenario(&self) -> Result<ScenarioRecord, StoreError> {
        let path = self.scenario_path();
        let text = read_input(&path)?;
        ScenarioRecord::from_json(&text).map_err(|source| StoreError::Malformed { path, source })
    }

    pub fn load_governance(&self) -> Result<GovernanceLog, StoreError> {
        let path = self.governance_path();
        let text = read_input(&path)?;
        GovernanceLog::from_json(&text).map_err(|source| StoreError::Malformed { path, source })
    }

    pub fn load_evaluation(&self) -> Result<EvaluationRecord, StoreError> {
        load_evaluation_file(&self.evaluation_path())
    }

    pub fn write_scenario(&self, scenario: &ScenarioRecord) -> Result<(), StoreError> {
        write_json_atomic(&self.scenario_path(), scenario)
    }

    pub fn write_governance(&self, log: &GovernanceLog) -> Result<(), StoreError> {
        write_json_atomic(&self.governance_path(), log)
    }

    pub fn write_evaluation(&self, record: &serde_json::Value) -> Result<(), StoreError> {
        write_json_atomic(&self.evaluation_path(), record)
    }
}

/// A base directory of run directories.
#[derive(Debug, Clone)]
pub struct RunStore {
    base: PathBuf,
}

impl RunStore {
    /// Open an existing base directory.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let base = base.into();
        if !base.is_dir() {
            return Err(StoreError::MissingBaseDir(base));
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn summary_path(&self) -> PathBuf {
        self.base.join(SUMMARY_FILE)
    }

    /// Every immediate subdirectory, numeric names first in numeric order.
    pub fn run_dirs(&self) -> Result<Vec<RunDir>, StoreError> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.base).map_err(|e| StoreError::io(&self.base, e))? {
            let entry = entry.map_err(|e| StoreError::io(&self.base, e))?;
            if entry.path().is_dir() {
                dirs.push(RunDir::new(entry.path()));
            }
        }
        dirs.sort_by_key(|dir| {
            let name = dir.name();
            (name.parse::<u64>().unwrap_or(u64::MAX), name)
        });
        Ok(dirs)
    }

    pub fn write_summary<T: Serialize>(&self, summary: &T) -> Result<(), StoreError> {
        write_json_atomic(&self.summary_path(), summary)
    }

    /// Every `evaluation.json` below the base, at any depth, except one
    /// sitting directly in the base itself.
    pub fn evaluation_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        collect_evaluation_files(&self.base, true, &mut files)?;
        Ok(files)
    }

    /// Load every valid evaluation record below the base.
    ///
    /// Invalid files are logged and skipped.
    pub fn load_evaluations(&self) -> Result<Vec<EvaluationRecord>, StoreError> {
        let mut records = Vec::new();
        for path in self.evaluation_files()? {
            match load_evaluation_file(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!(error = %e, "Skipping evaluation file"),
            }
        }
        Ok(records)
    }
}

fn collect_evaluation_files(dir: &Path, is_root: bool, out: &mut Vec<PathBuf>) -> Result<(), StoreError> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| StoreError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for path in entries {
        if path.is_dir() {
            collect_evaluation_files(&path, false, out)?;
        } else if !is_root && path.file_name().is_some_and(|n| n == EVALUATION_FILE) {
            out.push(path);
        }
    }
    Ok(())
}

fn load_evaluation_file(path: &Path) -> Result<EvaluationRecord, StoreError> {
    let text = read_input(path)?;
    EvaluationRecord::from_json(&text).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn read_input(path: &Path) -> Result<String, StoreError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => StoreError::MissingInput(path.to_path_buf()),
        _ => StoreError::io(path, e),
    })
}

/// Write two-space indented JSON through a sibling temp file and a rename.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StoreError> {
    let mut json = serde_json::to_string_pretty(value).map_err(|source| StoreError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    json.push('\n');

    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(StoreError::io(path, e));
    }
    Ok(())
}
