use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::fs_utils::{dir_is_empty, make_writable, remove_tree_collect};

const PENDING_REMOVALS_FILENAME: &str = "pending-removals";

/// Location of the deferred-removal queue inside the engine data
/// directory.
pub fn queue_path(data_dir: &Path) -> PathBuf {
    data_dir.join(PENDING_REMOVALS_FILENAME)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalMode {
    /// Remove the directory and everything under it.
    Tree,
    /// Remove the directory only if it is empty by then.
    EmptyOnly,
}

impl RemovalMode {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::EmptyOnly => "empty",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "tree" => Some(Self::Tree),
            "empty" => Some(Self::EmptyOnly),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRemoval {
    pub path: PathBuf,
    pub mode: RemovalMode,
}

/// Directories that could not be removed while the hosting process still
/// held them (a running uninstaller locks its own directory). Persisted
/// as `path,mode` lines in the engine data directory and drained by a
/// later cleanup pass, after the locking process has exited.
#[derive(Debug, Default)]
pub struct RemovalQueue {
    entries: Vec<PendingRemoval>,
}

impl RemovalQueue {
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!("failed to read removal queue {}: {err}", path.display());
                return Self::default();
            }
        };

        let mut entries = Vec::new();
        for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let Some((entry_path, mode)) = line.rsplit_once(',') else {
                warn!("skipping malformed removal queue line: {line}");
                continue;
            };
            let Some(mode) = RemovalMode::parse(mode) else {
                warn!("skipping malformed removal queue line: {line}");
                continue;
            };
            entries.push(PendingRemoval {
                path: PathBuf::from(entry_path),
                mode,
            });
        }

        Self { entries }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut payload = String::new();
        for entry in &self.entries {
            payload.push_str(&format!(
                "{},{}\n",
                entry.path.display(),
                entry.mode.as_str()
            ));
        }
        fs::write(path, payload.as_bytes())
    }

    pub fn push(&mut self, path: impl Into<PathBuf>, mode: RemovalMode) {
        let entry = PendingRemoval {
            path: path.into(),
            mode,
        };
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[PendingRemoval] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One best-effort pass over the queue. Entries that succeed (or no
    /// longer exist) are dropped; whatever still fails stays queued for
    /// the next pass. Deepest paths are handled first so emptied parents
    /// become removable in the same pass.
    pub fn run(&mut self) -> Vec<PathBuf> {
        let mut entries = std::mem::take(&mut self.entries);
        entries.sort_by(|a, b| {
            b.path
                .as_os_str()
                .len()
                .cmp(&a.path.as_os_str().len())
        });

        let mut removed = Vec::new();
        for entry in entries {
            if !entry.path.exists() {
                removed.push(entry.path);
                continue;
            }

            match entry.mode {
                RemovalMode::Tree => {
                    let mut leftovers = Vec::new();
                    remove_tree_collect(&entry.path, &mut leftovers);
                    if leftovers.is_empty() {
                        removed.push(entry.path);
                    } else {
                        warn!(
                            "{} paths under {} still locked, keeping queued",
                            leftovers.len(),
                            entry.path.display()
                        );
                        self.entries.push(entry);
                    }
                }
                RemovalMode::EmptyOnly => {
                    if dir_is_empty(&entry.path) {
                        let _ = make_writable(&entry.path);
                        if fs::remove_dir(&entry.path).is_ok() {
                            removed.push(entry.path);
                        } else {
                            self.entries.push(entry);
                        }
                    }
                    // Non-empty means another product still uses it; the
                    // entry is dropped, not retried.
                }
            }
        }

        removed
    }
}
