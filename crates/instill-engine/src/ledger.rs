use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::cleanup::{RemovalMode, RemovalQueue};
use crate::fs_utils::{remove_files_except, remove_tree_collect};

/// One tracked directory and the number of products relying on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLocation {
    path: PathBuf,
    count: u32,
}

impl InstallLocation {
    fn new(path: PathBuf) -> Self {
        Self { path, count: 1 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Reference-counted record of the directories this engine created.
///
/// A directory is tracked only if the engine created it: pre-existing
/// directories are never added, so they are never deleted. A tracked
/// directory is physically removed only when its last reference goes.
/// Persisted as `path,count` lines; a corrupt file degrades to an empty
/// ledger rather than failing the operation.
#[derive(Debug, Default)]
pub struct LocationLedger {
    locations: Vec<InstallLocation>,
}

impl LocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(err) => {
                warn!("failed to read install locations {}: {err}", path.display());
                return Self::default();
            }
        };

        let mut locations = Vec::new();
        for line in raw.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let parsed = line
                .rsplit_once(',')
                .and_then(|(entry_path, count)| {
                    count
                        .trim()
                        .parse::<u32>()
                        .ok()
                        .map(|count| (PathBuf::from(entry_path), count))
                });
            match parsed {
                Some((entry_path, count)) => locations.push(InstallLocation {
                    path: entry_path,
                    count,
                }),
                None => warn!("skipping malformed install location line: {line}"),
            }
        }

        Self { locations }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut payload = String::new();
        for location in &self.locations {
            payload.push_str(&format!("{},{}\n", location.path.display(), location.count));
        }
        fs::write(path, payload.as_bytes())
    }

    pub fn locations(&self) -> &[InstallLocation] {
        &self.locations
    }

    pub fn reference_count(&self, path: &Path) -> Option<u32> {
        self.entry_index(path)
            .map(|index| self.locations[index].count)
    }

    /// Creates the directories for an install path. Each already-tracked
    /// prefix gains a reference; each missing directory is created and
    /// tracked with one reference. Returns the names of the directories
    /// this call actually created, shallowest first.
    pub fn create_path(&mut self, path: &Path) -> io::Result<Vec<String>> {
        let mut created = Vec::new();
        let mut location = PathBuf::new();

        for component in path.components() {
            location.push(component);
            let Some(segment) = location.file_name() else {
                // Root and prefix components are never tracked.
                continue;
            };
            let segment = segment.to_string_lossy().into_owned();

            if let Some(index) = self.entry_index(&location) {
                self.locations[index].count += 1;
                if !location.exists() {
                    fs::create_dir(&location)?;
                }
                continue;
            }

            if !location.exists() {
                fs::create_dir(&location)?;
                self.locations.push(InstallLocation::new(location.clone()));
                created.push(segment);
            }
        }

        Ok(created)
    }

    /// Removes one reference from every tracked directory that is an
    /// ancestor of `path` (or `path` itself), deepest first. A directory
    /// whose count reaches zero leaves the ledger and is deleted from
    /// disk with its contents; per-file failures are collected into the
    /// returned leftover list, not raised. Tracked directories that no
    /// longer exist on disk are pruned.
    pub fn delete_tree(&mut self, path: &Path) -> Vec<PathBuf> {
        self.sort_deepest_first();

        let mut leftovers = Vec::new();
        let mut index = 0;
        while index < self.locations.len() {
            let location_path = self.locations[index].path.clone();
            if !location_path.exists() {
                self.locations.remove(index);
                continue;
            }
            if !path.starts_with(&location_path) {
                index += 1;
                continue;
            }

            self.locations[index].count = self.locations[index].count.saturating_sub(1);
            if self.locations[index].count == 0 {
                self.locations.remove(index);
                remove_tree_collect(&location_path, &mut leftovers);
            } else {
                index += 1;
            }
        }

        leftovers
    }

    /// Directory reclamation for an uninstalled product. Files under the
    /// product path are deleted now, except the `exclude` subtree (a
    /// running uninstaller locks its own directory); the product
    /// directory itself and any created parent that lost its last
    /// reference are only scheduled on `queue`, to be removed after the
    /// hosting process exits. Returns the paths that could not be
    /// deleted immediately.
    pub fn release_product_location(
        &mut self,
        product_path: &Path,
        exclude: Option<&Path>,
        queue: &mut RemovalQueue,
    ) -> Vec<PathBuf> {
        let mut leftovers = Vec::new();
        if product_path.exists() {
            remove_files_except(product_path, exclude, &mut leftovers);
        }

        // The product directory is owned by this product outright; its
        // entry goes regardless of count.
        if let Some(index) = self.entry_index(product_path) {
            self.locations.remove(index);
        }
        queue.push(product_path, RemovalMode::Tree);

        self.release_references(product_path, queue);

        leftovers
    }

    /// Releases one reference along the ancestor-or-self chain without
    /// touching the product's files. Used when another product still
    /// shares the location: the counts stay symmetric with the installs
    /// that created them, and entries reaching zero are only scheduled
    /// for empty-only removal.
    pub fn release_references(&mut self, product_path: &Path, queue: &mut RemovalQueue) {
        self.sort_deepest_first();

        let mut index = 0;
        while index < self.locations.len() {
            let location_path = self.locations[index].path.clone();
            if !location_path.exists() {
                self.locations.remove(index);
                continue;
            }
            if !product_path.starts_with(&location_path) {
                index += 1;
                continue;
            }

            self.locations[index].count = self.locations[index].count.saturating_sub(1);
            if self.locations[index].count == 0 {
                self.locations.remove(index);
                queue.push(&location_path, RemovalMode::EmptyOnly);
            } else {
                index += 1;
            }
        }
    }

    fn entry_index(&self, path: &Path) -> Option<usize> {
        self.locations
            .iter()
            .position(|location| location.path == path)
    }

    /// Deepest path first, so a child entry is always handled before the
    /// record of its parent.
    fn sort_deepest_first(&mut self) {
        self.locations.sort_by(|a, b| {
            b.path
                .as_os_str()
                .len()
                .cmp(&a.path.as_os_str().len())
        });
    }
}
