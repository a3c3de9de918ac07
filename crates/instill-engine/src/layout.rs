use std::fs;
use std::path::{Path, PathBuf};

use instill_core::EngineError;

const UNINSTALL_DIRECTORY: &str = "uninstall";
const INSTALL_MANIFEST_FILENAME: &str = "install-manifest.toml";
const LOCATIONS_FILENAME: &str = "locations";

/// Paths used by one operation: the product root location being acted on
/// and the engine's private data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    data_dir: PathBuf,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            data_dir: data_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn uninstall_dir(&self) -> PathBuf {
        self.root.join(UNINSTALL_DIRECTORY)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.uninstall_dir().join(INSTALL_MANIFEST_FILENAME)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LOCATIONS_FILENAME)
    }

    pub fn removal_queue_path(&self) -> PathBuf {
        crate::cleanup::queue_path(&self.data_dir)
    }

    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.data_dir)
    }
}

pub fn default_data_dir() -> Result<PathBuf, EngineError> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA").map_err(|_| {
            EngineError::location("LOCALAPPDATA is not set; cannot resolve engine data directory")
        })?;
        return Ok(PathBuf::from(app_data).join("Instill"));
    }

    let home = std::env::var("HOME")
        .map_err(|_| EngineError::location("HOME is not set; cannot resolve engine data directory"))?;
    Ok(PathBuf::from(home).join(".instill"))
}
