use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context};
use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};

/// Declarative description of the product being installed. Produced by
/// the surrounding application (config loading is outside the engine);
/// the engine only consumes it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstallDescription {
    pub product_id: String,
    pub product_name: String,
    pub product_version: Version,
    pub uninstall_name: Option<String>,
    pub root_location: PathBuf,
    /// Engine-internal secondary install path. Defaults to
    /// `<root_location>/engine`.
    pub install_location: Option<PathBuf>,
    #[serde(default)]
    pub units: Vec<UnitSpec>,
    /// Action identifiers dropped from the candidate list regardless of
    /// which module contributed them.
    #[serde(default)]
    pub excluded_actions: Vec<String>,
    /// Files bundled into the uninstall directory, `src` or `src:dest`,
    /// relative to the running installer's own directory.
    #[serde(default)]
    pub uninstall_files: Vec<String>,
    #[serde(default)]
    pub uninstall: Option<UninstallPolicy>,
    /// Existing products a patch may target.
    #[serde(default)]
    pub requires: Vec<ProductRange>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnitSpec {
    pub id: String,
    pub version: String,
    /// Identifiers of other units this one requires. Consumed by the
    /// planner when linearizing unit installation.
    #[serde(default)]
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UninstallPolicy {
    #[serde(default = "default_true")]
    pub remove_directories: bool,
    #[serde(default = "default_true")]
    pub show_uninstall: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductRange {
    pub id: String,
    pub range: VersionReq,
}

impl InstallDescription {
    pub fn from_toml_str(input: &str) -> anyhow::Result<Self> {
        let description: Self =
            toml::from_str(input).context("failed to parse install description")?;
        if description.product_id.trim().is_empty() {
            return Err(anyhow!("install description product_id must not be empty"));
        }
        if !description.root_location.is_absolute() {
            return Err(anyhow!(
                "root_location must be absolute: {}",
                description.root_location.display()
            ));
        }
        for entry in &description.uninstall_files {
            let source = entry.split_once(':').map_or(entry.as_str(), |(src, _)| src);
            validate_relative_bundle_path(source)
                .with_context(|| format!("invalid uninstall file entry '{entry}'"))?;
        }
        for range in &description.requires {
            if range.id.trim().is_empty() {
                return Err(anyhow!("requires entry has empty product id"));
            }
        }
        Ok(description)
    }

    pub fn uninstall_display_name(&self) -> &str {
        self.uninstall_name.as_deref().unwrap_or(&self.product_name)
    }

    pub fn engine_location(&self) -> PathBuf {
        self.install_location
            .clone()
            .unwrap_or_else(|| self.root_location.join("engine"))
    }
}

fn validate_relative_bundle_path(path: &str) -> anyhow::Result<&Path> {
    let relative = Path::new(path);
    if relative.as_os_str().is_empty() {
        return Err(anyhow!("bundle path must not be empty"));
    }
    if relative.is_absolute() {
        return Err(anyhow!("bundle path must be relative: {path}"));
    }
    if relative
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        return Err(anyhow!("bundle path must not include '..': {path}"));
    }
    Ok(relative)
}
