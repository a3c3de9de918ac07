use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use semver::Version;

use crate::Action;

/// Whether the product directories may be removed when the product is
/// uninstalled.
pub const PROPERTY_REMOVE_DIRS: &str = "removeDirectories";
/// Whether the product is offered for removal by the uninstaller UI.
pub const PROPERTY_SHOW_UNINSTALL: &str = "showUninstall";

/// An installable component handled by the external provisioning agent.
/// Versions are opaque strings used only for reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallUnit {
    pub id: String,
    pub version: String,
}

impl InstallUnit {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }

    /// Version-qualified form, `id@version`.
    pub fn qualified(&self) -> String {
        format!("{}@{}", self.id, self.version)
    }

    pub fn parse(entry: &str) -> Result<Self> {
        let (id, version) = entry
            .split_once('@')
            .ok_or_else(|| anyhow!("invalid unit entry, expected id@version: {entry}"))?;
        if id.is_empty() {
            return Err(anyhow!("unit entry has empty id: {entry}"));
        }
        Ok(Self::new(id, version))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductStatus {
    Installed,
    PartiallyInstalled,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::PartiallyInstalled => "partial",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "installed" => Ok(Self::Installed),
            "partial" => Ok(Self::PartiallyInstalled),
            _ => Err(anyhow!("invalid product status: {value}")),
        }
    }
}

/// One installed unit-of-distribution: its identity, paths, the ordered
/// actions that were executed for it, the units it caused to be
/// installed, and free-form properties.
pub struct Product {
    id: String,
    name: String,
    version: Version,
    uninstall_name: String,
    location: PathBuf,
    install_location: PathBuf,
    status: ProductStatus,
    actions: Vec<Box<dyn Action>>,
    units: Vec<InstallUnit>,
    properties: BTreeMap<String, String>,
}

impl Product {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        version: Version,
        uninstall_name: impl Into<String>,
        location: impl Into<PathBuf>,
        install_location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            version,
            uninstall_name: uninstall_name.into(),
            location: location.into(),
            install_location: install_location.into(),
            status: ProductStatus::Installed,
            actions: Vec::new(),
            units: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn uninstall_name(&self) -> &str {
        &self.uninstall_name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn install_location(&self) -> &Path {
        &self.install_location
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn set_status(&mut self, status: ProductStatus) {
        self.status = status;
    }

    /// Records an executed action. Order matters: the list is replayed in
    /// the same order for uninstall and rollback.
    pub fn add_action(&mut self, action: Box<dyn Action>) {
        self.actions.push(action);
    }

    pub fn actions(&self) -> &[Box<dyn Action>] {
        &self.actions
    }

    /// Detaches the action list so the actions can be run against a
    /// mutable borrow of this product, then reattached with
    /// `set_actions`.
    pub fn take_actions(&mut self) -> Vec<Box<dyn Action>> {
        std::mem::take(&mut self.actions)
    }

    pub fn set_actions(&mut self, actions: Vec<Box<dyn Action>>) {
        self.actions = actions;
    }

    pub fn add_unit(&mut self, unit: InstallUnit) {
        if !self.units.contains(&unit) {
            self.units.push(unit);
        }
    }

    pub fn units(&self) -> &[InstallUnit] {
        &self.units
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

impl std::fmt::Debug for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Product")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("uninstall_name", &self.uninstall_name)
            .field("location", &self.location)
            .field("install_location", &self.install_location)
            .field("status", &self.status)
            .field(
                "actions",
                &self.actions.iter().map(|a| a.id()).collect::<Vec<_>>(),
            )
            .field("units", &self.units)
            .field("properties", &self.properties)
            .finish()
    }
}

impl PartialEq for Product {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Product {}
