use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};
use tracing::warn;

use instill_core::{
    ActionRegistry, InstallUnit, ManifestError, Mode, Product, ProductRange, ProductStatus,
};

/// Current manifest schema version. A patch operation never rewrites a
/// manifest carrying a different version: the uninstaller that owns that
/// file may still depend on the old schema.
pub const MANIFEST_FORMAT_VERSION: &str = "1";

/// Durable record of every installed product, written next to the
/// uninstaller so uninstall and upgrade work after the installing
/// process has exited.
pub struct Manifest {
    file_version: String,
    data_path: PathBuf,
    created_dirs: Vec<String>,
    products: Vec<Product>,
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest")
            .field("file_version", &self.file_version)
            .field("data_path", &self.data_path)
            .field("created_dirs", &self.created_dirs)
            .field(
                "products",
                &self.products.iter().map(Product::id).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Manifest {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            file_version: MANIFEST_FORMAT_VERSION.to_string(),
            data_path: data_path.into(),
            created_dirs: Vec::new(),
            products: Vec::new(),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn created_dirs(&self) -> &[String] {
        &self.created_dirs
    }

    pub fn set_created_dirs(&mut self, segments: Vec<String>) {
        self.created_dirs = segments;
    }

    pub fn file_version(&self) -> &str {
        &self.file_version
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn product(&self, id: &str) -> Option<&Product> {
        self.products.iter().find(|product| product.id() == id)
    }

    /// First product matching any of the given ranges. With no ranges,
    /// any product matches.
    pub fn product_in_ranges(&self, ranges: &[ProductRange]) -> Option<&Product> {
        if ranges.is_empty() {
            return self.products.first();
        }
        self.products.iter().find(|product| {
            ranges
                .iter()
                .any(|range| range.id == product.id() && range.range.matches(product.version()))
        })
    }

    /// Adding a product whose id is already present is a no-op: the
    /// first record wins.
    pub fn add_product(&mut self, product: Product) {
        if self.product(product.id()).is_none() {
            self.products.push(product);
        }
    }

    pub fn take_product(&mut self, id: &str) -> Option<Product> {
        let index = self.products.iter().position(|product| product.id() == id)?;
        Some(self.products.remove(index))
    }

    /// Loads a manifest if one exists at `path`. A missing file means no
    /// prior installation; a present-but-unreadable file is fatal.
    pub fn load(path: &Path, registry: &ActionRegistry) -> Result<Option<Self>, ManifestError> {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ManifestError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        let doc: ManifestDoc = toml::from_str(&raw).map_err(|err| ManifestError::Parse {
            path: path.to_path_buf(),
            source: err,
        })?;

        let base = path.parent().unwrap_or(Path::new(""));
        let mut products = Vec::new();
        for record in doc.products {
            products.push(record.into_product(base, path, registry)?);
        }

        let created_dirs = if doc.created_dirs.is_empty() {
            Vec::new()
        } else {
            doc.created_dirs.split('/').map(str::to_string).collect()
        };

        Ok(Some(Self {
            file_version: doc.format,
            data_path: PathBuf::from(doc.data_path),
            created_dirs,
            products,
        }))
    }

    /// Writes the manifest, storing product paths relative to the
    /// manifest's own directory so the install tree stays relocatable.
    /// No-op when a patch found an older or newer schema on disk.
    pub fn save(&self, path: &Path, mode: &Mode) -> Result<(), ManifestError> {
        if mode.is_patch() && self.file_version != MANIFEST_FORMAT_VERSION {
            warn!(
                "patch leaving version {} manifest untouched: {}",
                self.file_version,
                path.display()
            );
            return Ok(());
        }

        let base = path.parent().unwrap_or(Path::new(""));
        let doc = ManifestDoc {
            format: MANIFEST_FORMAT_VERSION.to_string(),
            data_path: self.data_path.display().to_string(),
            created_dirs: self.created_dirs.join("/"),
            products: self
                .products
                .iter()
                .map(|product| ProductRecord::from_product(product, base))
                .collect(),
        };

        let payload =
            toml::to_string_pretty(&doc).map_err(|err| ManifestError::Serialize { source: err })?;

        let write = |err| ManifestError::Write {
            path: path.to_path_buf(),
            source: err,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write)?;
        }
        fs::write(path, payload.as_bytes()).map_err(write)
    }
}

#[derive(Serialize, Deserialize)]
struct ManifestDoc {
    format: String,
    data_path: String,
    #[serde(default)]
    created_dirs: String,
    #[serde(default)]
    products: Vec<ProductRecord>,
}

#[derive(Serialize, Deserialize)]
struct ProductRecord {
    id: String,
    name: String,
    version: String,
    uninstall_name: String,
    location: String,
    install_location: String,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default)]
    actions: Vec<ActionRecord>,
    #[serde(default)]
    units: Vec<UnitRecord>,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct ActionRecord {
    id: String,
    #[serde(default)]
    state: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize)]
struct UnitRecord {
    id: String,
    version: String,
}

fn default_status() -> String {
    ProductStatus::Installed.as_str().to_string()
}

impl ProductRecord {
    fn from_product(product: &Product, base: &Path) -> Self {
        Self {
            id: product.id().to_string(),
            name: product.name().to_string(),
            version: product.version().to_string(),
            uninstall_name: product.uninstall_name().to_string(),
            location: relativize(product.location(), base),
            install_location: relativize(product.install_location(), base),
            status: product.status().as_str().to_string(),
            actions: product
                .actions()
                .iter()
                .map(|action| ActionRecord {
                    id: action.id().to_string(),
                    state: action.save_state(),
                })
                .collect(),
            units: product
                .units()
                .iter()
                .map(|unit| UnitRecord {
                    id: unit.id.clone(),
                    version: unit.version.clone(),
                })
                .collect(),
            properties: product.properties().clone(),
        }
    }

    fn into_product(
        self,
        base: &Path,
        path: &Path,
        registry: &ActionRegistry,
    ) -> Result<Product, ManifestError> {
        let invalid = |message: String| ManifestError::Invalid {
            path: path.to_path_buf(),
            message,
        };

        let version = Version::parse(&self.version)
            .map_err(|err| invalid(format!("product {} version: {err}", self.id)))?;
        let status = ProductStatus::parse(&self.status)
            .map_err(|err| invalid(format!("product {}: {err}", self.id)))?;

        let mut product = Product::new(
            self.id,
            self.name,
            version,
            self.uninstall_name,
            resolve(&self.location, base),
            resolve(&self.install_location, base),
        );
        product.set_status(status);

        for record in self.actions {
            // An action contributed by a module that is no longer
            // registered is dropped, never fatal.
            let Some(mut action) = registry.create(&record.id) else {
                warn!("dropping unregistered manifest action: {}", record.id);
                continue;
            };
            match action.restore_state(&record.state) {
                Ok(()) => product.add_action(action),
                Err(err) => warn!("dropping manifest action {}: {err}", record.id),
            }
        }

        for unit in self.units {
            product.add_unit(InstallUnit::new(unit.id, unit.version));
        }
        for (name, value) in self.properties {
            product.set_property(name, value);
        }

        Ok(product)
    }
}

fn relativize(path: &Path, base: &Path) -> String {
    pathdiff::diff_paths(path, base)
        .unwrap_or_else(|| path.to_path_buf())
        .display()
        .to_string()
}

fn resolve(stored: &str, base: &Path) -> PathBuf {
    let stored = Path::new(stored);
    if stored.is_absolute() {
        return stored.to_path_buf();
    }

    // Resolve lexically so ".." segments written by relativize fold away.
    let mut resolved = base.to_path_buf();
    for component in stored.components() {
        match component {
            std::path::Component::ParentDir => {
                resolved.pop();
            }
            std::path::Component::CurDir => {}
            other => resolved.push(other),
        }
    }
    resolved
}
