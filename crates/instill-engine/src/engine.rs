use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use instill_core::{
    Action, ActionContext, ActionRegistry, EngineError, InstallData, InstallDescription, Mode,
    Module, NullProgress, Phase, Platform, Product, ProductStatus, ProgressMonitor,
    PROPERTY_REMOVE_DIRS, PROPERTY_SHOW_UNINSTALL,
};

use crate::cleanup::{self, RemovalMode, RemovalQueue};
use crate::fs_utils::{copy_recursive, remove_file_if_exists};
use crate::layout::InstallLayout;
use crate::ledger::LocationLedger;
use crate::manifest::Manifest;

const CLEANUP_PROGRESS: u32 = 10;
const UNINSTALL_SETUP_PROGRESS: u32 = 10;

/// Lifecycle of one product-operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Running { phase: Phase, index: usize },
    Committed,
    RolledBack,
    Failed,
}

/// Terminal status reported to the caller. Failures propagate as
/// `EngineError` instead; cancellation is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub product_id: String,
    pub status: OperationStatus,
    pub state: OperationState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOutcome {
    pub status: OperationStatus,
    pub removed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductSummary {
    pub id: String,
    pub name: String,
    pub version: String,
    pub status: ProductStatus,
    pub location: PathBuf,
    pub show_uninstall: bool,
}

/// Drives one install or uninstall operation end-to-end: phase-ordered
/// action execution, rollback on cancellation, and manifest consistency.
/// One engine drives one operation at a time against one install
/// location; the surrounding application enforces that.
pub struct Engine {
    registry: ActionRegistry,
    modules: Vec<Box<dyn Module>>,
    platform: Platform,
    data_dir: PathBuf,
    installer_home: Option<PathBuf>,
}

impl Engine {
    pub fn new(registry: ActionRegistry, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            modules: Vec::new(),
            platform: Platform::current(),
            data_dir: data_dir.into(),
            installer_home: None,
        }
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Directory the uninstaller bundle files are copied from. Defaults
    /// to the running executable's directory.
    pub fn with_installer_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.installer_home = Some(home.into());
        self
    }

    pub fn add_module(&mut self, module: Box<dyn Module>) {
        self.modules.push(module);
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn install(
        &self,
        description: &InstallDescription,
        data: &InstallData,
        patch: bool,
        monitor: &mut dyn ProgressMonitor,
    ) -> Result<InstallOutcome, EngineError> {
        let layout = InstallLayout::new(&description.root_location, &self.data_dir);
        layout.ensure_data_dir().map_err(|err| {
            EngineError::location_io(
                format!("failed to create data directory {}", self.data_dir.display()),
                err,
            )
        })?;

        let mut ledger = LocationLedger::load(&layout.ledger_path());
        let mut manifest = Manifest::load(&layout.manifest_path(), &self.registry)?
            .unwrap_or_else(|| Manifest::new(&self.data_dir));

        let (mode, existing_id) = self.resolve_mode(description, &manifest, patch)?;
        info!(
            "installing {} {} (upgrade={}, update={}, patch={})",
            description.product_id,
            description.product_version,
            mode.is_upgrade(),
            mode.is_update(),
            mode.is_patch()
        );

        let mut actions = self.collect_actions(description, data, &mode);
        // Stable: contribution order is kept within a phase.
        actions.sort_by_key(|action| action.phase());

        // Only a product new to this manifest adds references: an
        // update or upgrade re-enters a tree its first install already
        // accounted for, and the matching uninstall releases once.
        let created = if existing_id.is_none() {
            ledger.create_path(&description.root_location).map_err(|err| {
                EngineError::location_io(
                    format!(
                        "failed to create install location {}",
                        description.root_location.display()
                    ),
                    err,
                )
            })?
        } else {
            fs::create_dir_all(&description.root_location).map_err(|err| {
                EngineError::location_io(
                    format!(
                        "failed to create install location {}",
                        description.root_location.display()
                    ),
                    err,
                )
            })?;
            Vec::new()
        };
        // The engine-internal location lives inside the tracked root
        // tree and goes away with it; it gets no ledger entry of its own.
        fs::create_dir_all(description.engine_location()).map_err(|err| {
            EngineError::location_io(
                format!(
                    "failed to create engine location {}",
                    description.engine_location().display()
                ),
                err,
            )
        })?;
        if !created.is_empty() {
            manifest.set_created_dirs(created);
        }

        // A true upgrade reverses the replaced version before the new
        // action set runs. An update re-installs into the existing record.
        if mode.is_upgrade() {
            if let Some(old_id) = &existing_id {
                if let Some(mut old) = manifest.take_product(old_id) {
                    info!("removing superseded {} {}", old.id(), old.version());
                    self.reverse_for_upgrade(&mut old, data, &mode)?;
                    manifest.save(&layout.manifest_path(), &mode)?;
                }
            }
        }

        let mut product = Product::new(
            &description.product_id,
            &description.product_name,
            description.product_version.clone(),
            description.uninstall_display_name(),
            &description.root_location,
            description.engine_location(),
        );
        if let Some(policy) = &description.uninstall {
            product.set_property(PROPERTY_REMOVE_DIRS, policy.remove_directories.to_string());
            product.set_property(PROPERTY_SHOW_UNINSTALL, policy.show_uninstall.to_string());
        }
        for (name, value) in &description.properties {
            product.set_property(name, value);
        }

        let ctx = ActionContext {
            data,
            platform: &self.platform,
        };
        let total: u32 = actions
            .iter()
            .filter(|action| action.is_supported(&self.platform))
            .map(|action| action.progress_weight())
            .sum();
        monitor.begin_task(
            &description.product_name,
            total + CLEANUP_PROGRESS + UNINSTALL_SETUP_PROGRESS,
        );

        let mut state = OperationState::Pending;
        debug!("{}: {state:?}", description.product_id);
        let mut cancelled = false;
        for (index, mut action) in actions.into_iter().enumerate() {
            if !action.is_supported(&self.platform) {
                debug!("skipping unsupported action {}", action.id());
                continue;
            }

            state = OperationState::Running {
                phase: action.phase(),
                index,
            };
            debug!("{}: {state:?} action {}", description.product_id, action.id());

            let weight = action.progress_weight();
            if let Err(source) = action.run(&ctx, &mut product, &mode, monitor) {
                let id = action.id().to_string();
                error!(
                    "action '{id}' failed; recording {} as partially installed",
                    description.product_id
                );
                debug!("{}: {:?}", description.product_id, OperationState::Failed);
                product.set_status(ProductStatus::PartiallyInstalled);
                manifest.add_product(product);
                if let Err(err) = manifest.save(&layout.manifest_path(), &mode) {
                    error!("failed to record partial install: {err}");
                }
                if let Err(err) = ledger.save(&layout.ledger_path()) {
                    warn!("failed to save install locations: {err}");
                }
                return Err(EngineError::Action { id, source });
            }

            product.add_action(action);
            monitor.worked(weight);
            if monitor.is_cancelled() {
                cancelled = true;
                break;
            }
        }

        if cancelled {
            info!(
                "installation cancelled; rolling back {} completed actions",
                product.actions().len()
            );
            monitor.set_task("Cleaning up installation");

            let rollback_mode = if manifest.is_empty() {
                mode.to_uninstall().root_uninstalling()
            } else {
                mode.to_uninstall()
            };
            let mut completed = product.take_actions();
            for action in completed.iter_mut() {
                if !action.is_supported(&self.platform) {
                    continue;
                }
                if let Err(source) = action.run(&ctx, &mut product, &rollback_mode, &mut NullProgress)
                {
                    let id = action.id().to_string();
                    return Err(EngineError::Action { id, source });
                }
            }

            let leftovers = ledger.delete_tree(&description.root_location);
            if !leftovers.is_empty() {
                warn!(
                    "{} paths under {} could not be removed during rollback",
                    leftovers.len(),
                    description.root_location.display()
                );
            }
            if let Err(err) = ledger.save(&layout.ledger_path()) {
                warn!("failed to save install locations: {err}");
            }
            monitor.worked(CLEANUP_PROGRESS);

            state = OperationState::RolledBack;
            debug!("{}: {state:?}", description.product_id);
            return Ok(InstallOutcome {
                product_id: description.product_id.clone(),
                status: OperationStatus::Cancelled,
                state,
            });
        }

        monitor.worked(CLEANUP_PROGRESS);
        // An update over a partially-installed record repairs it; a
        // complete record wins over the re-run (add is first-wins).
        if mode.is_update() {
            if let Some(existing) = manifest.product(&description.product_id) {
                if existing.status() == ProductStatus::PartiallyInstalled {
                    manifest.take_product(&description.product_id);
                }
            }
        }
        manifest.add_product(product);

        if !mode.is_update() {
            self.bootstrap_uninstaller(description, &layout);
        }

        // Last step: once the manifest is on disk the operation is
        // durably committed.
        manifest.save(&layout.manifest_path(), &mode)?;
        if let Err(err) = ledger.save(&layout.ledger_path()) {
            warn!("failed to save install locations: {err}");
        }
        monitor.worked(UNINSTALL_SETUP_PROGRESS);

        state = OperationState::Committed;
        debug!("{}: {state:?}", description.product_id);
        Ok(InstallOutcome {
            product_id: description.product_id.clone(),
            status: OperationStatus::Success,
            state,
        })
    }

    pub fn uninstall(
        &self,
        root_location: &Path,
        product_ids: &[String],
        monitor: &mut dyn ProgressMonitor,
    ) -> Result<UninstallOutcome, EngineError> {
        let layout = InstallLayout::new(root_location, &self.data_dir);
        layout.ensure_data_dir().map_err(|err| {
            EngineError::location_io(
                format!("failed to create data directory {}", self.data_dir.display()),
                err,
            )
        })?;

        let mut ledger = LocationLedger::load(&layout.ledger_path());
        let mut queue = RemovalQueue::load(&layout.removal_queue_path());
        let Some(mut manifest) = Manifest::load(&layout.manifest_path(), &self.registry)? else {
            return Err(EngineError::location(format!(
                "no install manifest found under {}",
                root_location.display()
            )));
        };

        let root_uninstall = product_ids.len() == manifest.products().len()
            && manifest
                .products()
                .iter()
                .all(|product| product_ids.iter().any(|id| id == product.id()));
        let mode = if root_uninstall {
            Mode::uninstall().root_uninstalling()
        } else {
            Mode::uninstall()
        };

        let data = InstallData::new();
        let ctx = ActionContext {
            data: &data,
            platform: &self.platform,
        };

        let total: u32 = product_ids
            .iter()
            .filter_map(|id| manifest.product(id))
            .map(|product| {
                product
                    .actions()
                    .iter()
                    .filter(|action| action.is_supported(&self.platform))
                    .map(|action| action.progress_weight())
                    .sum::<u32>()
            })
            .sum();
        monitor.begin_task("Uninstalling", total + CLEANUP_PROGRESS);

        let uninstall_dir = layout.uninstall_dir();
        let mut removed = Vec::new();
        let mut cancelled = false;

        for id in product_ids {
            let Some(mut product) = manifest.take_product(id) else {
                warn!("product not found in manifest: {id}");
                continue;
            };
            info!("uninstalling {} {}", product.id(), product.version());
            monitor.set_task(product.name());

            let mut actions = product.take_actions();
            for action in actions.iter_mut() {
                if !action.is_supported(&self.platform) {
                    continue;
                }
                let weight = action.progress_weight();
                if let Err(source) = action.run(&ctx, &mut product, &mode, monitor) {
                    let action_id = action.id().to_string();
                    return Err(EngineError::Action {
                        id: action_id,
                        source,
                    });
                }
                monitor.worked(weight);
                if monitor.is_cancelled() {
                    cancelled = true;
                    break;
                }
            }

            if cancelled {
                // The interrupted product stays installed; nothing was
                // saved, so the on-disk manifest still records it.
                product.set_actions(actions);
                manifest.add_product(product);
                break;
            }

            self.reclaim_product_location(&product, &manifest, &uninstall_dir, &mut ledger, &mut queue);
            removed.push(product.id().to_string());

            if !mode.is_root_uninstall() {
                manifest.save(&layout.manifest_path(), &mode)?;
            }
        }

        if mode.is_root_uninstall() && !cancelled {
            // The whole installation goes away: delete the manifest
            // outright instead of rewriting it product-by-product.
            if let Err(err) = remove_file_if_exists(&layout.manifest_path()) {
                warn!("failed to remove install manifest: {err}");
            }
            queue.push(&uninstall_dir, RemovalMode::Tree);
            schedule_created_parents(&manifest, root_location, &mut queue);
        }
        monitor.worked(CLEANUP_PROGRESS);

        if let Err(err) = ledger.save(&layout.ledger_path()) {
            warn!("failed to save install locations: {err}");
        }
        if let Err(err) = queue.save(&layout.removal_queue_path()) {
            warn!("failed to save removal queue: {err}");
        }

        Ok(UninstallOutcome {
            status: if cancelled {
                OperationStatus::Cancelled
            } else {
                OperationStatus::Success
            },
            removed,
        })
    }

    /// Products recorded in the manifest under `root_location`, newest
    /// record last. An absent manifest is an empty installation.
    pub fn installed_products(
        &self,
        root_location: &Path,
    ) -> Result<Vec<ProductSummary>, EngineError> {
        let layout = InstallLayout::new(root_location, &self.data_dir);
        let Some(manifest) = Manifest::load(&layout.manifest_path(), &self.registry)? else {
            return Ok(Vec::new());
        };

        Ok(manifest
            .products()
            .iter()
            .map(|product| ProductSummary {
                id: product.id().to_string(),
                name: product.name().to_string(),
                version: product.version().to_string(),
                status: product.status(),
                location: product.location().to_path_buf(),
                show_uninstall: product
                    .property(PROPERTY_SHOW_UNINSTALL)
                    .map(|value| value != "false")
                    .unwrap_or(true),
            })
            .collect())
    }

    /// One pass over the deferred-removal queue. Run after the process
    /// that held the locks has exited.
    pub fn run_cleanup(&self) -> Vec<PathBuf> {
        let path = cleanup::queue_path(&self.data_dir);
        let mut queue = RemovalQueue::load(&path);
        if queue.is_empty() {
            return Vec::new();
        }

        let cleaned = queue.run();
        if let Err(err) = queue.save(&path) {
            warn!("failed to save removal queue: {err}");
        }
        cleaned
    }

    fn resolve_mode(
        &self,
        description: &InstallDescription,
        manifest: &Manifest,
        patch: bool,
    ) -> Result<(Mode, Option<String>), EngineError> {
        if patch {
            let Some(target) = manifest.product_in_ranges(&description.requires) else {
                return Err(EngineError::PatchTargetMissing {
                    id: description.product_id.clone(),
                });
            };
            if target.version() == &description.product_version {
                return Err(EngineError::AlreadyInstalled {
                    id: target.id().to_string(),
                    version: target.version().to_string(),
                });
            }
            return Ok((Mode::patch(), Some(target.id().to_string())));
        }

        let mode = Mode::install();
        match manifest.product(&description.product_id) {
            Some(existing) if existing.version() == &description.product_version => {
                Ok((mode.updating(), Some(existing.id().to_string())))
            }
            Some(existing) => Ok((mode.upgrading(), Some(existing.id().to_string()))),
            None => Ok((mode, None)),
        }
    }

    fn collect_actions(
        &self,
        description: &InstallDescription,
        data: &InstallData,
        mode: &Mode,
    ) -> Vec<Box<dyn Action>> {
        let mut actions = Vec::new();
        for module in &self.modules {
            for action in module.install_actions(data, mode) {
                if description
                    .excluded_actions
                    .iter()
                    .any(|excluded| excluded == action.id())
                {
                    debug!("excluding action {}", action.id());
                    continue;
                }
                actions.push(action);
            }
        }
        actions
    }

    /// Runs the replaced product's `remove_on_upgrade` actions in
    /// uninstall mode. Not cancellable: undoing a superseded version is
    /// itself not rollback-able.
    fn reverse_for_upgrade(
        &self,
        old: &mut Product,
        data: &InstallData,
        mode: &Mode,
    ) -> Result<(), EngineError> {
        let uninstall_mode = mode.to_uninstall();
        let ctx = ActionContext {
            data,
            platform: &self.platform,
        };

        let mut actions = old.take_actions();
        for action in actions.iter_mut() {
            if !action.remove_on_upgrade() || !action.is_supported(&self.platform) {
                continue;
            }
            if let Err(source) = action.run(&ctx, old, &uninstall_mode, &mut NullProgress) {
                let id = action.id().to_string();
                return Err(EngineError::Action { id, source });
            }
        }
        Ok(())
    }

    /// Reclaims an uninstalled product's directories. A manifest can
    /// carry several products rooted at the same path; only the last
    /// product at a location sweeps its files.
    fn reclaim_product_location(
        &self,
        product: &Product,
        manifest: &Manifest,
        uninstall_dir: &Path,
        ledger: &mut LocationLedger,
        queue: &mut RemovalQueue,
    ) {
        let remove_dirs = product
            .property(PROPERTY_REMOVE_DIRS)
            .map(|value| value != "false")
            .unwrap_or(true);
        if !remove_dirs {
            return;
        }
        if manifest
            .products()
            .iter()
            .any(|remaining| remaining.location() == product.location())
        {
            // Another product still shares this location: give back this
            // product's references but leave the files alone.
            debug!(
                "keeping {} for remaining products",
                product.location().display()
            );
            ledger.release_references(product.location(), queue);
            return;
        }

        let exclude = uninstall_dir
            .starts_with(product.location())
            .then(|| uninstall_dir.to_path_buf());
        let leftovers =
            ledger.release_product_location(product.location(), exclude.as_deref(), queue);
        if !leftovers.is_empty() {
            warn!(
                "{} paths under {} deferred to the cleanup pass",
                leftovers.len(),
                product.location().display()
            );
        }
    }

    /// Copies the uninstaller bundle next to the manifest. Failures here
    /// are logged, never fatal: the installation itself already worked.
    fn bootstrap_uninstaller(&self, description: &InstallDescription, layout: &InstallLayout) {
        if description.uninstall_files.is_empty() {
            return;
        }

        let uninstall_dir = layout.uninstall_dir();
        // Replace any stale uninstaller so the bundle matches this
        // installer's version.
        if uninstall_dir.exists() {
            if let Err(err) = fs::remove_dir_all(&uninstall_dir) {
                warn!(
                    "failed to remove stale uninstaller {}: {err}",
                    uninstall_dir.display()
                );
                return;
            }
        }
        if layout.manifest_path().exists() {
            return;
        }

        let home = self.installer_home();
        for entry in &description.uninstall_files {
            let (source, destination) = match entry.split_once(':') {
                Some((source, destination)) => (source, destination),
                None => (entry.as_str(), entry.as_str()),
            };
            let source_path = home.join(source);
            if !source_path.exists() {
                warn!("uninstaller file missing: {}", source_path.display());
                continue;
            }
            if let Err(err) = copy_recursive(&source_path, &uninstall_dir.join(destination)) {
                warn!("failed to copy uninstaller file {source}: {err}");
            }
        }
    }

    fn installer_home(&self) -> PathBuf {
        if let Some(home) = &self.installer_home {
            return home.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Schedules the created parent directories recorded in the manifest for
/// empty-only removal, walking up from the install root. Stops as soon
/// as a parent's name no longer matches the record (the installation was
/// moved).
fn schedule_created_parents(manifest: &Manifest, root: &Path, queue: &mut RemovalQueue) {
    let segments = manifest.created_dirs();
    if segments.len() < 2 {
        return;
    }

    let mut current = root.parent().map(Path::to_path_buf);
    for segment in segments[..segments.len() - 1].iter().rev() {
        let Some(path) = current else {
            break;
        };
        if path.file_name().and_then(|name| name.to_str()) != Some(segment.as_str()) {
            break;
        }
        queue.push(&path, RemovalMode::EmptyOnly);
        current = path.parent().map(Path::to_path_buf);
    }
}
