use std::collections::BTreeMap;

use crate::{ActionError, Mode, Platform, Product};

/// Progress weight used by actions that do not declare their own.
pub const DEFAULT_PROGRESS_WEIGHT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    PreInstall,
    Install,
    PostInstall,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreInstall => "pre-install",
            Self::Install => "install",
            Self::PostInstall => "post-install",
        }
    }
}

/// Property bag collected by the front-end before the engine runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallData {
    values: BTreeMap<String, String>,
}

impl InstallData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Context handed to every action run. Carries the front-end property bag
/// and the platform the engine resolved at startup.
pub struct ActionContext<'a> {
    pub data: &'a InstallData,
    pub platform: &'a Platform,
}

/// One idempotent install/uninstall step.
///
/// Actions are stateless templates instantiated per product; whatever an
/// action needs to reverse itself later goes through `save_state` and is
/// restored with `restore_state` when the manifest is loaded again.
pub trait Action {
    fn id(&self) -> &str;

    fn phase(&self) -> Phase;

    fn progress_weight(&self) -> u32 {
        DEFAULT_PROGRESS_WEIGHT
    }

    fn is_supported(&self, _platform: &Platform) -> bool {
        true
    }

    /// Whether this action is undone when the product is replaced by a
    /// newer version, before the new action set runs.
    fn remove_on_upgrade(&self) -> bool {
        true
    }

    fn run(
        &mut self,
        ctx: &ActionContext<'_>,
        product: &mut Product,
        mode: &Mode,
        monitor: &mut dyn ProgressMonitor,
    ) -> Result<(), ActionError>;

    fn save_state(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    fn restore_state(&mut self, _state: &BTreeMap<String, String>) -> Result<(), ActionError> {
        Ok(())
    }
}

/// Maps registered action identifiers to factories. Injected into the
/// engine at construction so tests can run with different registries.
#[derive(Default)]
pub struct ActionRegistry {
    factories: BTreeMap<String, Box<dyn Fn() -> Box<dyn Action> + Send + Sync>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Action> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Box::new(factory));
    }

    pub fn create(&self, id: &str) -> Option<Box<dyn Action>> {
        self.factories.get(id).map(|factory| factory())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }
}

/// Contributes candidate actions for one install or uninstall operation.
/// The returned list is unsorted; the engine applies phase ordering.
pub trait Module {
    fn id(&self) -> &str;

    fn install_actions(&self, data: &InstallData, mode: &Mode) -> Vec<Box<dyn Action>>;
}

/// Progress and cancellation surface supplied by the caller.
///
/// Cancellation is cooperative: the engine polls `is_cancelled` after each
/// action completes, never preemptively mid-action.
pub trait ProgressMonitor {
    fn begin_task(&mut self, _name: &str, _total: u32) {}

    fn set_task(&mut self, _name: &str) {}

    fn worked(&mut self, weight: u32);

    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Monitor that discards progress and never cancels. Used for the
/// upgrade-replacement and rollback passes, which are not cancellable.
pub struct NullProgress;

impl ProgressMonitor for NullProgress {
    fn worked(&mut self, _weight: u32) {}
}
