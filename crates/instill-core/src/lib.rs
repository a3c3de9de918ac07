mod action;
mod description;
mod error;
mod mode;
mod platform;
mod product;

pub use action::{
    Action, ActionContext, ActionRegistry, InstallData, Module, NullProgress, Phase,
    ProgressMonitor, DEFAULT_PROGRESS_WEIGHT,
};
pub use description::{InstallDescription, ProductRange, UninstallPolicy, UnitSpec};
pub use error::{ActionError, EngineError, ManifestError};
pub use mode::Mode;
pub use platform::Platform;
pub use product::{
    InstallUnit, Product, ProductStatus, PROPERTY_REMOVE_DIRS, PROPERTY_SHOW_UNINSTALL,
};

#[cfg(test)]
mod tests;
