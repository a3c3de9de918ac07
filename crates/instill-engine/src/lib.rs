mod actions;
mod cleanup;
mod engine;
mod fs_utils;
mod layout;
mod ledger;
mod manifest;

pub use actions::{register_builtin_actions, ProvisionUnitsAction, StandardModule, PROVISION_ACTION_ID};
pub use cleanup::{PendingRemoval, RemovalMode, RemovalQueue};
pub use engine::{Engine, InstallOutcome, OperationState, OperationStatus, ProductSummary, UninstallOutcome};
pub use layout::{default_data_dir, InstallLayout};
pub use ledger::{InstallLocation, LocationLedger};
pub use manifest::{Manifest, MANIFEST_FORMAT_VERSION};
