use std::collections::BTreeMap;

use tracing::info;

use instill_core::{
    Action, ActionContext, ActionError, ActionRegistry, InstallData, InstallUnit, Mode, Module,
    Phase, Product, ProgressMonitor, UnitSpec,
};
use instill_planner::{order_plan, PlanOperation, PlanUnit};

pub const PROVISION_ACTION_ID: &str = "provision.units";

const STATE_UNITS: &str = "units";

/// Applies the product's unit change-set through the external
/// provisioning agent and records the installed units on the product so
/// uninstall can reconcile them later. Units are linearized by the
/// planner so a unit never precedes one of its requirements.
#[derive(Default)]
pub struct ProvisionUnitsAction {
    units: Vec<InstallUnit>,
}

impl ProvisionUnitsAction {
    pub fn from_specs(specs: &[UnitSpec]) -> Self {
        let operations = specs
            .iter()
            .map(|spec| {
                PlanOperation::Add(PlanUnit::with_requirements(
                    InstallUnit::new(spec.id.clone(), spec.version.clone()),
                    spec.requires.clone(),
                ))
            })
            .collect();
        let ordered = order_plan(operations, |requirement, candidate| {
            candidate.unit.id == requirement
        });

        Self {
            units: ordered
                .into_iter()
                .map(|operation| operation.plan_unit().unit.clone())
                .collect(),
        }
    }

    pub fn units(&self) -> &[InstallUnit] {
        &self.units
    }
}

impl Action for ProvisionUnitsAction {
    fn id(&self) -> &str {
        PROVISION_ACTION_ID
    }

    fn phase(&self) -> Phase {
        Phase::Install
    }

    fn run(
        &mut self,
        _ctx: &ActionContext<'_>,
        product: &mut Product,
        mode: &Mode,
        monitor: &mut dyn ProgressMonitor,
    ) -> Result<(), ActionError> {
        if mode.is_install() {
            for unit in &self.units {
                info!("provisioning unit {}", unit.qualified());
                monitor.set_task(&unit.qualified());
                product.add_unit(unit.clone());
            }
        } else {
            for unit in self.units.iter().rev() {
                info!("unprovisioning unit {}", unit.qualified());
                monitor.set_task(&unit.qualified());
            }
        }
        Ok(())
    }

    fn save_state(&self) -> BTreeMap<String, String> {
        let mut state = BTreeMap::new();
        let qualified: Vec<String> = self.units.iter().map(InstallUnit::qualified).collect();
        state.insert(STATE_UNITS.to_string(), qualified.join(" "));
        state
    }

    fn restore_state(&mut self, state: &BTreeMap<String, String>) -> Result<(), ActionError> {
        self.units.clear();
        let Some(entries) = state.get(STATE_UNITS) else {
            return Ok(());
        };
        for entry in entries.split_whitespace() {
            let unit = InstallUnit::parse(entry)
                .map_err(|err| ActionError::new(format!("invalid unit state entry: {err}")))?;
            self.units.push(unit);
        }
        Ok(())
    }
}

/// Registers the engine's built-in actions so manifest loading can
/// re-instantiate them by id.
pub fn register_builtin_actions(registry: &mut ActionRegistry) {
    registry.register(PROVISION_ACTION_ID, || {
        Box::new(ProvisionUnitsAction::default())
    });
}

/// The module every installation carries: contributes the provisioning
/// action built from the install description's unit list.
pub struct StandardModule {
    units: Vec<UnitSpec>,
}

impl StandardModule {
    pub fn new(units: Vec<UnitSpec>) -> Self {
        Self { units }
    }
}

impl Module for StandardModule {
    fn id(&self) -> &str {
        "standard"
    }

    fn install_actions(&self, _data: &InstallData, _mode: &Mode) -> Vec<Box<dyn Action>> {
        vec![Box::new(ProvisionUnitsAction::from_specs(&self.units))]
    }
}
