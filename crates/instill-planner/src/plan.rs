use instill_core::InstallUnit;

/// A unit appearing in a provisioning change-set, with the requirement
/// expressions declared against the rest of the set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanUnit {
    pub unit: InstallUnit,
    pub requirements: Vec<String>,
}

impl PlanUnit {
    pub fn new(unit: InstallUnit) -> Self {
        Self {
            unit,
            requirements: Vec::new(),
        }
    }

    pub fn with_requirements(unit: InstallUnit, requirements: Vec<String>) -> Self {
        Self { unit, requirements }
    }
}

/// One operation in a pre-computed change-set. Updates are ordered along
/// with additions; removals pass through unordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOperation {
    Add(PlanUnit),
    Update(PlanUnit),
    Remove(PlanUnit),
}

impl PlanOperation {
    pub fn plan_unit(&self) -> &PlanUnit {
        match self {
            Self::Add(unit) | Self::Update(unit) | Self::Remove(unit) => unit,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, Self::Remove(_))
    }
}
