mod order;
mod plan;

pub use order::order_plan;
pub use plan::{PlanOperation, PlanUnit};

#[cfg(test)]
mod tests;
