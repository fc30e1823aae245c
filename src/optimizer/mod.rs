pub mod cost_model;
pub mod plan;
pub mod plan_cache;
pub mod planner;
pub mod query;

pub use plan::{JoinAlgorithm, JoinSpec, PlanNode};
pub use plan_cache::PlanCache;
pub use planner::build_plan;
pub use query::{Query, QueryKind};
