mod engine;
mod types;

pub use engine::{format_currency, project, summarize};
pub use types::{
    DEFAULT_GOAL, DEFAULT_INITIAL_CONTRIBUTION, DEFAULT_MAX_MONTHS, DEFAULT_MONTHLY_CONTRIBUTION,
    DEFAULT_MONTHLY_RATE_PERCENT, LooseNumber, MonthRecord, ProjectionInput, ProjectionParams,
    ProjectionSummary,
};
