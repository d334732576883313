use serde::{Deserialize, Serialize, de::IgnoredAny};

pub const DEFAULT_INITIAL_CONTRIBUTION: f64 = 10_000.0;
pub const DEFAULT_MONTHLY_CONTRIBUTION: f64 = 1_000.0;
pub const DEFAULT_MONTHLY_RATE_PERCENT: f64 = 0.8;
pub const DEFAULT_GOAL: f64 = 1_000_000.0;
pub const DEFAULT_MAX_MONTHS: u32 = 10_000;

/// Normalized projection parameters. Every field is finite once built through
/// [`ProjectionParams::normalize`] or [`ProjectionInput::default`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionInput {
    pub initial_contribution: f64,
    pub monthly_contribution: f64,
    /// Percentage, so `0.8` means 0.8% per month.
    pub monthly_rate_percent: f64,
    pub goal: f64,
    pub max_months: u32,
}

impl Default for ProjectionInput {
    fn default() -> Self {
        Self {
            initial_contribution: DEFAULT_INITIAL_CONTRIBUTION,
            monthly_contribution: DEFAULT_MONTHLY_CONTRIBUTION,
            monthly_rate_percent: DEFAULT_MONTHLY_RATE_PERCENT,
            goal: DEFAULT_GOAL,
            max_months: DEFAULT_MAX_MONTHS,
        }
    }
}

impl ProjectionInput {
    pub fn rate_decimal(&self) -> f64 {
        self.monthly_rate_percent / 100.0
    }
}

/// A caller-supplied scalar that may arrive as a JSON number or as text.
/// Values of any other shape are kept only so they can fall back to defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

impl LooseNumber {
    /// The finite decimal this value denotes, if any.
    pub fn value(&self) -> Option<f64> {
        let parsed = match self {
            LooseNumber::Number(v) => *v,
            LooseNumber::Text(s) => s.trim().parse::<f64>().ok()?,
            LooseNumber::Other(_) => return None,
        };
        parsed.is_finite().then_some(parsed)
    }
}

impl From<f64> for LooseNumber {
    fn from(value: f64) -> Self {
        LooseNumber::Number(value)
    }
}

impl From<&str> for LooseNumber {
    fn from(value: &str) -> Self {
        LooseNumber::Text(value.to_string())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectionParams {
    pub initial_contribution: Option<LooseNumber>,
    pub monthly_contribution: Option<LooseNumber>,
    #[serde(alias = "monthlyRate")]
    pub monthly_rate_percent: Option<LooseNumber>,
}

impl ProjectionParams {
    /// Resolves absent or unparseable fields to their defaults. The goal and
    /// iteration cap are deployment settings, never caller input.
    pub fn normalize(&self, goal: f64, max_months: u32) -> ProjectionInput {
        fn or_default(field: &Option<LooseNumber>, default: f64) -> f64 {
            field.as_ref().and_then(LooseNumber::value).unwrap_or(default)
        }

        ProjectionInput {
            initial_contribution: or_default(
                &self.initial_contribution,
                DEFAULT_INITIAL_CONTRIBUTION,
            ),
            monthly_contribution: or_default(
                &self.monthly_contribution,
                DEFAULT_MONTHLY_CONTRIBUTION,
            ),
            monthly_rate_percent: or_default(
                &self.monthly_rate_percent,
                DEFAULT_MONTHLY_RATE_PERCENT,
            ),
            goal,
            max_months,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthRecord {
    pub month: u32,
    pub year: u32,
    pub monthly_contribution: f64,
    /// Running total as of the start of the month.
    pub accumulated_contributions: f64,
    pub monthly_interest: f64,
    /// Running total as of the start of the month.
    pub accumulated_interest: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionSummary {
    pub months_to_reach_goal: usize,
    pub final_amount: f64,
    pub total_contributed: f64,
    pub total_interest: f64,
    pub goal_reached: bool,
}
