use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StoreError;
use crate::core::ProjectionSummary;

pub const UNNAMED_CALCULATION: &str = "Untitled";

pub type CalculationId = Uuid;

/// Verified identity of the caller, produced only by the auth layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub Uuid);

impl OwnerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OwnerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Emails are matched case-insensitively, ignoring surrounding whitespace.
pub(super) fn email_key(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: OwnerId,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCalculation {
    pub calculation_name: Option<String>,
    pub initial_contribution: Option<f64>,
    pub monthly_contribution: Option<f64>,
    pub monthly_rate: Option<f64>,
    pub months_to_reach_goal: Option<f64>,
    pub final_amount: Option<f64>,
    pub total_contributed: Option<f64>,
    pub total_interest: Option<f64>,
}

/// Create payload after validation: every figure present and finite.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCalculation {
    pub name: String,
    pub initial_contribution: f64,
    pub monthly_contribution: f64,
    pub monthly_rate: f64,
    pub months_to_reach_goal: u32,
    pub final_amount: f64,
    pub total_contributed: f64,
    pub total_interest: f64,
}

impl NewCalculation {
    /// Builds a payload from a finished projection and the rate it ran with.
    pub fn from_summary(
        name: Option<String>,
        initial_contribution: f64,
        monthly_contribution: f64,
        monthly_rate: f64,
        summary: &ProjectionSummary,
    ) -> Self {
        Self {
            calculation_name: name,
            initial_contribution: Some(initial_contribution),
            monthly_contribution: Some(monthly_contribution),
            monthly_rate: Some(monthly_rate),
            months_to_reach_goal: Some(summary.months_to_reach_goal as f64),
            final_amount: Some(summary.final_amount),
            total_contributed: Some(summary.total_contributed),
            total_interest: Some(summary.total_interest),
        }
    }

    /// Checks fields in declaration order and reports the first problem.
    pub fn validate(&self) -> Result<ValidCalculation, StoreError> {
        let name = self
            .calculation_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(UNNAMED_CALCULATION)
            .to_string();
        let initial_contribution = required("initial_contribution", self.initial_contribution)?;
        let monthly_contribution = required("monthly_contribution", self.monthly_contribution)?;
        let monthly_rate = required("monthly_rate", self.monthly_rate)?;

        let months = required("months_to_reach_goal", self.months_to_reach_goal)?;
        if months < 0.0 || months.fract() != 0.0 || months > f64::from(u32::MAX) {
            return Err(StoreError::Validation(
                "months_to_reach_goal must be a non-negative whole number".to_string(),
            ));
        }

        Ok(ValidCalculation {
            name,
            initial_contribution,
            monthly_contribution,
            monthly_rate,
            months_to_reach_goal: months as u32,
            final_amount: required("final_amount", self.final_amount)?,
            total_contributed: required("total_contributed", self.total_contributed)?,
            total_interest: required("total_interest", self.total_interest)?,
        })
    }
}

fn required(field: &str, value: Option<f64>) -> Result<f64, StoreError> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(StoreError::Validation(format!("{field} must be a finite number"))),
        None => Err(StoreError::Validation(format!("{field} is required"))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedCalculation {
    pub id: CalculationId,
    pub owner_id: OwnerId,
    pub calculation_name: String,
    pub initial_contribution: f64,
    pub monthly_contribution: f64,
    pub monthly_rate: f64,
    pub months_to_reach_goal: u32,
    pub final_amount: f64,
    pub total_contributed: f64,
    pub total_interest: f64,
    pub created_at: DateTime<Utc>,
}

impl SavedCalculation {
    pub fn new(owner_id: OwnerId, fields: ValidCalculation, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id,
            calculation_name: fields.name,
            initial_contribution: fields.initial_contribution,
            monthly_contribution: fields.monthly_contribution,
            monthly_rate: fields.monthly_rate,
            months_to_reach_goal: fields.months_to_reach_goal,
            final_amount: fields.final_amount,
            total_contributed: fields.total_contributed,
            total_interest: fields.total_interest,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> NewCalculation {
        NewCalculation {
            calculation_name: Some("Retirement".to_string()),
            initial_contribution: Some(10_000.0),
            monthly_contribution: Some(1_000.0),
            monthly_rate: Some(0.8),
            months_to_reach_goal: Some(266.0),
            final_amount: Some(1_006_505.84),
            total_contributed: Some(276_000.0),
            total_interest: Some(730_505.84),
        }
    }

    #[test]
    fn validate_accepts_complete_payload() {
        let valid = complete().validate().expect("payload is complete");
        assert_eq!(valid.name, "Retirement");
        assert_eq!(valid.months_to_reach_goal, 266);
    }

    #[test]
    fn validate_names_the_missing_field() {
        let mut payload = complete();
        payload.total_interest = None;

        let err = payload.validate().expect_err("missing field must fail");
        assert!(matches!(err, StoreError::Validation(ref msg) if msg.contains("total_interest")));
    }

    #[test]
    fn validate_reports_first_missing_field_in_declaration_order() {
        let mut payload = complete();
        payload.months_to_reach_goal = None;
        payload.initial_contribution = None;

        let err = payload.validate().expect_err("missing fields must fail");
        assert_eq!(
            err,
            StoreError::Validation("initial_contribution is required".to_string())
        );

        payload.initial_contribution = Some(1.0);
        let err = payload.validate().expect_err("months still missing");
        assert_eq!(
            err,
            StoreError::Validation("months_to_reach_goal is required".to_string())
        );
    }

    #[test]
    fn from_summary_builds_a_valid_payload() {
        let summary = ProjectionSummary {
            months_to_reach_goal: 266,
            final_amount: 1_006_505.84,
            total_contributed: 276_000.0,
            total_interest: 730_505.84,
            goal_reached: true,
        };
        let payload = NewCalculation::from_summary(None, 10_000.0, 1_000.0, 0.8, &summary);

        let valid = payload.validate().expect("complete payload");
        assert_eq!(valid.name, UNNAMED_CALCULATION);
        assert_eq!(valid.months_to_reach_goal, 266);
        assert_eq!(valid.final_amount, 1_006_505.84);
    }

    #[test]
    fn validate_rejects_non_finite_values() {
        let mut payload = complete();
        payload.final_amount = Some(f64::NAN);

        let err = payload.validate().expect_err("NaN must fail");
        assert!(matches!(err, StoreError::Validation(ref msg) if msg.contains("final_amount")));
    }

    #[test]
    fn validate_rejects_fractional_month_count() {
        let mut payload = complete();
        payload.months_to_reach_goal = Some(12.5);

        assert!(payload.validate().is_err());
    }

    #[test]
    fn blank_name_uses_placeholder() {
        let mut payload = complete();
        payload.calculation_name = Some("   ".to_string());
        assert_eq!(payload.validate().expect("valid").name, UNNAMED_CALCULATION);

        payload.calculation_name = None;
        assert_eq!(payload.validate().expect("valid").name, UNNAMED_CALCULATION);
    }

    #[test]
    fn payload_deserializes_snake_case_keys() {
        let payload: NewCalculation = serde_json::from_str(
            r#"{"calculation_name": "Plan", "initial_contribution": 1, "monthly_contribution": 2,
                "monthly_rate": 0.5, "months_to_reach_goal": 3, "final_amount": 4,
                "total_contributed": 5, "total_interest": 6}"#,
        )
        .expect("json should parse");

        let valid = payload.validate().expect("valid");
        assert_eq!(valid.months_to_reach_goal, 3);
        assert_eq!(valid.total_interest, 6.0);
    }
}
