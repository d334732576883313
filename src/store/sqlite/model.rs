//! Row types for the SQLite tables and their conversions to store models.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use uuid::Uuid;

use crate::store::{OwnerId, SavedCalculation, StoreError, User};

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = super::schema::users)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserDB {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone)]
#[diesel(table_name = super::schema::calculations)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CalculationDB {
    pub id: String,
    pub owner_id: String,
    pub calculation_name: String,
    pub initial_contribution: f64,
    pub monthly_contribution: f64,
    pub monthly_rate: f64,
    pub months_to_reach_goal: i64,
    pub final_amount: f64,
    pub total_contributed: f64,
    pub total_interest: f64,
    pub created_at: NaiveDateTime,
}

fn parse_uuid(column: &str, raw: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(raw).map_err(|e| StoreError::Storage(format!("corrupt {column} {raw:?}: {e}")))
}

impl From<&User> for UserDB {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            created_at: user.created_at.naive_utc(),
        }
    }
}

impl TryFrom<UserDB> for User {
    type Error = StoreError;

    fn try_from(row: UserDB) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OwnerId(parse_uuid("users.id", &row.id)?),
            email: row.email,
            password_hash: row.password_hash,
            created_at: row.created_at.and_utc(),
        })
    }
}

impl From<&SavedCalculation> for CalculationDB {
    fn from(saved: &SavedCalculation) -> Self {
        Self {
            id: saved.id.to_string(),
            owner_id: saved.owner_id.to_string(),
            calculation_name: saved.calculation_name.clone(),
            initial_contribution: saved.initial_contribution,
            monthly_contribution: saved.monthly_contribution,
            monthly_rate: saved.monthly_rate,
            months_to_reach_goal: i64::from(saved.months_to_reach_goal),
            final_amount: saved.final_amount,
            total_contributed: saved.total_contributed,
            total_interest: saved.total_interest,
            created_at: saved.created_at.naive_utc(),
        }
    }
}

impl TryFrom<CalculationDB> for SavedCalculation {
    type Error = StoreError;

    fn try_from(row: CalculationDB) -> Result<Self, Self::Error> {
        let months_to_reach_goal = u32::try_from(row.months_to_reach_goal).map_err(|_| {
            StoreError::Storage(format!(
                "corrupt calculations.months_to_reach_goal {}",
                row.months_to_reach_goal
            ))
        })?;
        Ok(Self {
            id: parse_uuid("calculations.id", &row.id)?,
            owner_id: OwnerId(parse_uuid("calculations.owner_id", &row.owner_id)?),
            calculation_name: row.calculation_name,
            initial_contribution: row.initial_contribution,
            monthly_contribution: row.monthly_contribution,
            monthly_rate: row.monthly_rate,
            months_to_reach_goal,
            final_amount: row.final_amount,
            total_contributed: row.total_contributed,
            total_interest: row.total_interest,
            created_at: row.created_at.and_utc(),
        })
    }
}
