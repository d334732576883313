mod model;
mod schema;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::BigInt;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use self::model::{CalculationDB, UserDB};
use self::schema::{calculations, users};
use super::models::email_key;
use super::{
    CalculationId, CalculationStore, NewCalculation, OwnerId, SavedCalculation, StoreError, User,
    UserStore,
};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Durable store over a single SQLite file. Queries run on the blocking
/// thread pool with a pooled connection each.
pub struct SqliteStore {
    pool: Arc<DbPool>,
}

impl SqliteStore {
    /// Opens the database at `database_url`, creating the file and its parent
    /// directory when missing, and applies pending migrations.
    pub fn open(database_url: &str) -> Result<Self, StoreError> {
        if let Some(dir) = Path::new(database_url)
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
        {
            std::fs::create_dir_all(dir)
                .map_err(|e| storage(format!("cannot create {}: {e}", dir.display())))?;
        }

        {
            let mut conn = SqliteConnection::establish(database_url).map_err(storage)?;
            conn.batch_execute("PRAGMA journal_mode = WAL;")?;
        }

        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(8)
            .min_idle(Some(1))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionCustomizer))
            .build(manager)
            .map_err(storage)?;

        let store = Self {
            pool: Arc::new(pool),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        let mut conn = self.pool.get().map_err(storage)?;
        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| storage(format!("migration failed: {e}")))?;

        if applied.is_empty() {
            tracing::info!("database schema up to date");
        } else {
            for version in &applied {
                tracing::info!(%version, "applied database migration");
            }
        }
        Ok(())
    }

    async fn run<T, F>(&self, job: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(storage)?;
            job(&mut conn)
        })
        .await
        .map_err(|e| storage(format!("database task failed: {e}")))?
    }
}

fn storage(err: impl ToString) -> StoreError {
    StoreError::Storage(err.to_string())
}

impl From<DieselError> for StoreError {
    fn from(err: DieselError) -> Self {
        storage(err)
    }
}

#[derive(Debug)]
struct ConnectionCustomizer;

impl r2d2::CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), r2d2::Error> {
        conn.batch_execute(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 30000; PRAGMA synchronous = NORMAL;",
        )
        .map_err(r2d2::Error::QueryError)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, email: &str, password_hash: String) -> Result<User, StoreError> {
        let user = User {
            id: OwnerId::new(),
            email: email_key(email),
            password_hash,
            created_at: Utc::now(),
        };
        let row = UserDB::from(&user);

        self.run(move |conn| {
            diesel::insert_into(users::table)
                .values(&row)
                .execute(conn)
                .map_err(|e| match e {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        StoreError::Conflict("this email is already registered".to_string())
                    }
                    other => other.into(),
                })?;
            Ok(())
        })
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let key = email_key(email);
        self.run(move |conn| {
            users::table
                .filter(users::email.eq(key))
                .select(UserDB::as_select())
                .first(conn)
                .optional()?
                .map(User::try_from)
                .transpose()
        })
        .await
    }
}

#[async_trait]
impl CalculationStore for SqliteStore {
    async fn create(
        &self,
        owner: OwnerId,
        fields: &NewCalculation,
    ) -> Result<SavedCalculation, StoreError> {
        let valid = fields.validate()?;
        let saved = SavedCalculation::new(owner, valid, Utc::now());
        let row = CalculationDB::from(&saved);

        self.run(move |conn| {
            diesel::insert_into(calculations::table)
                .values(&row)
                .execute(conn)?;
            Ok(())
        })
        .await?;
        Ok(saved)
    }

    async fn list_by_owner(&self, owner: OwnerId) -> Result<Vec<SavedCalculation>, StoreError> {
        let owner_key = owner.to_string();
        self.run(move |conn| {
            calculations::table
                .filter(calculations::owner_id.eq(owner_key))
                // rowid breaks created_at ties in reverse insertion order
                .order((
                    calculations::created_at.desc(),
                    sql::<BigInt>("rowid").desc(),
                ))
                .select(CalculationDB::as_select())
                .load(conn)?
                .into_iter()
                .map(SavedCalculation::try_from)
                .collect()
        })
        .await
    }

    async fn delete_by_id(&self, id: CalculationId, owner: OwnerId) -> Result<(), StoreError> {
        let key = id.to_string();
        let owner_key = owner.to_string();
        self.run(move |conn| {
            conn.immediate_transaction::<_, StoreError, _>(|conn| {
                let stored_owner: Option<String> = calculations::table
                    .find(key.as_str())
                    .select(calculations::owner_id)
                    .first(conn)
                    .optional()?;

                match stored_owner {
                    None => Err(StoreError::NotFound(id)),
                    Some(stored) if stored != owner_key => Err(StoreError::Permission(id)),
                    Some(_) => {
                        diesel::delete(calculations::table.find(key.as_str())).execute(conn)?;
                        Ok(())
                    }
                }
            })
        })
        .await
    }
}
