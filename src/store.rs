//! store.rs
//!
//! The `DataStore` capability and its SQLite implementation: transactional
//! inserts and updates across `asset` and `team_member`, the joined search,
//! and translation of constraint failures into `AssetError`s.

use crate::asset::CryptoAsset;
use crate::errors::{AppError, AssetError};
use crate::statement::{
    select_statement, update_statement, SearchFilter, SqlArg, ASSET_EXISTS, DELETE_TEAM,
    INSERT_ASSET, INSERT_TEAM_MEMBER,
};
use async_trait::async_trait;
use sqlx::error::ErrorKind;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, Sqlite, Transaction};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Record storage as seen by the request layer.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Store a normalized record and its team; returns the new id.
    async fn insert(&self, asset: &CryptoAsset) -> Result<String, AssetError>;

    /// All records matching `filter`, one per id, each with its full team.
    async fn select(&self, filter: &SearchFilter) -> Result<Vec<CryptoAsset>, AssetError>;

    /// Apply the fields present on `asset` to record `id`. A present `team`
    /// replaces the stored team wholesale.
    async fn update(&self, id: i64, asset: &CryptoAsset) -> Result<(), AssetError>;

    /// Release the connection pool. Must not race in-flight operations.
    async fn close(&self);
}

/// `DataStore` backed by a SQLite connection pool.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if missing) the database at `database_url` and apply
    /// pending migrations. Foreign keys are enforced on every connection.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Connections are never recycled: an in-memory database lives and
        // dies with its connection.
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn insert(&self, asset: &CryptoAsset) -> Result<String, AssetError> {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(INSERT_ASSET)
            .bind(asset.name.as_deref())
            .bind(asset.symbol.as_deref())
            .bind(asset.description.as_deref())
            .bind(asset.ico_amount)
            .bind(asset.block_reward)
            .bind(asset.funding_status.as_deref())
            .bind(asset.founded_date.as_deref())
            .bind(asset.coin_type.as_deref())
            .bind(asset.website.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(|e| translate_write_error(e, asset))?;

        let id = result.last_insert_rowid();
        insert_team(&mut tx, id, asset.team.as_deref().unwrap_or_default()).await?;

        tx.commit().await?;
        Ok(id.to_string())
    }

    async fn select(&self, filter: &SearchFilter) -> Result<Vec<CryptoAsset>, AssetError> {
        let statement = select_statement(filter);
        let rows = bind_args(&statement.sql, &statement.args)
            .fetch_all(&self.pool)
            .await?;

        let mut assets: BTreeMap<i64, CryptoAsset> = BTreeMap::new();
        for row in &rows {
            let (id, base, member) = JoinedRow::from_row(row)?.into_parts();
            let asset = assets.entry(id).or_insert_with(|| base);
            if let Some(member) = member {
                asset.team.get_or_insert_with(Vec::new).push(member);
            }
        }

        Ok(assets.into_values().collect())
    }

    async fn update(&self, id: i64, asset: &CryptoAsset) -> Result<(), AssetError> {
        let statement = update_statement(id, asset);
        if statement.is_none() && asset.team.is_none() {
            return Err(AssetError::EmptyUpdate);
        }

        let mut tx = self.pool.begin().await?;

        if let Some(statement) = &statement {
            let result = bind_args(&statement.sql, &statement.args)
                .execute(&mut *tx)
                .await
                .map_err(|e| translate_write_error(e, asset))?;

            // SQLite reports a no-match UPDATE as success with zero rows.
            if result.rows_affected() != 1 {
                return Err(AssetError::UnknownIdentifier(id));
            }
        }

        if let Some(team) = &asset.team {
            // An empty replacement inserts nothing, so the foreign key can't
            // catch an unknown id.
            if statement.is_none() && team.is_empty() && !asset_exists(&mut tx, id).await? {
                return Err(AssetError::UnknownIdentifier(id));
            }

            sqlx::query(DELETE_TEAM).bind(id).execute(&mut *tx).await?;
            insert_team(&mut tx, id, team).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// One row of the asset/team join.
#[derive(FromRow)]
#[sqlx(rename_all = "camelCase")]
struct JoinedRow {
    id: i64,
    name: String,
    symbol: String,
    description: String,
    ico_amount: f64,
    block_reward: f64,
    funding_status: String,
    founded_date: String,
    coin_type: String,
    website: String,
    team_member: Option<String>,
}

impl JoinedRow {
    fn into_parts(self) -> (i64, CryptoAsset, Option<String>) {
        let asset = CryptoAsset {
            id: Some(self.id.to_string()),
            name: Some(self.name),
            symbol: Some(self.symbol),
            description: Some(self.description),
            team: Some(Vec::new()),
            ico_amount: Some(self.ico_amount),
            block_reward: Some(self.block_reward),
            funding_status: Some(self.funding_status),
            founded_date: Some(self.founded_date),
            coin_type: Some(self.coin_type),
            website: Some(self.website),
        };
        (self.id, asset, self.team_member)
    }
}

fn bind_args<'q>(sql: &'q str, args: &'q [SqlArg]) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    args.iter().fold(sqlx::query(sql), |query, arg| match arg {
        SqlArg::Text(value) => query.bind(value.as_str()),
        SqlArg::Real(value) => query.bind(*value),
        SqlArg::Integer(value) => query.bind(*value),
    })
}

async fn insert_team(
    tx: &mut Transaction<'_, Sqlite>,
    id: i64,
    team: &[String],
) -> Result<(), AssetError> {
    for member in team {
        sqlx::query(INSERT_TEAM_MEMBER)
            .bind(id)
            .bind(member.as_str())
            .execute(&mut **tx)
            .await
            .map_err(|e| match constraint_kind(&e) {
                Some(ErrorKind::ForeignKeyViolation) => AssetError::UnknownIdentifier(id),
                _ => AssetError::Db(e),
            })?;
    }
    Ok(())
}

async fn asset_exists(tx: &mut Transaction<'_, Sqlite>, id: i64) -> Result<bool, AssetError> {
    let (exists,): (i64,) = sqlx::query_as(ASSET_EXISTS)
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(exists != 0)
}

fn constraint_kind(err: &sqlx::Error) -> Option<ErrorKind> {
    match err {
        sqlx::Error::Database(db_err) => Some(db_err.kind()),
        _ => None,
    }
}

/// Map NOT NULL and UNIQUE failures of an `asset` write to domain errors.
/// Everything else passes through untouched.
fn translate_write_error(err: sqlx::Error, asset: &CryptoAsset) -> AssetError {
    match constraint_kind(&err) {
        Some(ErrorKind::NotNullViolation) => {
            let field = match &err {
                sqlx::Error::Database(db_err) => null_field(db_err.message()),
                _ => String::new(),
            };
            AssetError::NullConstraint(field)
        }
        // `symbol` is the only unique column a write can collide on.
        Some(ErrorKind::UniqueViolation) => {
            AssetError::DuplicateSymbol(asset.symbol.clone().unwrap_or_default())
        }
        _ => AssetError::Db(err),
    }
}

/// `NOT NULL constraint failed: asset.name` → `name`.
fn null_field(message: &str) -> String {
    message
        .rsplit_once('.')
        .map_or(message, |(_, field)| field)
        .trim()
        .to_string()
}
