//! Seeder registry.
//!
//! Validates admin input and stores seeders. Registry changes never start a
//! rebuild; the next build simply picks them up.

use tracing::info;
use wot_db::queries::seeders;
use wot_db::DbError;
use wot_types::{unix_now, Pubkey, Seeder, SeederUpdate};

use crate::Db;

/// Registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("seeder {0} is already registered")]
    DuplicateSeeder(Pubkey),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("seeder {0} not found")]
    NotFound(Pubkey),

    #[error(transparent)]
    Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Curated list of seeder keys.
#[derive(Clone)]
pub struct SeederRegistry {
    db: Db,
}

impl SeederRegistry {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// All seeders, or those of one region.
    pub async fn list(&self, region: Option<&str>) -> Result<Vec<Seeder>> {
        let region = region.map(str::trim).filter(|r| !r.is_empty());
        let db = self.db.lock().await;
        Ok(seeders::list(&db, region)?)
    }

    /// Register a new seeder.
    pub async fn create(
        &self,
        pubkey: &str,
        region: &str,
        label: Option<&str>,
        added_by: &str,
    ) -> Result<Seeder> {
        let pubkey = parse_pubkey("pubkey", pubkey)?;
        let added_by = parse_pubkey("addedBy", added_by)?;
        let region = parse_region(region)?;
        let now = unix_now();
        let seeder = Seeder {
            pubkey,
            region,
            label: normalize_label(label),
            added_by,
            created_at: now,
            updated_at: now,
        };

        let db = self.db.lock().await;
        seeders::insert(&db, &seeder).map_err(|e| match e {
            DbError::Constraint(_) => RegistryError::DuplicateSeeder(seeder.pubkey.clone()),
            other => RegistryError::Db(other),
        })?;
        info!(pubkey = %seeder.pubkey, region = %seeder.region, "seeder registered");
        Ok(seeder)
    }

    /// Change region and/or label. An empty label clears it.
    pub async fn update(&self, pubkey: &str, update: SeederUpdate) -> Result<Seeder> {
        let pubkey = parse_pubkey("pubkey", pubkey)?;
        let region = update.region.as_deref().map(parse_region).transpose()?;

        let db = self.db.lock().await;
        let current = seeders::get(&db, &pubkey).map_err(|e| not_found(e, &pubkey))?;
        let region = region.unwrap_or(current.region);
        let label = match update.label.as_deref() {
            Some(label) => normalize_label(Some(label)),
            None => current.label,
        };

        seeders::update(&db, &pubkey, &region, label.as_deref(), unix_now())
            .map_err(|e| not_found(e, &pubkey))?;
        info!(%pubkey, %region, "seeder updated");
        Ok(seeders::get(&db, &pubkey)?)
    }

    /// Remove a seeder.
    pub async fn delete(&self, pubkey: &str) -> Result<()> {
        let pubkey = parse_pubkey("pubkey", pubkey)?;
        let db = self.db.lock().await;
        seeders::delete(&db, &pubkey).map_err(|e| not_found(e, &pubkey))?;
        info!(%pubkey, "seeder removed");
        Ok(())
    }

    /// Seeder counts per region.
    pub async fn regions(&self) -> Result<Vec<(String, u64)>> {
        let db = self.db.lock().await;
        Ok(seeders::regions(&db)?)
    }
}

fn parse_pubkey(field: &str, value: &str) -> Result<Pubkey> {
    Pubkey::parse(value).map_err(|e| RegistryError::InvalidInput(format!("{field}: {e}")))
}

fn parse_region(region: &str) -> Result<String> {
    let region = region.trim();
    if region.is_empty() {
        return Err(RegistryError::InvalidInput("region must not be empty".into()));
    }
    Ok(region.to_string())
}

fn normalize_label(label: Option<&str>) -> Option<String> {
    label
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

fn not_found(err: DbError, pubkey: &Pubkey) -> RegistryError {
    match err {
        DbError::NotFound(_) => RegistryError::NotFound(pubkey.clone()),
        other => RegistryError::Db(other),
    }
}
