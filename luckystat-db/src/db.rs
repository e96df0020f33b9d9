use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

use crate::models::{AutoState, StatisticsTable, StatsSettings};
use crate::sample::{sample_settings, sample_table};

pub const STATS_KEY: &str = "luckystat_data_v1";
pub const AUTO_KEY: &str = "luckystat_auto_sets_v1";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS records (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
";

pub fn db_path() -> std::path::PathBuf {
    let mut path = std::env::current_dir().unwrap_or_default();
    path.push("data");
    path.push("luckystat.db");
    path
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Impossible de créer le répertoire {:?}", parent))?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Impossible d'ouvrir la base {:?}", path))?;
    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)
        .context("Échec de la migration")?;
    Ok(())
}

/// Stockage clé-valeur durable ; chaque écriture remplace l'enregistrement entier.
pub trait KeyValueStore {
    fn get_record(&self, key: &str) -> Result<Option<String>>;
    fn put_record(&self, key: &str, value: &str) -> Result<()>;
    fn delete_record(&self, key: &str) -> Result<bool>;
}

impl KeyValueStore for Connection {
    fn get_record(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .query_row("SELECT value FROM records WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .with_context(|| format!("Échec de la lecture de '{}'", key))?;
        Ok(value)
    }

    fn put_record(&self, key: &str, value: &str) -> Result<()> {
        self.execute(
            "INSERT OR REPLACE INTO records (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, chrono::Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("Échec de l'écriture de '{}'", key))?;
        Ok(())
    }

    fn delete_record(&self, key: &str) -> Result<bool> {
        let changed = self
            .execute("DELETE FROM records WHERE key = ?1", [key])
            .with_context(|| format!("Échec de la suppression de '{}'", key))?;
        Ok(changed > 0)
    }
}

pub struct LoadedSettings {
    pub settings: StatsSettings,
    pub table: StatisticsTable,
    pub is_sample: bool,
}

fn sample_loaded() -> LoadedSettings {
    LoadedSettings {
        settings: sample_settings(),
        table: sample_table(),
        is_sample: true,
    }
}

/// Charge les statistiques enregistrées. Un enregistrement absent, illisible ou
/// incomplet retombe sur le jeu de démonstration au lieu d'échouer.
pub fn load_settings<S: KeyValueStore + ?Sized>(store: &S) -> Result<LoadedSettings> {
    let Some(raw) = store.get_record(STATS_KEY)? else {
        return Ok(sample_loaded());
    };

    let settings: StatsSettings = match serde_json::from_str(&raw) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Statistiques enregistrées illisibles, données de démonstration utilisées: {e}");
            return Ok(sample_loaded());
        }
    };

    match settings.table() {
        Ok(table) => Ok(LoadedSettings {
            settings,
            table,
            is_sample: false,
        }),
        Err(e) => {
            log::warn!("Statistiques enregistrées incomplètes, données de démonstration utilisées: {e}");
            Ok(sample_loaded())
        }
    }
}

pub fn save_settings<S: KeyValueStore + ?Sized>(store: &S, settings: &StatsSettings) -> Result<()> {
    let json = serde_json::to_string(settings).context("Échec de la sérialisation des statistiques")?;
    store.put_record(STATS_KEY, &json)?;
    log::info!("Statistiques enregistrées ({} numéros)", settings.total_stats.len());
    Ok(())
}

pub fn load_auto_state_raw<S: KeyValueStore + ?Sized>(store: &S) -> Result<Option<String>> {
    store.get_record(AUTO_KEY)
}

pub fn save_auto_state<S: KeyValueStore + ?Sized>(store: &S, state: &AutoState) -> Result<()> {
    let json = serde_json::to_string(state).context("Échec de la sérialisation du panneau automatique")?;
    store.put_record(AUTO_KEY, &json)
}
