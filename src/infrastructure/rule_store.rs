use crate::domain::models::RepeatRule;
use crate::infrastructure::error::EngineError;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const REPEAT_RULES_KEY: &str = "timeblocker.repeat_rules";

/// Local persistence for recurrence templates. Rules never leave the
/// machine; only their expanded instances go through the block store.
pub trait RepeatRuleRepository: Send + Sync {
    fn load(&self) -> Result<Vec<RepeatRule>, EngineError>;
    fn save_all(&self, rules: &[RepeatRule]) -> Result<(), EngineError>;
}

#[derive(Debug, Clone)]
pub struct SqliteRepeatRuleRepository {
    db_path: PathBuf,
}

impl SqliteRepeatRuleRepository {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, EngineError> {
        Connection::open(&self.db_path).map_err(EngineError::from)
    }
}

impl RepeatRuleRepository for SqliteRepeatRuleRepository {
    fn load(&self) -> Result<Vec<RepeatRule>, EngineError> {
        let connection = self.connect()?;
        let raw: Option<String> = connection
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![REPEAT_RULES_KEY],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw)?)
    }

    fn save_all(&self, rules: &[RepeatRule]) -> Result<(), EngineError> {
        let connection = self.connect()?;
        let serialized = serde_json::to_string(rules)?;
        connection.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![
                REPEAT_RULES_KEY,
                serialized,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryRepeatRuleRepository {
    rules: Mutex<Vec<RepeatRule>>,
}

impl RepeatRuleRepository for InMemoryRepeatRuleRepository {
    fn load(&self) -> Result<Vec<RepeatRule>, EngineError> {
        let rules = self
            .rules
            .lock()
            .map_err(|error| EngineError::Store(format!("rule lock poisoned: {error}")))?;
        Ok(rules.clone())
    }

    fn save_all(&self, rules: &[RepeatRule]) -> Result<(), EngineError> {
        let mut stored = self
            .rules
            .lock()
            .map_err(|error| EngineError::Store(format!("rule lock poisoned: {error}")))?;
        *stored = rules.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{DEFAULT_BLOCK_COLOR, RepeatKind};
    use crate::infrastructure::storage::initialize_database;

    fn sample_rules() -> Vec<RepeatRule> {
        vec![RepeatRule {
            id: "rule-1".to_string(),
            title: "Gym".to_string(),
            description: String::new(),
            color: DEFAULT_BLOCK_COLOR.to_string(),
            start_time: 9.0,
            end_time: 10.0,
            kind: RepeatKind::Weekly {
                weekdays: vec![1, 3, 5],
            },
        }]
    }

    fn temp_db_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "timeblocker-rules-{label}-{}.sqlite",
            std::process::id()
        ))
    }

    #[test]
    fn sqlite_repository_roundtrips_rules() {
        let path = temp_db_path("roundtrip");
        let _ = std::fs::remove_file(&path);
        initialize_database(&path).expect("initialized database");

        let repository = SqliteRepeatRuleRepository::new(&path);
        assert!(repository.load().expect("loadable").is_empty());

        let rules = sample_rules();
        repository.save_all(&rules).expect("saved rules");
        assert_eq!(repository.load().expect("loadable"), rules);

        // A second save overwrites rather than appends.
        repository.save_all(&[]).expect("saved empty");
        assert!(repository.load().expect("loadable").is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn in_memory_repository_roundtrips_rules() {
        let repository = InMemoryRepeatRuleRepository::default();
        assert!(repository.load().expect("loadable").is_empty());
        let rules = sample_rules();
        repository.save_all(&rules).expect("saved rules");
        assert_eq!(repository.load().expect("loadable"), rules);
    }
}
