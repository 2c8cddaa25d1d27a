use crate::infrastructure::error::EngineError;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
const DEFAULT_VIEW: &str = "week";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub api_base_url: Option<String>,
    pub api_key: Option<String>,
    pub default_view: String,
}

fn default_app_config() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "apiBaseUrl": null,
        "apiKey": null,
        "defaultView": DEFAULT_VIEW
    })
}

pub fn ensure_default_config(config_dir: &Path) -> Result<(), EngineError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_config())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

pub fn load_config(config_dir: &Path) -> Result<AppConfig, EngineError> {
    let path = config_dir.join(APP_JSON);
    let raw = fs::read_to_string(&path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;

    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| EngineError::InvalidInput(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(EngineError::InvalidInput(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }

    let read_string = |key: &str| {
        parsed
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    };

    Ok(AppConfig {
        api_base_url: read_string("apiBaseUrl"),
        api_key: read_string("apiKey"),
        default_view: read_string("defaultView").unwrap_or_else(|| DEFAULT_VIEW.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_dir(label: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "timeblocker-config-{label}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).expect("created config dir");
        dir
    }

    #[test]
    fn ensure_then_load_yields_the_defaults() {
        let dir = temp_config_dir("defaults");
        ensure_default_config(&dir).expect("ensured config");
        let config = load_config(&dir).expect("loadable config");
        assert_eq!(config.default_view, "week");
        assert!(config.api_base_url.is_none());
        assert!(config.api_key.is_none());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn ensure_does_not_overwrite_an_existing_file() {
        let dir = temp_config_dir("preserve");
        fs::write(
            dir.join(APP_JSON),
            r#"{"schema":1,"apiBaseUrl":"https://project.example.co","apiKey":"anon","defaultView":"day"}"#,
        )
        .expect("wrote config");
        ensure_default_config(&dir).expect("ensured config");
        let config = load_config(&dir).expect("loadable config");
        assert_eq!(config.api_base_url.as_deref(), Some("https://project.example.co"));
        assert_eq!(config.default_view, "day");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = temp_config_dir("schema");
        fs::write(dir.join(APP_JSON), r#"{"schema":2}"#).expect("wrote config");
        assert!(load_config(&dir).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
