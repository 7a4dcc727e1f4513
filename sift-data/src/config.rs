use std::path::Path;

use serde::Deserialize;

use crate::dialect::Dialect;

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
    /// A value could not be converted to the expected type.
    TypeMismatch { key: String, expected: &'static str },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Defaults applied by the query pipeline.
///
/// Resolution order (lowest to highest priority):
/// 1. built-in defaults
/// 2. `data:` section of `application.yaml`
/// 3. `data:` section of `application-{profile}.yaml`
/// 4. `.env` file (loaded into process environment, never overwriting)
/// 5. `DATA_*` environment variables
///
/// Profile is determined by: `SIFT_PROFILE` env var > argument.
#[derive(Debug, Clone, PartialEq)]
pub struct DataConfig {
    pub default_per_page: u64,
    pub max_per_page: Option<u64>,
    pub default_sort: String,
    pub fallback_locale: String,
    pub dialect: Dialect,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            default_per_page: Self::DEFAULT_PER_PAGE,
            max_per_page: None,
            default_sort: "created_at".to_string(),
            fallback_locale: "en".to_string(),
            dialect: Dialect::Generic,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct DataSection {
    default_per_page: Option<u64>,
    max_per_page: Option<u64>,
    default_sort: Option<String>,
    fallback_locale: Option<String>,
    dialect: Option<Dialect>,
}

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    data: Option<DataSection>,
}

impl DataConfig {
    pub const DEFAULT_PER_PAGE: u64 = 10;

    /// Load for `profile` from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."), profile)
    }

    /// Load for `profile` from YAML files located in `dir`.
    pub fn load_from(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let active_profile =
            std::env::var("SIFT_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut config = DataConfig::default();
        config.merge_file(&dir.join("application.yaml"))?;
        config.merge_file(&dir.join(format!("application-{active_profile}.yaml")))?;

        let _ = dotenvy::from_path(dir.join(".env"));

        config.apply_env(|key| std::env::var(key).ok())?;
        tracing::debug!(profile = %active_profile, config = ?config, "Loaded data config");
        Ok(config)
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config = DataConfig::default();
        config.merge_yaml(content)?;
        Ok(config)
    }

    fn merge_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            return Ok(());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Load(e.to_string()))?;
        self.merge_yaml(&content)
    }

    fn merge_yaml(&mut self, content: &str) -> Result<(), ConfigError> {
        if content.trim().is_empty() {
            return Ok(());
        }
        let doc: Document =
            serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
        let Some(section) = doc.data else {
            return Ok(());
        };
        if let Some(v) = section.default_per_page {
            self.default_per_page = positive("default-per-page", v)?;
        }
        if let Some(v) = section.max_per_page {
            self.max_per_page = Some(positive("max-per-page", v)?);
        }
        if let Some(v) = section.default_sort {
            self.default_sort = v;
        }
        if let Some(v) = section.fallback_locale {
            self.fallback_locale = v;
        }
        if let Some(v) = section.dialect {
            self.dialect = v;
        }
        Ok(())
    }

    /// Overlay `DATA_*` variables read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("DATA_DEFAULT_PER_PAGE") {
            self.default_per_page = positive("DATA_DEFAULT_PER_PAGE", parse_u64("DATA_DEFAULT_PER_PAGE", &v)?)?;
        }
        if let Some(v) = lookup("DATA_MAX_PER_PAGE") {
            self.max_per_page = Some(positive("DATA_MAX_PER_PAGE", parse_u64("DATA_MAX_PER_PAGE", &v)?)?);
        }
        if let Some(v) = lookup("DATA_DEFAULT_SORT") {
            self.default_sort = v;
        }
        if let Some(v) = lookup("DATA_FALLBACK_LOCALE") {
            self.fallback_locale = v;
        }
        if let Some(v) = lookup("DATA_DIALECT") {
            self.dialect = match v.to_ascii_lowercase().as_str() {
                "generic" => Dialect::Generic,
                "sqlite" => Dialect::Sqlite,
                "mysql" => Dialect::MySql,
                "postgres" => Dialect::Postgres,
                _ => {
                    return Err(ConfigError::TypeMismatch {
                        key: "DATA_DIALECT".into(),
                        expected: "one of generic, sqlite, mysql, postgres",
                    })
                }
            };
        }
        Ok(())
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }
}

fn parse_u64(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::TypeMismatch {
        key: key.to_string(),
        expected: "unsigned integer",
    })
}

/// Page sizes of zero would list nothing.
fn positive(key: &str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::TypeMismatch {
            key: key.to_string(),
            expected: "positive integer",
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = DataConfig::default();
        assert_eq!(config.default_per_page, 10);
        assert_eq!(config.default_sort, "created_at");
        assert_eq!(config.fallback_locale, "en");
        assert_eq!(config.dialect, Dialect::Generic);
    }

    #[test]
    fn test_from_yaml_str() {
        let config = DataConfig::from_yaml_str(
            "data:\n  default-per-page: 25\n  max-per-page: 100\n  dialect: postgres\nother:\n  key: 1\n",
        )
        .unwrap();
        assert_eq!(config.default_per_page, 25);
        assert_eq!(config.max_per_page, Some(100));
        assert_eq!(config.dialect, Dialect::Postgres);
        assert_eq!(config.default_sort, "created_at");
    }

    #[test]
    fn test_missing_section_keeps_defaults() {
        assert_eq!(DataConfig::from_yaml_str("app:\n  name: x\n").unwrap(), DataConfig::default());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = DataConfig::from_yaml_str("data: [").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_apply_env() {
        let env: HashMap<&str, &str> = [("DATA_DEFAULT_SORT", "id"), ("DATA_DIALECT", "SQLite")]
            .into_iter()
            .collect();
        let mut config = DataConfig::default();
        config
            .apply_env(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.default_sort, "id");
        assert_eq!(config.dialect, Dialect::Sqlite);

        let err = config
            .apply_env(|k| (k == "DATA_MAX_PER_PAGE").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { .. }));
    }

    #[test]
    fn test_zero_page_sizes_rejected() {
        for yaml in ["data:\n  default-per-page: 0\n", "data:\n  max-per-page: 0\n"] {
            let err = DataConfig::from_yaml_str(yaml).unwrap_err();
            assert!(matches!(err, ConfigError::TypeMismatch { expected: "positive integer", .. }));
        }
        let mut config = DataConfig::default();
        let err = config
            .apply_env(|k| (k == "DATA_DEFAULT_PER_PAGE").then(|| "0".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TypeMismatch { ref key, .. } if key == "DATA_DEFAULT_PER_PAGE"));
        assert_eq!(config.default_per_page, DataConfig::DEFAULT_PER_PAGE);
    }

    #[test]
    fn test_profile_file_overrides_base() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("application.yaml"),
            "data:\n  default-per-page: 20\n  default-sort: id\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("application-test.yaml"),
            "data:\n  default-per-page: 5\n",
        )
        .unwrap();
        let config = DataConfig::load_from(dir.path(), "test").unwrap();
        assert_eq!(config.default_per_page, 5);
        assert_eq!(config.default_sort, "id");
    }
}
