use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dark_mode: bool,
    /// Fenced block language rendered as a diagram.
    pub diagram_language: String,
    /// `mermaid-1`, `mermaid-2`, ... instead of random diagram ids.
    pub sequential_diagram_ids: bool,
    /// mermaid-cli executable.
    pub mermaid_cli: PathBuf,
    /// Where the most recent buffer is kept between sessions.
    pub buffer_path: Option<PathBuf>,
    pub extra_tags: Vec<String>,
    /// Extra sanitizer attributes per tag, `*` for every tag.
    pub extra_attributes: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dark_mode: false,
            diagram_language: "mermaid".to_string(),
            sequential_diagram_ids: false,
            mermaid_cli: PathBuf::from("mmdc"),
            buffer_path: None,
            extra_tags: Vec::new(),
            extra_attributes: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the configured paths
        config.mermaid_cli = Self::expand_path(&config.mermaid_cli).unwrap_or(config.mermaid_cli);
        config.buffer_path = config
            .buffer_path
            .map(|path| Self::expand_path(&path).unwrap_or(path));

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        self.save_to_path(&config_path)
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/markdown-livepreview");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    pub fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_path() {
        let config_path = Config::config_path();
        let path_str = config_path.to_string_lossy();

        assert!(!path_str.starts_with('~'));
        assert!(path_str.ends_with(".config/markdown-livepreview/config.toml"));
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.diagram_language, "mermaid");
        assert_eq!(config.mermaid_cli, PathBuf::from("mmdc"));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
dark_mode = true

[extra_attributes]
"*" = ["data-line"]
div = ["align"]
"#,
        )
        .unwrap();

        assert!(config.dark_mode);
        assert!(!config.sequential_diagram_ids);
        assert_eq!(config.extra_attributes["*"], vec!["data-line".to_string()]);
        assert_eq!(config.extra_attributes["div"], vec!["align".to_string()]);
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let mut extra_attributes = BTreeMap::new();
        extra_attributes.insert("abbr".to_string(), vec!["title".to_string()]);
        let original = Config {
            dark_mode: true,
            diagram_language: "diagram".to_string(),
            sequential_diagram_ids: true,
            mermaid_cli: PathBuf::from("/usr/bin/mmdc"),
            buffer_path: Some(PathBuf::from("/tmp/buffer.md")),
            extra_tags: vec!["abbr".to_string()],
            extra_attributes,
        };

        let toml_str = toml::to_string(&original).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_expand_path_with_tilde() {
        let path = PathBuf::from("~/test/path");
        let expanded = Config::expand_path(&path).unwrap();

        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.to_string_lossy().contains("test/path"));
    }

    #[test]
    fn test_expand_path_with_absolute_path() {
        let path = PathBuf::from("/absolute/path");
        let expanded = Config::expand_path(&path).unwrap();

        assert_eq!(expanded, path);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let non_existent_config = temp_dir.path().join("nonexistent.toml");

        let result = Config::load_from_path(&non_existent_config).unwrap();

        assert!(result.is_none());
    }

    #[test]
    fn test_load_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(&config_file, "dark_mode = \"sometimes\"").unwrap();

        let err = Config::load_from_path(&config_file).unwrap_err();

        assert!(matches!(err, ConfigError::ConfigParseError { .. }));
        assert!(err.to_string().contains("config.toml"));
    }

    #[test]
    fn test_save_and_load_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("nested").join("config.toml");
        let test_config = Config {
            sequential_diagram_ids: true,
            buffer_path: Some(PathBuf::from("/tmp/livepreview/buffer.md")),
            ..Config::default()
        };

        test_config.save_to_path(&config_file).unwrap();
        let loaded_config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert_eq!(loaded_config, test_config);
    }

    #[test]
    fn test_paths_in_toml_are_expanded_on_load() {
        unsafe {
            env::set_var("LIVEPREVIEW_TEST_ROOT", "/custom/state");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_file = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_file,
            r#"
mermaid_cli = "~/node_modules/.bin/mmdc"
buffer_path = "$LIVEPREVIEW_TEST_ROOT/buffer.md"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&config_file).unwrap().unwrap();

        assert!(!config.mermaid_cli.to_string_lossy().starts_with('~'));
        assert!(
            config
                .mermaid_cli
                .to_string_lossy()
                .ends_with("node_modules/.bin/mmdc")
        );
        assert_eq!(
            config.buffer_path,
            Some(PathBuf::from("/custom/state/buffer.md"))
        );

        unsafe {
            env::remove_var("LIVEPREVIEW_TEST_ROOT");
        }
    }
}
