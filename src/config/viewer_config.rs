use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use compio::fs;
use hashlink::LinkedHashMap;
use saphyr::{LoadableYamlNode, Scalar, Yaml};
use snafu::prelude::*;
use tracing::debug;

use crate::application::data::ColorMode;

const CONFIG_FILE_NAME: &str = "dzview.yaml";

pub fn get_default_config_path() -> PathBuf {
    PathBuf::from(CONFIG_FILE_NAME)
}

/// Settings read from the optional YAML configuration file.
///
/// Every field is optional; command line flags take precedence over
/// anything set here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerConfig {
    pub host: Option<String>,
    pub name: Option<String>,
    pub path: Option<String>,
    pub events_prefix: Option<String>,
    pub secure: Option<bool>,
    pub highlight_ms: Option<u64>,
    pub were_back_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub color: Option<ColorMode>,
}

impl ViewerConfig {
    /// Reads `explicit` if given. Otherwise reads the default file from the
    /// working directory, falling back to defaults when it does not exist.
    pub async fn read(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_path(path.to_path_buf()).await,
            None => Self::from_optional_path(get_default_config_path()).await,
        }
    }

    /// Reads `path`, treating a missing file as an empty configuration.
    async fn from_optional_path(path: PathBuf) -> Result<Self, ConfigError> {
        match Self::from_path(path).await {
            Err(ConfigError::ReadError { file_path, source })
                if source.kind() == ErrorKind::NotFound =>
            {
                debug!("No {} found, using defaults", file_path);
                Ok(Self::default())
            }
            other => other,
        }
    }

    pub async fn from_path(path: PathBuf) -> Result<Self, ConfigError> {
        debug!("Reading config file: {}", path.display());
        let bytes = fs::read(&path).await.context(ReadSnafu {
            file_path: path.display().to_string(),
        })?;
        debug!("Successfully read config file: {} bytes", bytes.len());

        let contents = String::from_utf8(bytes).context(EncodingSnafu {
            file_path: path.display().to_string(),
        })?;
        contents.as_str().try_into()
    }

    fn apply_entry(&mut self, key: &str, value: &Yaml) -> Result<(), ConfigError> {
        match key {
            "host" => self.host = Some(string_value(key, value)?),
            "name" => self.name = Some(string_value(key, value)?),
            "path" => self.path = Some(string_value(key, value)?),
            "events_prefix" => self.events_prefix = Some(string_value(key, value)?),
            "secure" => self.secure = Some(bool_value(key, value)?),
            "highlight_ms" => self.highlight_ms = Some(unsigned_value(key, value)?),
            "were_back_secs" => self.were_back_secs = Some(unsigned_value(key, value)?),
            "connect_timeout_secs" => {
                self.connect_timeout_secs = Some(unsigned_value(key, value)?)
            }
            "color" => {
                let raw = string_value(key, value)?;
                let mode = ColorMode::from_str(&raw, true).map_err(|_| ConfigError::InvalidValue {
                    key: key.to_string(),
                    expected: "one of auto, always, never",
                })?;
                self.color = Some(mode);
            }
            _ => debug!("Skipping unknown config key: {}", key),
        }
        Ok(())
    }

    fn parse_mapping(top_level: &LinkedHashMap<Yaml, Yaml>) -> Result<Self, ConfigError> {
        top_level
            .iter()
            .filter_map(|(key, value)| match key {
                Yaml::Value(Scalar::String(key)) => Some((key, value)),
                _ => {
                    debug!("Skipping non-string config key: {:?}", key);
                    None
                }
            })
            .try_fold(Self::default(), |mut config, (key, value)| {
                config.apply_entry(key, value)?;
                Ok(config)
            })
    }
}

impl TryFrom<&str> for ViewerConfig {
    type Error = ConfigError;

    fn try_from(contents: &str) -> Result<Self, Self::Error> {
        let documents = Yaml::load_from_str(contents).context(ParseSnafu)?;
        let Some(document) = documents.first() else {
            return Ok(Self::default());
        };

        let top_level = document.as_mapping().context(TopLevelNotMapSnafu)?;
        Self::parse_mapping(top_level)
    }
}

fn string_value(key: &str, value: &Yaml) -> Result<String, ConfigError> {
    match value {
        Yaml::Value(Scalar::String(text)) => Ok(text.to_string()),
        _ => InvalidValueSnafu {
            key,
            expected: "a string",
        }
        .fail(),
    }
}

fn bool_value(key: &str, value: &Yaml) -> Result<bool, ConfigError> {
    match value {
        Yaml::Value(Scalar::Boolean(flag)) => Ok(*flag),
        _ => InvalidValueSnafu {
            key,
            expected: "true or false",
        }
        .fail(),
    }
}

fn unsigned_value(key: &str, value: &Yaml) -> Result<u64, ConfigError> {
    match value {
        Yaml::Value(Scalar::Integer(number)) if *number >= 0 => Ok(*number as u64),
        _ => InvalidValueSnafu {
            key,
            expected: "a non-negative integer",
        }
        .fail(),
    }
}

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Failed to read the config file: {}", file_path))]
    ReadError {
        file_path: String,
        source: std::io::Error,
    },
    #[snafu(display("The config file {} is not valid UTF-8", file_path))]
    EncodingError {
        file_path: String,
        source: std::string::FromUtf8Error,
    },
    #[snafu(display("Failed to parse the config file"))]
    ParseError { source: saphyr::ScanError },
    #[snafu(display("Top level of config should be a map"))]
    TopLevelNotMap,
    #[snafu(display("Config key '{}' should be {}", key, expected))]
    InvalidValue { key: String, expected: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[compio::test]
    async fn config_returns_error_on_nonexistent_explicit_file() {
        let result = ViewerConfig::read(Some(Path::new("nonexistent.yaml"))).await;
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[compio::test]
    async fn missing_default_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = ViewerConfig::from_optional_path(dir.path().join(CONFIG_FILE_NAME))
            .await
            .unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[compio::test]
    async fn unreadable_default_path_is_still_an_error() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = ViewerConfig::from_optional_path(dir.path().to_path_buf()).await;
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[compio::test]
    async fn default_path_is_parsed_when_present() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "name: staging\n").expect("Failed to write config");

        let config = ViewerConfig::from_optional_path(path).await.unwrap();
        assert_eq!(config.name.as_deref(), Some("staging"));
    }

    #[compio::test]
    async fn config_reads_every_known_key_from_file() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(
            file,
            r#"
host: doozer.example:8000
name: prod
path: /d/prod/
events_prefix: /events
secure: false
highlight_ms: 250
were_back_secs: 3
connect_timeout_secs: 4
color: never
"#
        )
        .expect("Failed to write to temp file");

        let config = ViewerConfig::from_path(file.path().to_path_buf())
            .await
            .unwrap();
        assert_eq!(
            config,
            ViewerConfig {
                host: Some("doozer.example:8000".to_string()),
                name: Some("prod".to_string()),
                path: Some("/d/prod/".to_string()),
                events_prefix: Some("/events".to_string()),
                secure: Some(false),
                highlight_ms: Some(250),
                were_back_secs: Some(3),
                connect_timeout_secs: Some(4),
                color: Some(ColorMode::Never),
            }
        );
    }

    #[compio::test]
    async fn config_rejects_non_utf8_files() {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(&[0xff, 0xfe, 0x00])
            .expect("Failed to write to temp file");

        let result = ViewerConfig::from_path(file.path().to_path_buf()).await;
        assert!(matches!(result, Err(ConfigError::EncodingError { .. })));
    }

    #[test]
    fn config_returns_error_on_invalid_yaml() {
        let result: Result<ViewerConfig, _> = "invalid: yaml: content: [unclosed".try_into();
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[rstest]
    #[case("")]
    #[case("# only a comment")]
    fn config_without_documents_is_default(#[case] contents: &str) {
        let result: Result<ViewerConfig, _> = contents.try_into();
        assert_eq!(result.unwrap(), ViewerConfig::default());
    }

    #[rstest]
    #[case("- item1\n- item2")]
    #[case("just a string")]
    fn config_returns_error_when_top_level_is_not_map(#[case] contents: &str) {
        let result: Result<ViewerConfig, _> = contents.try_into();
        assert!(matches!(result, Err(ConfigError::TopLevelNotMap)));
    }

    #[rstest]
    #[case("host: 8000", "host")]
    #[case("secure: maybe", "secure")]
    #[case("highlight_ms: -5", "highlight_ms")]
    #[case("were_back_secs: soon", "were_back_secs")]
    #[case("connect_timeout_secs: 1.5", "connect_timeout_secs")]
    #[case("color: purple", "color")]
    fn config_reports_the_offending_key(#[case] contents: &str, #[case] expected_key: &str) {
        let result: Result<ViewerConfig, _> = contents.try_into();
        match result {
            Err(ConfigError::InvalidValue { key, .. }) => assert_eq!(key, expected_key),
            other => panic!("Expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn config_skips_unknown_keys() {
        let result: Result<ViewerConfig, _> = "theme: dark\n42: answer\nname: local".try_into();
        assert_eq!(
            result.unwrap(),
            ViewerConfig {
                name: Some("local".to_string()),
                ..ViewerConfig::default()
            }
        );
    }
}
