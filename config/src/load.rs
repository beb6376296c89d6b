use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use rust_cli_config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Supported extensions for configuration files, in lookup order.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, Copy)]
enum ConfigFileKind {
    Base,
    Environment(Environment),
}

impl ConfigFileKind {
    fn stem(&self) -> &'static str {
        match self {
            ConfigFileKind::Base => "base",
            ConfigFileKind::Environment(env) => env.as_str(),
        }
    }
}

impl fmt::Display for ConfigFileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigFileKind::Base => f.write_str("base configuration"),
            ConfigFileKind::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// A configuration file found on disk.
#[derive(Debug)]
struct ConfigFile {
    kind: ConfigFileKind,
    path: PathBuf,
}

/// Errors that can occur while loading configuration files and overrides.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    /// Failed to determine the current working directory.
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    /// The `configuration` directory exists but has no base file.
    #[error("could not locate base configuration in `{directory}`; attempted: {attempted}")]
    BaseFileMissing { directory: PathBuf, attempted: String },

    /// A configuration file existed but could not be parsed.
    #[error("failed to load {kind_description} from `{path}`: {source}")]
    ConfigurationFileLoad {
        kind_description: String,
        path: PathBuf,
        source: rust_cli_config::ConfigError,
    },

    /// The configuration sources were merged but deserialization failed.
    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] rust_cli_config::ConfigError),

    /// Failed to determine the runtime environment (`APP_ENVIRONMENT`).
    #[error("failed to determine runtime environment: {0}")]
    Environment(#[from] io::Error),

    /// Failed to build the merged configuration.
    #[error("failed to build configuration: {0}")]
    Builder(#[source] rust_cli_config::ConfigError),
}

/// Loads the configuration for the current directory and `APP_ENVIRONMENT`.
///
/// See [`load_config_from`].
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    load_config_from(&base_path, environment)
}

/// Loads the configuration rooted at `base_path`.
///
/// Sources are layered in this order, later ones overriding earlier ones:
///
/// 1. `configuration/base.(yaml|yml|json)`, required if `configuration/` exists.
/// 2. `configuration/{environment}.(yaml|yml|json)`, optional.
/// 3. `APP_`-prefixed environment variables, with `__` between nested keys
///    (`APP_VIEWS__MAX_CONCURRENT_JOBS`).
///
/// Without a `configuration/` directory only environment variables are read, so `T` falls back
/// to its serde defaults.
pub fn load_config_from<T>(base_path: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: DeserializeOwned,
{
    let directory = base_path.join(CONFIGURATION_DIR);
    let mut builder = rust_cli_config::Config::builder();

    if directory.is_dir() {
        for file in configuration_files(&directory, environment)? {
            builder = builder.add_source(rust_cli_config::File::from(file.path.clone()));
            check_file_parses(&builder, &file)?;
        }
    }

    let environment_source = rust_cli_config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true);

    builder
        .add_source(environment_source)
        .build()
        .map_err(LoadConfigError::Builder)?
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

/// Returns the base file followed by the environment file, if there is one.
fn configuration_files(
    directory: &Path,
    environment: Environment,
) -> Result<Vec<ConfigFile>, LoadConfigError> {
    let Some(base) = find_configuration_file(directory, ConfigFileKind::Base) else {
        let attempted = CONFIG_FILE_EXTENSIONS
            .iter()
            .map(|extension| format!("`base.{extension}`"))
            .collect::<Vec<_>>()
            .join(", ");

        return Err(LoadConfigError::BaseFileMissing {
            directory: directory.to_path_buf(),
            attempted,
        });
    };

    let mut files = vec![base];
    files.extend(find_configuration_file(
        directory,
        ConfigFileKind::Environment(environment),
    ));

    Ok(files)
}

fn find_configuration_file(directory: &Path, kind: ConfigFileKind) -> Option<ConfigFile> {
    CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{}.{extension}", kind.stem())))
        .find(|path| path.is_file())
        .map(|path| ConfigFile { kind, path })
}

/// Builds the sources added so far to attribute a parse error to the file that caused it.
fn check_file_parses(
    builder: &ConfigBuilder<DefaultState>,
    file: &ConfigFile,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map(|_| ())
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            kind_description: file.kind.to_string(),
            path: file.path.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        #[serde(default = "default_name")]
        name: String,
        #[serde(default)]
        workers: usize,
    }

    fn default_name() -> String {
        "default".to_owned()
    }

    fn write_configuration(files: &[(&str, &str)]) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let directory = root.path().join(CONFIGURATION_DIR);
        fs::create_dir(&directory).unwrap();
        for (name, content) in files {
            fs::write(directory.join(name), content).unwrap();
        }

        root
    }

    #[test]
    fn test_environment_file_overrides_base() {
        let root = write_configuration(&[
            ("base.yaml", "name: base\nworkers: 1\n"),
            ("prod.yml", "workers: 4\n"),
        ]);

        let config: TestConfig = load_config_from(root.path(), Environment::Prod).unwrap();

        assert_eq!(config.name, "base");
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn test_environment_file_is_optional() {
        let root = write_configuration(&[("base.json", r#"{"name": "json", "workers": 2}"#)]);

        let config: TestConfig = load_config_from(root.path(), Environment::Dev).unwrap();

        assert_eq!(config.name, "json");
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_missing_configuration_directory_uses_defaults() {
        let root = tempfile::tempdir().unwrap();

        let config: TestConfig = load_config_from(root.path(), Environment::Dev).unwrap();

        assert_eq!(config.name, "default");
        assert_eq!(config.workers, 0);
    }

    #[test]
    fn test_missing_base_file_lists_attempted_names() {
        let root = write_configuration(&[("dev.yaml", "workers: 1\n")]);

        let err = load_config_from::<TestConfig>(root.path(), Environment::Dev).unwrap_err();

        let LoadConfigError::BaseFileMissing { attempted, .. } = err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(attempted, "`base.yaml`, `base.yml`, `base.json`");
    }

    #[test]
    fn test_malformed_file_is_reported_with_its_kind() {
        let root = write_configuration(&[
            ("base.yaml", "name: base\nworkers: 1\n"),
            ("dev.yaml", "workers: [unterminated\n"),
        ]);

        let err = load_config_from::<TestConfig>(root.path(), Environment::Dev).unwrap_err();

        let LoadConfigError::ConfigurationFileLoad {
            kind_description, ..
        } = err
        else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(kind_description, "dev environment configuration");
    }
}
