use serde::Deserialize;

use crate::shared::{BigQueryConfig, ValidationError, ViewsConfig};

/// Complete configuration of the view replicator.
///
/// Every section is optional in the configuration files and falls back to its defaults.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewReplicatorConfig {
    #[serde(default)]
    pub bigquery: BigQueryConfig,
    #[serde(default)]
    pub views: ViewsConfig,
}

impl ViewReplicatorConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.bigquery.validate()?;
        self.views.validate()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use secrecy::ExposeSecret;

    use super::*;
    use crate::shared::FailureReportConfig;
    use crate::{Environment, load_config_from};

    #[test]
    fn test_load_from_yaml_files() {
        let root = tempfile::tempdir().unwrap();
        let directory = root.path().join("configuration");
        fs::create_dir(&directory).unwrap();
        fs::write(
            directory.join("base.yaml"),
            "views:\n  max_concurrent_jobs: 10\n",
        )
        .unwrap();
        fs::write(
            directory.join("prod.yaml"),
            concat!(
                "bigquery:\n",
                "  service_account_key: '{\"type\": \"service_account\"}'\n",
                "views:\n",
                "  template_path: templates/secure.sql\n",
                "  failure_report: all\n",
            ),
        )
        .unwrap();

        let config: ViewReplicatorConfig =
            load_config_from(root.path(), Environment::Prod).unwrap();

        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.views.template_path, "templates/secure.sql");
        assert_eq!(config.views.max_concurrent_jobs, 10);
        assert_eq!(config.views.failure_report, FailureReportConfig::All);
        assert_eq!(
            config
                .bigquery
                .service_account_key
                .as_ref()
                .map(|key| key.expose_secret().as_str()),
            Some("{\"type\": \"service_account\"}")
        );
    }

    #[test]
    fn test_empty_files_use_defaults() {
        let root = tempfile::tempdir().unwrap();
        let directory = root.path().join("configuration");
        fs::create_dir(&directory).unwrap();
        fs::write(directory.join("base.json"), "{}").unwrap();
        fs::write(directory.join("dev.json"), "{}").unwrap();

        let config: ViewReplicatorConfig =
            load_config_from(root.path(), Environment::Dev).unwrap();

        assert_eq!(config.views, ViewsConfig::default());
        assert!(config.bigquery.service_account_key_file.is_none());
    }

    #[test]
    fn test_missing_configuration_directory_falls_back_to_defaults() {
        let root = tempfile::tempdir().unwrap();

        let config: ViewReplicatorConfig =
            load_config_from(root.path(), Environment::Dev).unwrap();

        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.views, ViewsConfig::default());
        assert_eq!(config.views.failure_report, FailureReportConfig::First);
    }
}
