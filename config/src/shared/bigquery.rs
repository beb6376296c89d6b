use secrecy::SecretString;
use serde::Deserialize;

use crate::shared::ValidationError;

/// Credentials and billing settings for BigQuery.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BigQueryConfig {
    /// Path to a service account key file.
    #[serde(default)]
    pub service_account_key_file: Option<String>,
    /// Service account key JSON.
    #[serde(default)]
    pub service_account_key: Option<SecretString>,
    /// Project that query jobs are billed to.
    ///
    /// If not set, jobs are billed to the project of the target dataset.
    #[serde(default)]
    pub billing_project_id: Option<String>,
}

/// Where the BigQuery client obtains its credentials from.
#[derive(Debug)]
pub enum BigQueryCredentials<'a> {
    KeyFile(&'a str),
    Key(&'a SecretString),
    ApplicationDefault,
}

impl BigQueryConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.service_account_key_file.is_some() && self.service_account_key.is_some() {
            return Err(ValidationError::ConflictingCredentials);
        }

        Ok(())
    }

    /// Returns the configured credentials, falling back to Application Default Credentials.
    pub fn credentials(&self) -> BigQueryCredentials<'_> {
        match (&self.service_account_key_file, &self.service_account_key) {
            (Some(path), _) => BigQueryCredentials::KeyFile(path),
            (None, Some(key)) => BigQueryCredentials::Key(key),
            (None, None) => BigQueryCredentials::ApplicationDefault,
        }
    }

    /// Returns the project to bill jobs to, given the project of the target dataset.
    pub fn billing_project_id<'a>(&'a self, target_project_id: &'a str) -> &'a str {
        self.billing_project_id
            .as_deref()
            .unwrap_or(target_project_id)
    }
}
