//! Process configuration.
//!
//! Read once from the environment when the Lambda process starts and then
//! passed by reference into each step of the cycle.

use crate::error::ConfigError;

pub const API_KEY_VAR: &str = "NASA_API_KEY";
pub const BUCKET_VAR: &str = "BUCKET_NAME";
pub const PROJECT_VAR: &str = "WAREHOUSE_PROJECT";
pub const FEED_URL_VAR: &str = "NEO_FEED_URL";

pub const DEFAULT_FEED_URL: &str = "https://api.nasa.gov/neo/rest/v1/feed";

pub const DATASET: &str = "nasa_neo";
pub const TABLE: &str = "raw_neo_feed";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EtlConfig {
    pub api_key: String,
    pub bucket: String,
    pub project: String,
    pub feed_url: String,
}

impl EtlConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup. Unset and
    /// empty values are both treated as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.is_empty());

        let api_key = get(API_KEY_VAR);
        let bucket = get(BUCKET_VAR);
        let project = get(PROJECT_VAR);

        match (api_key, bucket, project) {
            (Some(api_key), Some(bucket), Some(project)) => Ok(EtlConfig {
                api_key,
                bucket,
                project,
                feed_url: get(FEED_URL_VAR).unwrap_or_else(|| DEFAULT_FEED_URL.to_owned()),
            }),

            (api_key, bucket, project) => {
                let missing = [
                    (API_KEY_VAR, api_key.is_none()),
                    (BUCKET_VAR, bucket.is_none()),
                    (PROJECT_VAR, project.is_none()),
                ]
                .into_iter()
                .filter_map(|(name, absent)| absent.then_some(name))
                .collect();

                Err(ConfigError::Missing(missing))
            }
        }
    }

    /// The fully-qualified name of the destination table.
    pub fn table_id(&self) -> String {
        format!("{}.{}.{}", self.project, DATASET, TABLE)
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        EtlConfig {
            api_key: "DEMO_KEY".to_owned(),
            bucket: "neo-raw".to_owned(),
            project: "astro".to_owned(),
            feed_url: DEFAULT_FEED_URL.to_owned(),
        }
    }
}
