//! JSON configuration file loading.
//!
//! The file layout groups the agent settings under `tooGoodToGoConfig`;
//! unknown sections (such as notification settings) are ignored. Durations
//! are human-readable strings (`"45s"`, `"1h 30m"`).

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use super::{Account, AntConfig, BaseUrl, Endpoints, SearchConfig};
use crate::error::ConfigError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    too_good_to_go_config: AgentSection,
    #[serde(default)]
    verbose: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentSection {
    accounts: Vec<Account>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    base_url: Option<String>,
    #[serde(default)]
    endpoints: Option<Endpoints>,
    #[serde(default, with = "humantime_serde")]
    average_requests_period: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    too_many_requests_pause_period: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    active_orders_reminder_period: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    log_in_email_validation_requests_period: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    log_in_email_validation_timeout_duration: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    log_in_validity_duration: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    token_validity_duration: Option<Duration>,
    #[serde(default, with = "humantime_serde")]
    request_timeout: Option<Duration>,
    #[serde(default)]
    search_config: Option<SearchConfig>,
    #[serde(default)]
    apk_version: Option<String>,
    #[serde(default)]
    use_gzip_encoding: Option<bool>,
    #[serde(default)]
    snapshot_dir: Option<String>,
    #[serde(default)]
    max_challenge_rotations: Option<u32>,
}

pub(super) fn load(path: &Path) -> Result<AntConfig, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse(&bytes).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    let config = config.into_config()?;
    tracing::info!("loaded configuration from {}", path.display());
    Ok(config)
}

fn parse(bytes: &[u8]) -> Result<ConfigFile, serde_json::Error> {
    serde_json::from_slice(bytes)
}

impl ConfigFile {
    fn into_config(self) -> Result<AntConfig, ConfigError> {
        let section = self.too_good_to_go_config;
        let mut builder = AntConfig::builder()
            .accounts(section.accounts)
            .verbose(self.verbose);

        if let Some(language) = section.language {
            builder = builder.language(language);
        }
        if let Some(url) = section.base_url {
            builder = builder.base_url(BaseUrl::new(url)?);
        }
        if let Some(endpoints) = section.endpoints {
            builder = builder.endpoints(endpoints);
        }
        if let Some(period) = section.average_requests_period {
            builder = builder.average_requests_period(period);
        }
        if let Some(period) = section.too_many_requests_pause_period {
            builder = builder.too_many_requests_pause_period(period);
        }
        if let Some(period) = section.active_orders_reminder_period {
            builder = builder.active_orders_reminder_period(period);
        }
        if let Some(period) = section.log_in_email_validation_requests_period {
            builder = builder.login_polling_period(period);
        }
        if let Some(timeout) = section.log_in_email_validation_timeout_duration {
            builder = builder.login_email_validation_timeout(timeout);
        }
        if let Some(duration) = section.log_in_validity_duration {
            builder = builder.login_validity_duration(duration);
        }
        if let Some(duration) = section.token_validity_duration {
            builder = builder.token_validity_duration(duration);
        }
        if let Some(timeout) = section.request_timeout {
            builder = builder.request_timeout(timeout);
        }
        if let Some(search) = section.search_config {
            builder = builder.search(search);
        }
        if let Some(version) = section.apk_version {
            builder = builder.apk_version(version);
        }
        if let Some(enabled) = section.use_gzip_encoding {
            builder = builder.use_gzip_encoding(enabled);
        }
        if let Some(dir) = section.snapshot_dir {
            builder = builder.snapshot_dir(dir);
        }
        if let Some(rotations) = section.max_challenge_rotations {
            builder = builder.max_challenge_rotations(rotations);
        }

        builder.build()
    }
}

mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
