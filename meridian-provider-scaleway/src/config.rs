//! Provider configuration
//!
//! Attributes from the provider block, with `SCW_*` environment variables as
//! fallbacks, and the retry/wait tuning shared by the transport and waiters.

use std::collections::HashMap;
use std::time::Duration;

use meridian_core::resource::Value;
use meridian_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::errors::{ScalewayError, ScalewayResult};
use crate::locality::{Region, Zone};
use crate::scope::ClientDefaults;

pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";
pub const DEFAULT_ZONE: &str = "fr-par-1";
pub const DEFAULT_REGION: &str = "fr-par";

/// Retry and polling tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Attempts per request, the first one included
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
    /// Budget for the sum of all backoff waits of one request
    pub max_total_wait: Duration,
    /// Overrides every waiter's polling interval when set
    pub wait_interval_override: Option<Duration>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_wait: Duration::from_secs(2),
            max_wait: Duration::from_secs(30),
            max_total_wait: Duration::from_secs(120),
            wait_interval_override: None,
        }
    }
}

impl RetrySettings {
    /// Settings that never sleep
    pub fn for_tests() -> Self {
        Self {
            min_wait: Duration::ZERO,
            max_wait: Duration::ZERO,
            wait_interval_override: Some(Duration::ZERO),
            ..Self::default()
        }
    }

    pub fn with_wait_interval(mut self, interval: Duration) -> Self {
        self.wait_interval_override = Some(interval);
        self
    }
}

/// Resolved provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub access_key: Option<String>,
    pub secret_key: String,
    pub project_id: Option<String>,
    pub organization_id: Option<String>,
    pub zone: Zone,
    pub region: Region,
    pub api_url: String,
    pub retry: RetrySettings,
}

impl ProviderConfig {
    /// Resolve from provider attributes, falling back to the process environment
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> ScalewayResult<Self> {
        Self::resolve(attributes, |key| std::env::var(key).ok())
    }

    /// Resolve from provider attributes with an explicit environment lookup
    pub fn resolve(
        attributes: &HashMap<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> ScalewayResult<Self> {
        let lookup = |attr: &str, var: &str| -> Option<String> {
            attributes
                .get(attr)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| env(var).filter(|s| !s.is_empty()))
        };

        let secret_key = lookup("secret_key", "SCW_SECRET_KEY")
            .ok_or_else(|| ScalewayError::config("secret_key is required (or set SCW_SECRET_KEY)"))?;

        let zone_setting = lookup("zone", "SCW_DEFAULT_ZONE");
        let region_setting = lookup("region", "SCW_DEFAULT_REGION");

        let region_setting: Option<Region> = region_setting
            .map(|r| r.parse::<Region>())
            .transpose()
            .map_err(|e| ScalewayError::config(e.to_string()))?;

        // An unset zone follows the configured region
        let zone: Zone = match (zone_setting, &region_setting) {
            (Some(zone), _) => zone.parse::<Zone>().map_err(|e| ScalewayError::config(e.to_string()))?,
            (None, Some(region)) => region.zones().into_iter().next().ok_or_else(|| {
                ScalewayError::config(format!("unknown region {}", region))
            })?,
            (None, None) => DEFAULT_ZONE
                .parse::<Zone>()
                .map_err(|e| ScalewayError::config(e.to_string()))?,
        };
        if !zone.is_known() {
            return Err(ScalewayError::config(format!("unknown zone {}", zone)));
        }

        // An unset region follows the zone
        let region = match region_setting {
            Some(region) => region,
            None => zone.region(),
        };
        if !region.is_known() {
            return Err(ScalewayError::config(format!("unknown region {}", region)));
        }

        if zone.region() != region {
            return Err(ScalewayError::config(format!(
                "zone {} is not part of region {}",
                zone, region
            )));
        }

        Ok(Self {
            access_key: lookup("access_key", "SCW_ACCESS_KEY"),
            secret_key,
            project_id: lookup("project_id", "SCW_DEFAULT_PROJECT_ID"),
            organization_id: lookup("organization_id", "SCW_DEFAULT_ORGANIZATION_ID"),
            zone,
            region,
            api_url: lookup("api_url", "SCW_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            retry: RetrySettings::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Defaults consumed by scope resolution
    pub fn client_defaults(&self) -> ClientDefaults {
        ClientDefaults {
            zone: Some(self.zone.clone()),
            region: Some(self.region.clone()),
            project_id: self.project_id.clone(),
            organization_id: self.organization_id.clone(),
        }
    }

    /// Schema of the provider block
    pub fn schema() -> ResourceSchema {
        ResourceSchema::new("scaleway")
            .with_description("Scaleway provider configuration")
            .attribute(
                AttributeSchema::new("access_key", AttributeType::String)
                    .optional()
                    .with_description("The Scaleway access key"),
            )
            .attribute(
                AttributeSchema::new("secret_key", AttributeType::String)
                    .optional()
                    .sensitive()
                    .with_description("The Scaleway secret key"),
            )
            .attribute(
                AttributeSchema::new("project_id", AttributeType::String)
                    .optional()
                    .with_description("The project ID used by default"),
            )
            .attribute(
                AttributeSchema::new("organization_id", AttributeType::String)
                    .optional()
                    .with_description("The organization ID"),
            )
            .attribute(
                AttributeSchema::new("zone", AttributeType::String)
                    .optional()
                    .with_description("The zone used by default"),
            )
            .attribute(
                AttributeSchema::new("region", AttributeType::String)
                    .optional()
                    .with_description("The region used by default"),
            )
            .attribute(
                AttributeSchema::new("api_url", AttributeType::String)
                    .optional()
                    .with_description("The Scaleway API URL to use"),
            )
    }
}
