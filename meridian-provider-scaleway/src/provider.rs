//! Scaleway Provider implementation
//!
//! Builds the shared API client from the provider configuration and registers
//! every resource and data source against it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use meridian_core::provider::{
    DataSourceContract, Operation, OperationContext, Provider, ResourceContract,
};
use meridian_core::resource::Value;
use meridian_core::schema::ResourceSchema;
use tokio_util::sync::CancellationToken;

use crate::client::ScalewayClient;
use crate::config::{ProviderConfig, RetrySettings};
use crate::data_sources::{
    InstanceIpDataSource, InstanceVolumeDataSource, LbDataSource, VpcPrivateNetworkDataSource,
};
use crate::errors::ScalewayResult;
use crate::resources::{
    BaremetalServerResource, InstanceIpResource, InstanceSnapshotResource, InstanceVolumeResource,
    LbResource, VpcGatewayNetworkResource, VpcPrivateNetworkResource, VpcPublicGatewayResource,
};
use crate::scope::ClientDefaults;
use crate::waiter::{Domain, WaitPlan};

/// State shared by every handler: scope defaults and retry tuning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Meta {
    pub defaults: ClientDefaults,
    pub settings: RetrySettings,
}

impl Meta {
    pub fn new(defaults: ClientDefaults, settings: RetrySettings) -> Self {
        Self { defaults, settings }
    }

    /// Wait plan honoring the configured polling override
    pub fn wait_plan(
        &self,
        kind: &'static str,
        scope: impl fmt::Display,
        id: impl Into<String>,
        domain: Domain,
        timeout: Duration,
    ) -> WaitPlan {
        WaitPlan::new(kind, scope, id, domain, &self.settings, timeout)
    }

    /// Polling interval of a domain, after the override
    pub fn poll_interval(&self, domain: Domain) -> Duration {
        self.settings
            .wait_interval_override
            .unwrap_or_else(|| domain.retry_interval())
    }
}

/// Scaleway Provider
pub struct ScalewayProvider {
    config: ProviderConfig,
    client: Arc<ScalewayClient>,
    meta: Arc<Meta>,
    stop: CancellationToken,
}

impl ScalewayProvider {
    pub fn new(config: ProviderConfig) -> Self {
        let stop = CancellationToken::new();
        let client = ScalewayClient::from_config(&config).with_cancellation(stop.clone());
        let meta = Meta::new(config.client_defaults(), config.retry);
        log::debug!(
            "scaleway provider configured for zone {} region {}",
            config.zone,
            config.region
        );

        Self {
            config,
            client: Arc::new(client),
            meta: Arc::new(meta),
            stop,
        }
    }

    /// Configure from the provider block, falling back to the environment
    pub fn configure(attributes: &HashMap<String, Value>) -> ScalewayResult<Self> {
        Ok(Self::new(ProviderConfig::from_attributes(attributes)?))
    }

    /// Schema of the provider block
    pub fn schema() -> ResourceSchema {
        ProviderConfig::schema()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// Context of one operation; cancelled when the provider is stopped
    pub fn context(&self, operation: Operation, timeout: Duration) -> OperationContext {
        OperationContext::child_of(operation, timeout, &self.stop)
    }

    /// Abort every in-flight operation, including pending retry backoffs
    pub fn stop(&self) {
        log::info!("stopping scaleway provider");
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

impl Provider for ScalewayProvider {
    fn name(&self) -> &'static str {
        "scaleway"
    }

    fn resources(&self) -> Vec<Arc<dyn ResourceContract>> {
        let client = &self.client;
        let meta = &self.meta;
        vec![
            Arc::new(InstanceIpResource::new(client.clone(), meta.clone())),
            Arc::new(InstanceVolumeResource::new(client.clone(), meta.clone())),
            Arc::new(InstanceSnapshotResource::new(client.clone(), meta.clone())),
            Arc::new(VpcPrivateNetworkResource::new(client.clone(), meta.clone())),
            Arc::new(VpcPublicGatewayResource::new(client.clone(), meta.clone())),
            Arc::new(VpcGatewayNetworkResource::new(client.clone(), meta.clone())),
            Arc::new(LbResource::new(client.clone(), meta.clone())),
            Arc::new(BaremetalServerResource::new(client.clone(), meta.clone())),
        ]
    }

    fn data_sources(&self) -> Vec<Arc<dyn DataSourceContract>> {
        let client = &self.client;
        let meta = &self.meta;
        vec![
            Arc::new(InstanceIpDataSource::new(client.clone(), meta.clone())),
            Arc::new(InstanceVolumeDataSource::new(client.clone(), meta.clone())),
            Arc::new(LbDataSource::new(client.clone(), meta.clone())),
            Arc::new(VpcPrivateNetworkDataSource::new(client.clone(), meta.clone())),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ScalewayProvider {
        let attrs: HashMap<String, Value> = [
            ("secret_key".to_string(), Value::from("11111111-1111-1111-1111-111111111111")),
            ("zone".to_string(), Value::from("nl-ams-1")),
            ("api_url".to_string(), Value::from("http://127.0.0.1:9")),
        ]
        .into_iter()
        .collect();
        ScalewayProvider::new(ProviderConfig::resolve(&attrs, |_| None).unwrap())
    }

    #[test]
    fn registers_every_resource_once() {
        let provider = provider();
        let mut names: Vec<&str> = provider.resources().iter().map(|r| r.type_name()).collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "scaleway_baremetal_server",
                "scaleway_instance_ip",
                "scaleway_instance_snapshot",
                "scaleway_instance_volume",
                "scaleway_lb",
                "scaleway_vpc_gateway_network",
                "scaleway_vpc_private_network",
                "scaleway_vpc_public_gateway",
            ]
        );
        assert!(provider.resource("scaleway_lb").is_some());
        assert!(provider.resource("scaleway_unknown").is_none());
    }

    #[test]
    fn data_sources_share_resource_names() {
        let provider = provider();
        for data_source in provider.data_sources() {
            assert!(
                provider.resource(data_source.type_name()).is_some(),
                "{} has no resource",
                data_source.type_name()
            );
        }
        assert_eq!(provider.data_sources().len(), 4);
    }

    #[test]
    fn schemas_name_their_type() {
        let provider = provider();
        for resource in provider.resources() {
            assert_eq!(resource.schema().resource_type, resource.type_name());
        }
        for data_source in provider.data_sources() {
            let schema = data_source.schema();
            assert_eq!(schema.resource_type, data_source.type_name());
            assert!(schema.attributes.values().all(|a| !a.required));
        }
    }

    #[test]
    fn defaults_follow_configuration() {
        let provider = provider();
        assert_eq!(provider.meta().defaults.zone.as_ref().unwrap().as_str(), "nl-ams-1");
        assert_eq!(provider.meta().defaults.region.as_ref().unwrap().as_str(), "nl-ams");
        assert_eq!(provider.name(), "scaleway");
    }

    #[test]
    fn stop_cancels_operation_contexts() {
        let provider = provider();
        let ctx = provider.context(Operation::Read, Duration::from_secs(60));
        assert!(!ctx.is_cancelled());
        provider.stop();
        assert!(ctx.is_cancelled());
        assert!(provider.is_stopped());
    }

    #[test]
    fn poll_interval_honors_override() {
        let meta = Meta::new(ClientDefaults::default(), RetrySettings::default());
        assert_eq!(meta.poll_interval(Domain::Baremetal), Duration::from_secs(15));
        let meta = Meta::new(ClientDefaults::default(), RetrySettings::for_tests());
        assert_eq!(meta.poll_interval(Domain::Baremetal), Duration::ZERO);
    }
}
