//! scaleway_vpc_gateway_network - Attachment of a public gateway to a private network

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{OperationContext, ProviderResult, ResourceContract, Timeouts};
use meridian_core::resource::ResourceData;
use meridian_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::api::GatewayApi;
use crate::api::vpcgw::{CreateGatewayNetworkRequest, GatewayNetwork, UpdateGatewayNetworkRequest};
use crate::envelope::{GonePolicy, Patch, default_timeouts, flatten_model, ignore_not_found, read_or_tombstone};
use crate::errors::ScalewayResult;
use crate::locality::{Zone, expand_id, flatten_regional_id, flatten_zoned_id, new_zoned_id, parse_zoned_id};
use crate::provider::Meta;
use crate::resources::{reference_attribute, surface, zone_attribute};
use crate::scope::extract_zone;
use crate::waiter::{
    Domain, WaitPlan, retry_on_transient_state_error, wait_for, wait_for_absence, wait_for_optional,
};

pub const TYPE_NAME: &str = "scaleway_vpc_gateway_network";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE_NAME)
        .with_description("Connection between a public gateway and a private network")
        .attribute(
            reference_attribute("gateway_id")
                .required()
                .force_new()
                .with_description("The ID of the public gateway"),
        )
        .attribute(
            reference_attribute("private_network_id")
                .required()
                .force_new()
                .with_description("The ID of the private network"),
        )
        .attribute(
            AttributeSchema::new("enable_masquerade", AttributeType::Bool)
                .optional()
                .with_default(true)
                .with_description("Enable masquerade on this network")
                .with_api_field("enable_masquerade"),
        )
        .attribute(
            AttributeSchema::new("static_address", AttributeType::String)
                .optional()
                .with_description("The static IP address in CIDR on this network"),
        )
        .attribute(
            AttributeSchema::new("mac_address", AttributeType::String)
                .computed()
                .with_api_field("mac_address"),
        )
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_api_field("status"),
        )
        .attribute(
            AttributeSchema::new("created_at", AttributeType::String)
                .computed()
                .with_api_field("created_at"),
        )
        .attribute(zone_attribute())
}

#[derive(Clone)]
pub struct VpcGatewayNetworkResource {
    api: Arc<dyn GatewayApi>,
    meta: Arc<Meta>,
}

impl VpcGatewayNetworkResource {
    pub fn new(api: Arc<dyn GatewayApi>, meta: Arc<Meta>) -> Self {
        Self { api, meta }
    }

    fn plan(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> WaitPlan {
        self.meta
            .wait_plan("gateway network", zone, id, Domain::Gateway, ctx.timeout)
    }

    async fn wait_network(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> ScalewayResult<GatewayNetwork> {
        let api = &self.api;
        wait_for(ctx, &self.plan(ctx, zone, id), move || api.get_gateway_network(zone, id)).await
    }

    /// The parent gateway is reconfigured on every attachment change
    async fn wait_gateway(&self, ctx: &OperationContext, zone: &Zone, gateway_id: &str) -> ScalewayResult<()> {
        let api = &self.api;
        let plan = self
            .meta
            .wait_plan("public gateway", zone, gateway_id, Domain::Gateway, ctx.timeout);
        wait_for(ctx, &plan, move || api.get_gateway(zone, gateway_id)).await?;
        Ok(())
    }

    async fn create_network(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let zone = extract_zone(d, &self.meta.defaults)?.scope;
        let gateway_id = expand_id(d.get_string("gateway_id").unwrap_or_default()).to_string();
        let request = CreateGatewayNetworkRequest {
            gateway_id: gateway_id.clone(),
            private_network_id: expand_id(d.get_string("private_network_id").unwrap_or_default()).to_string(),
            enable_masquerade: d.get_bool("enable_masquerade"),
            address: d.get_string("static_address").map(str::to_string),
        };

        let api = &self.api;
        let (zone_ref, request_ref) = (&zone, &request);
        let network = retry_on_transient_state_error(
            move || api.create_gateway_network(zone_ref, request_ref),
            || self.wait_gateway(ctx, &zone, &gateway_id),
        )
        .await?;
        d.set_id(new_zoned_id(&zone, &network.id));
        log::info!("created {} {}", TYPE_NAME, d.id());

        self.wait_network(ctx, &zone, &network.id).await?;
        self.wait_gateway(ctx, &zone, &gateway_id).await?;
        self.read_network(ctx, d).await
    }

    async fn read_network(&self, _ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let result = self.api.get_gateway_network(&zone, &id).await;
        let Some(network) = read_or_tombstone(d, result, GonePolicy::NotFound)? else {
            return Ok(Diagnostics::new());
        };

        flatten_model(&schema(), &network, d)?;
        d.set("gateway_id", flatten_zoned_id(&zone, &network.gateway_id));
        // Private networks are regional even when attached from a zone
        d.set(
            "private_network_id",
            flatten_regional_id(&zone.region(), &network.private_network_id),
        );
        d.set("static_address", network.address.clone().unwrap_or_default());
        Ok(Diagnostics::new())
    }

    async fn update_network(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let request = UpdateGatewayNetworkRequest {
            enable_masquerade: d
                .has_change("enable_masquerade")
                .then(|| d.get_bool("enable_masquerade")),
            address: Patch::<String>::string_change(d, "static_address"),
        };

        if !request.is_empty() {
            self.wait_network(ctx, &zone, &id).await?;
            self.api.update_gateway_network(&zone, &id, &request).await?;
            self.wait_network(ctx, &zone, &id).await?;
        }

        self.read_network(ctx, d).await
    }

    async fn delete_network(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let plan = self.plan(ctx, &zone, &id);
        let api = &self.api;
        let (zone, id) = (&zone, id.as_str());

        let Some(network) = wait_for_optional(ctx, &plan, move || api.get_gateway_network(zone, id)).await? else {
            return Ok(Diagnostics::new());
        };

        ignore_not_found(self.api.delete_gateway_network(zone, id).await)?;
        wait_for_absence(ctx, &plan, move || api.get_gateway_network(zone, id)).await?;

        let gateway_id = network.gateway_id.as_str();
        let gateway_plan = self
            .meta
            .wait_plan("public gateway", zone, gateway_id, Domain::Gateway, ctx.timeout);
        if wait_for_optional(ctx, &gateway_plan, move || api.get_gateway(zone, gateway_id))
            .await?
            .is_none()
        {
            log::debug!("gateway {} is gone after detaching {}", gateway_id, id);
        }
        Ok(Diagnostics::new())
    }
}

#[async_trait]
impl ResourceContract for VpcGatewayNetworkResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    fn timeouts(&self) -> Timeouts {
        default_timeouts(Domain::Gateway)
    }

    async fn create(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.create_network(ctx, d).await;
        surface(d, result)
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.read_network(ctx, d).await;
        surface(d, result)
    }

    async fn update(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.update_network(ctx, d).await;
        surface(d, result)
    }

    async fn delete(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.delete_network(ctx, d).await;
        surface(d, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::differ::{Diff, plan};
    use meridian_core::provider::Operation;
    use meridian_core::resource::Value;

    use crate::api::vpcgw::CreateGatewayRequest;
    use crate::test_support::{FakeCloud, attrs, changed, ctx, meta, persisted, planned, transient_state};

    fn resource(cloud: &Arc<FakeCloud>) -> VpcGatewayNetworkResource {
        VpcGatewayNetworkResource::new(cloud.clone(), meta())
    }

    async fn gateway(cloud: &Arc<FakeCloud>) -> String {
        let request = CreateGatewayRequest {
            name: "gw".to_string(),
            gateway_type: "VPC-GW-S".to_string(),
            ..CreateGatewayRequest::default()
        };
        let zone: Zone = "fr-par-1".parse().unwrap();
        cloud.create_gateway(&zone, &request).await.unwrap().id
    }

    async fn created(cloud: &Arc<FakeCloud>) -> ResourceData {
        let gateway_id = gateway(cloud).await;
        let pn = cloud.insert_private_network("fr-par", "backend");
        let mut d = planned(
            TYPE_NAME,
            vec![
                ("gateway_id", Value::from(format!("fr-par-1/{}", gateway_id))),
                ("private_network_id", Value::from(format!("fr-par/{}", pn.id))),
            ],
        );
        schema().apply_defaults(&mut d);
        resource(cloud).create(&ctx(Operation::Create), &mut d).await.unwrap();
        d
    }

    #[tokio::test]
    async fn create_flattens_references_to_their_own_scope() {
        let cloud = FakeCloud::new();
        let d = created(&cloud).await;

        assert!(d.get_string("gateway_id").unwrap().starts_with("fr-par-1/"));
        assert!(d.get_string("private_network_id").unwrap().starts_with("fr-par/"));
        assert!(d.get_bool("enable_masquerade"));
        assert_eq!(d.get_string("mac_address"), Some("02:00:00:00:00:01"));
    }

    #[tokio::test]
    async fn transient_gateway_is_awaited_then_retried() {
        let cloud = FakeCloud::new();
        cloud.fail_next("create_gateway_network", transient_state("gateway"));
        created(&cloud).await;

        assert_eq!(cloud.calls("create_gateway_network"), 2);
        assert_eq!(cloud.gateway_networks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bare_gateway_reference_does_not_drift() {
        let cloud = FakeCloud::new();
        let d = created(&cloud).await;

        let config = attrs(vec![
            (
                "gateway_id",
                Value::from(expand_id(d.get_string("gateway_id").unwrap())),
            ),
            (
                "private_network_id",
                Value::from(expand_id(d.get_string("private_network_id").unwrap())),
            ),
            ("enable_masquerade", Value::Bool(true)),
        ]);
        let change = plan(&resource(&cloud), Some(&d), &config).unwrap();
        assert_eq!(change.diff, Diff::NoChange);

        let mut data = change.data;
        resource(&cloud).update(&ctx(Operation::Update), &mut data).await.unwrap();
        assert_eq!(cloud.calls("update_gateway_network"), 0);
    }

    #[tokio::test]
    async fn clearing_static_address_sends_null() {
        let cloud = FakeCloud::new();
        let d = created(&cloud).await;
        let mut d = changed(&d, vec![("static_address", Value::from("192.168.1.1/24"))]);
        resource(&cloud).update(&ctx(Operation::Update), &mut d).await.unwrap();
        assert_eq!(d.get_string("static_address"), Some("192.168.1.1/24"));

        let mut d = changed(&d, vec![("static_address", Value::from(""))]);
        resource(&cloud).update(&ctx(Operation::Update), &mut d).await.unwrap();
        assert_eq!(d.get_string("static_address"), None);
        assert_eq!(cloud.calls("update_gateway_network"), 2);
    }

    #[tokio::test]
    async fn delete_settles_the_gateway() {
        let cloud = FakeCloud::new();
        let d = created(&cloud).await;
        let before = cloud.calls("get_gateway");

        resource(&cloud).delete(&ctx(Operation::Delete), &mut persisted(&d)).await.unwrap();
        assert!(cloud.gateway_networks.lock().unwrap().is_empty());
        assert_eq!(cloud.calls("get_gateway"), before + 1);
    }
}
