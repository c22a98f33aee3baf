//! scaleway_vpc_public_gateway - Public gateway routing private networks

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{OperationContext, ProviderResult, ResourceContract, Timeouts};
use meridian_core::resource::ResourceData;
use meridian_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::api::GatewayApi;
use crate::api::vpcgw::{CreateGatewayRequest, Gateway, UpdateGatewayRequest};
use crate::envelope::{
    GonePolicy, Patch, default_timeouts, flatten_model, ignore_not_found, name_or_random, read_or_tombstone,
};
use crate::errors::ScalewayResult;
use crate::locality::{Zone, expand_id, flatten_zoned_id, new_zoned_id, parse_zoned_id};
use crate::provider::Meta;
use crate::resources::{project_id_attribute, reference_attribute, surface, tags_attribute, zone_attribute};
use crate::scope::{extract_project_id, extract_zone};
use crate::waiter::{Domain, WaitPlan, wait_for, wait_for_absence, wait_for_optional};

pub const TYPE_NAME: &str = "scaleway_vpc_public_gateway";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE_NAME)
        .with_description("Public gateway giving private networks access to the internet")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .optional()
                .computed()
                .with_description("The name of the public gateway")
                .with_api_field("name"),
        )
        .attribute(
            AttributeSchema::new("type", AttributeType::String)
                .required()
                .force_new()
                .with_description("The gateway type"),
        )
        .attribute(
            AttributeSchema::new("upstream_dns_servers", types::string_list())
                .optional()
                .computed()
                .with_description("Override the gateway's default recursive DNS servers")
                .with_api_field("upstream_dns_servers"),
        )
        .attribute(
            reference_attribute("ip_id")
                .optional()
                .computed()
                .force_new()
                .with_description("Attach an existing IP to the gateway"),
        )
        .attribute(
            AttributeSchema::new("bastion_enabled", AttributeType::Bool)
                .optional()
                .with_default(false)
                .with_description("Enable SSH bastion on the gateway")
                .with_api_field("bastion_enabled"),
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
        .attribute(tags_attribute())
        .attribute(zone_attribute())
        .attribute(project_id_attribute("project_id"))
}

#[derive(Clone)]
pub struct VpcPublicGatewayResource {
    api: Arc<dyn GatewayApi>,
    meta: Arc<Meta>,
}

impl VpcPublicGatewayResource {
    pub fn new(api: Arc<dyn GatewayApi>, meta: Arc<Meta>) -> Self {
        Self { api, meta }
    }

    fn plan(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> WaitPlan {
        self.meta
            .wait_plan("public gateway", zone, id, Domain::Gateway, ctx.timeout)
    }

    async fn wait_gateway(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> ScalewayResult<Gateway> {
        let api = &self.api;
        wait_for(ctx, &self.plan(ctx, zone, id), move || api.get_gateway(zone, id)).await
    }

    async fn create_gateway(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let zone = extract_zone(d, &self.meta.defaults)?.scope;
        let request = CreateGatewayRequest {
            name: name_or_random(d, "pgw"),
            gateway_type: d.get_string("type").unwrap_or_default().to_string(),
            project_id: extract_project_id(d, &self.meta.defaults),
            tags: d.get_string_list("tags"),
            ip_id: d.get_string("ip_id").map(|id| expand_id(id).to_string()),
            upstream_dns_servers: d.get_string_list("upstream_dns_servers"),
            enable_bastion: d.get_bool("bastion_enabled"),
        };

        let gateway = self.api.create_gateway(&zone, &request).await?;
        d.set_id(new_zoned_id(&zone, &gateway.id));
        log::info!("created {} {}", TYPE_NAME, d.id());

        self.wait_gateway(ctx, &zone, &gateway.id).await?;
        self.read_gateway(ctx, d).await
    }

    async fn read_gateway(&self, _ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let result = self.api.get_gateway(&zone, &id).await;
        let Some(gateway) = read_or_tombstone(d, result, GonePolicy::NotFound)? else {
            return Ok(Diagnostics::new());
        };

        flatten_model(&schema(), &gateway, d)?;
        if let Some(gateway_type) = &gateway.gateway_type {
            d.set("type", gateway_type.name.as_str());
        }
        if let Some(ip) = &gateway.ip {
            d.set("ip_id", flatten_zoned_id(&zone, &ip.id));
        }
        Ok(Diagnostics::new())
    }

    async fn update_gateway(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let request = UpdateGatewayRequest {
            name: d
                .has_change("name")
                .then(|| d.get_string("name").unwrap_or_default().to_string()),
            tags: Patch::<Vec<String>>::list_change(d, "tags"),
            upstream_dns_servers: Patch::<Vec<String>>::list_change(d, "upstream_dns_servers"),
            enable_bastion: d
                .has_change("bastion_enabled")
                .then(|| d.get_bool("bastion_enabled")),
        };

        if !request.is_empty() {
            self.wait_gateway(ctx, &zone, &id).await?;
            self.api.update_gateway(&zone, &id, &request).await?;
            self.wait_gateway(ctx, &zone, &id).await?;
        }

        self.read_gateway(ctx, d).await
    }

    async fn delete_gateway(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let plan = self.plan(ctx, &zone, &id);
        let api = &self.api;
        let (zone, id) = (&zone, id.as_str());

        if wait_for_optional(ctx, &plan, move || api.get_gateway(zone, id))
            .await?
            .is_none()
        {
            return Ok(Diagnostics::new());
        }

        ignore_not_found(self.api.delete_gateway(zone, id).await)?;
        wait_for_absence(ctx, &plan, move || api.get_gateway(zone, id)).await?;
        Ok(Diagnostics::new())
    }
}

#[async_trait]
impl ResourceContract for VpcPublicGatewayResource {
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
        let result = self.create_gateway(ctx, d).await;
        surface(d, result)
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.read_gateway(ctx, d).await;
        surface(d, result)
    }

    async fn update(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.update_gateway(ctx, d).await;
        surface(d, result)
    }

    async fn delete(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.delete_gateway(ctx, d).await;
        surface(d, result)
    }
}
