//! scaleway_vpc_private_network - Regional private network

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{OperationContext, ProviderResult, ResourceContract, Timeouts};
use meridian_core::resource::{ResourceData, Value};
use meridian_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types, validate_cidr};

use crate::api::VpcApi;
use crate::api::vpc::{CreatePrivateNetworkRequest, UpdatePrivateNetworkRequest};
use crate::envelope::{
    GonePolicy, Patch, default_timeouts, flatten_model, ignore_not_found, name_or_random, read_or_tombstone,
};
use crate::errors::ScalewayResult;
use crate::locality::{new_regional_id, parse_regional_id};
use crate::provider::Meta;
use crate::resources::{organization_id_attribute, project_id_attribute, region_attribute, surface, tags_attribute};
use crate::scope::{extract_project_id, extract_region};
use crate::waiter::Domain;

pub const TYPE_NAME: &str = "scaleway_vpc_private_network";

fn validate_subnets(value: &Value) -> Result<(), String> {
    for subnet in value.as_list().unwrap_or_default() {
        if let Some(cidr) = subnet.as_str() {
            validate_cidr(cidr)?;
        }
    }
    Ok(())
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE_NAME)
        .with_description("Private network shared by the zones of a region")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .optional()
                .computed()
                .with_description("The name of the private network")
                .with_api_field("name"),
        )
        .attribute(
            AttributeSchema::new("subnets", types::string_list())
                .optional()
                .computed()
                .force_new()
                .with_validator(validate_subnets)
                .with_description("The IPv4 subnets of the private network")
                .with_api_field("subnets"),
        )
        .attribute(
            AttributeSchema::new("created_at", AttributeType::String)
                .computed()
                .with_api_field("created_at"),
        )
        .attribute(
            AttributeSchema::new("updated_at", AttributeType::String)
                .computed()
                .with_api_field("updated_at"),
        )
        .attribute(tags_attribute())
        .attribute(region_attribute())
        .attribute(project_id_attribute("project_id"))
        .attribute(organization_id_attribute("organization_id"))
}

#[derive(Clone)]
pub struct VpcPrivateNetworkResource {
    api: Arc<dyn VpcApi>,
    meta: Arc<Meta>,
}

impl VpcPrivateNetworkResource {
    pub fn new(api: Arc<dyn VpcApi>, meta: Arc<Meta>) -> Self {
        Self { api, meta }
    }

    async fn create_private_network(
        &self,
        ctx: &OperationContext,
        d: &mut ResourceData,
    ) -> ScalewayResult<Diagnostics> {
        let region = extract_region(d, &self.meta.defaults)?.scope;
        let request = CreatePrivateNetworkRequest {
            name: name_or_random(d, "pn"),
            project_id: extract_project_id(d, &self.meta.defaults),
            tags: d.get_string_list("tags"),
            subnets: d.get_string_list("subnets"),
        };

        let pn = self.api.create_private_network(&region, &request).await?;
        d.set_id(new_regional_id(&region, &pn.id));
        log::info!("created {} {}", TYPE_NAME, d.id());

        self.read_private_network(ctx, d).await
    }

    pub(crate) async fn read_private_network(
        &self,
        _ctx: &OperationContext,
        d: &mut ResourceData,
    ) -> ScalewayResult<Diagnostics> {
        let (region, id) = parse_regional_id(d.id())?;
        let result = self.api.get_private_network(&region, &id).await;
        let Some(pn) = read_or_tombstone(d, result, GonePolicy::NotFound)? else {
            return Ok(Diagnostics::new());
        };

        flatten_model(&schema(), &pn, d)?;
        Ok(Diagnostics::new())
    }

    async fn update_private_network(
        &self,
        ctx: &OperationContext,
        d: &mut ResourceData,
    ) -> ScalewayResult<Diagnostics> {
        let (region, id) = parse_regional_id(d.id())?;
        let request = UpdatePrivateNetworkRequest {
            name: d
                .has_change("name")
                .then(|| d.get_string("name").unwrap_or_default().to_string()),
            tags: Patch::<Vec<String>>::list_change(d, "tags"),
        };

        if !request.is_empty() {
            self.api.update_private_network(&region, &id, &request).await?;
        }

        self.read_private_network(ctx, d).await
    }

    async fn delete_private_network(
        &self,
        _ctx: &OperationContext,
        d: &mut ResourceData,
    ) -> ScalewayResult<Diagnostics> {
        let (region, id) = parse_regional_id(d.id())?;
        ignore_not_found(self.api.delete_private_network(&region, &id).await)?;
        Ok(Diagnostics::new())
    }
}

#[async_trait]
impl ResourceContract for VpcPrivateNetworkResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    fn timeouts(&self) -> Timeouts {
        default_timeouts(Domain::Vpc)
    }

    async fn create(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.create_private_network(ctx, d).await;
        surface(d, result)
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.read_private_network(ctx, d).await;
        surface(d, result)
    }

    async fn update(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.update_private_network(ctx, d).await;
        surface(d, result)
    }

    async fn delete(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.delete_private_network(ctx, d).await;
        surface(d, result)
    }
}
