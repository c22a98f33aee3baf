//! scaleway_instance_volume - Block volume of the instance API

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{OperationContext, ProviderResult, ResourceContract, Timeouts};
use meridian_core::resource::ResourceData;
use meridian_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::api::InstanceApi;
use crate::api::instance::{CreateVolumeRequest, UpdateVolumeRequest, Volume};
use crate::envelope::{
    GonePolicy, Patch, default_timeouts, flatten_model, ignore_not_found, name_or_random, read_or_tombstone,
};
use crate::errors::{ScalewayError, ScalewayResult};
use crate::locality::{Zone, flatten_zoned_id, new_zoned_id, parse_zoned_id};
use crate::provider::Meta;
use crate::resources::{organization_id_attribute, project_id_attribute, surface, tags_attribute, zone_attribute};
use crate::scope::{extract_project_id, extract_zone};
use crate::waiter::{Domain, WaitPlan, wait_for, wait_for_absence, wait_for_optional};

pub const TYPE_NAME: &str = "scaleway_instance_volume";

const GB: u64 = 1_000_000_000;

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE_NAME)
        .with_description("Block volume for instances")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .optional()
                .computed()
                .with_description("The name of the volume")
                .with_api_field("name"),
        )
        .attribute(
            AttributeSchema::new("type", AttributeType::String)
                .required()
                .force_new()
                .with_description("The volume type")
                .with_api_field("volume_type"),
        )
        .attribute(
            AttributeSchema::new("size_in_gb", AttributeType::Int)
                .optional()
                .computed()
                .with_validator(types::positive_int)
                .with_description("The size of the volume in gigabytes"),
        )
        .attribute(
            AttributeSchema::new("server_id", AttributeType::String)
                .computed()
                .with_description("The server associated with this volume"),
        )
        .attribute(tags_attribute())
        .attribute(zone_attribute())
        .attribute(project_id_attribute("project"))
        .attribute(organization_id_attribute("organization"))
}

#[derive(Clone)]
pub struct InstanceVolumeResource {
    api: Arc<dyn InstanceApi>,
    meta: Arc<Meta>,
}

impl InstanceVolumeResource {
    pub fn new(api: Arc<dyn InstanceApi>, meta: Arc<Meta>) -> Self {
        Self { api, meta }
    }

    fn plan(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> WaitPlan {
        self.meta
            .wait_plan("volume", zone, id, Domain::Volume, ctx.timeout)
    }

    async fn wait_volume(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> ScalewayResult<Volume> {
        let api = &self.api;
        wait_for(ctx, &self.plan(ctx, zone, id), move || api.get_volume(zone, id)).await
    }

    async fn create_volume(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let zone = extract_zone(d, &self.meta.defaults)?.scope;
        let request = CreateVolumeRequest {
            name: name_or_random(d, "vol"),
            project: extract_project_id(d, &self.meta.defaults),
            volume_type: d.get_string("type").unwrap_or_default().to_string(),
            size: size_in_bytes(d)?,
            tags: d.get_string_list("tags"),
        };

        let volume = self.api.create_volume(&zone, &request).await?;
        d.set_id(new_zoned_id(&zone, &volume.id));
        log::info!("created {} {}", TYPE_NAME, d.id());

        self.wait_volume(ctx, &zone, &volume.id).await?;
        self.read_volume(ctx, d).await
    }

    pub(crate) async fn read_volume(&self, _ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let result = self.api.get_volume(&zone, &id).await;
        let Some(volume) = read_or_tombstone(d, result, GonePolicy::NotFound)? else {
            return Ok(Diagnostics::new());
        };

        flatten_model(&schema(), &volume, d)?;
        d.set("size_in_gb", (volume.size / GB) as i64);
        d.set(
            "server_id",
            volume
                .server
                .as_ref()
                .map(|server| flatten_zoned_id(&zone, &server.id))
                .unwrap_or_default(),
        );
        Ok(Diagnostics::new())
    }

    async fn update_volume(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        self.wait_volume(ctx, &zone, &id).await?;

        let mut request = UpdateVolumeRequest {
            name: d
                .has_change("name")
                .then(|| d.get_string("name").unwrap_or_default().to_string()),
            tags: Patch::<Vec<String>>::list_change(d, "tags"),
            size: None,
        };

        if d.has_change("size_in_gb") {
            let (old, new) = d.get_change("size_in_gb");
            let old = old.and_then(|v| v.as_int()).unwrap_or(0);
            let new = new.and_then(|v| v.as_int()).unwrap_or(0);
            if new < old {
                return Err(ScalewayError::InvalidInput(format!(
                    "block volumes cannot be resized down (from {} GB to {} GB)",
                    old, new
                )));
            }
            request.size = size_in_bytes(d)?;
        }

        if !request.is_empty() {
            self.api.update_volume(&zone, &id, &request).await?;
            self.wait_volume(ctx, &zone, &id).await?;
        }

        self.read_volume(ctx, d).await
    }

    async fn delete_volume(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let plan = self.plan(ctx, &zone, &id);
        let api = &self.api;
        let (zone, id) = (&zone, id.as_str());

        if wait_for_optional(ctx, &plan, move || api.get_volume(zone, id))
            .await?
            .is_none()
        {
            return Ok(Diagnostics::new());
        }

        ignore_not_found(self.api.delete_volume(zone, id).await)?;
        wait_for_absence(ctx, &plan, move || api.get_volume(zone, id)).await?;
        Ok(Diagnostics::new())
    }
}

/// Size request from `size_in_gb`
fn size_in_bytes(d: &ResourceData) -> ScalewayResult<Option<u64>> {
    match d.get_int("size_in_gb") {
        None | Some(0) => Ok(None),
        Some(gb) if gb > 0 => u64::try_from(gb)
            .ok()
            .and_then(|g| g.checked_mul(GB))
            .map(Some)
            .ok_or_else(|| ScalewayError::InvalidInput(format!("volume size {} GB is too large", gb))),
        Some(gb) => Err(ScalewayError::InvalidInput(format!("invalid volume size {} GB", gb))),
    }
}

#[async_trait]
impl ResourceContract for InstanceVolumeResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    fn timeouts(&self) -> Timeouts {
        default_timeouts(Domain::Volume)
    }

    async fn create(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.create_volume(ctx, d).await;
        surface(d, result)
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.read_volume(ctx, d).await;
        surface(d, result)
    }

    async fn update(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.update_volume(ctx, d).await;
        surface(d, result)
    }

    async fn delete(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.delete_volume(ctx, d).await;
        surface(d, result)
    }
}
