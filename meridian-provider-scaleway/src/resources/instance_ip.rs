//! scaleway_instance_ip - Flexible IP of the instance API

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{OperationContext, ProviderResult, ResourceContract, Timeouts};
use meridian_core::resource::ResourceData;
use meridian_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::api::InstanceApi;
use crate::api::instance::{CreateIpRequest, Ip, UpdateIpRequest};
use crate::envelope::{
    GonePolicy, Patch, default_timeouts, downgrade_to_warning, flatten_model, ignore_not_found, read_or_tombstone,
    retry_update_reverse,
};
use crate::errors::{ErrorKind, ScalewayResult};
use crate::locality::{Zone, flatten_zoned_id, new_zoned_id, parse_zoned_id};
use crate::provider::Meta;
use crate::resources::{organization_id_attribute, project_id_attribute, surface, tags_attribute, zone_attribute};
use crate::scope::{extract_project_id, extract_zone};
use crate::waiter::Domain;

pub const TYPE_NAME: &str = "scaleway_instance_ip";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE_NAME)
        .with_description("Flexible IP address attached to instances")
        .attribute(
            AttributeSchema::new("address", AttributeType::String)
                .computed()
                .with_description("The IP address")
                .with_api_field("address"),
        )
        .attribute(
            AttributeSchema::new("reverse", AttributeType::String)
                .optional()
                .computed()
                .with_description("The reverse DNS for this IP"),
        )
        .attribute(
            AttributeSchema::new("server_id", AttributeType::String)
                .computed()
                .with_description("The server associated with this IP"),
        )
        .attribute(tags_attribute())
        .attribute(zone_attribute())
        .attribute(project_id_attribute("project"))
        .attribute(organization_id_attribute("organization"))
}

#[derive(Clone)]
pub struct InstanceIpResource {
    api: Arc<dyn InstanceApi>,
    meta: Arc<Meta>,
}

impl InstanceIpResource {
    pub fn new(api: Arc<dyn InstanceApi>, meta: Arc<Meta>) -> Self {
        Self { api, meta }
    }

    async fn create_ip(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let zone = extract_zone(d, &self.meta.defaults)?.scope;
        let request = CreateIpRequest {
            project: extract_project_id(d, &self.meta.defaults),
            tags: d.get_string_list("tags"),
        };

        let ip = self.api.create_ip(&zone, &request).await?;
        d.set_id(new_zoned_id(&zone, &ip.id));
        log::info!("created {} {}", TYPE_NAME, d.id());

        if let Some(reverse) = d.get_string("reverse") {
            let request = UpdateIpRequest {
                reverse: Patch::Set(reverse.to_string()),
                ..UpdateIpRequest::default()
            };
            self.update_reverse(ctx, &zone, &ip.id, &request).await?;
        }

        self.read_ip(ctx, d).await
    }

    pub(crate) async fn read_ip(&self, _ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let result = self.api.get_ip(&zone, &id).await;
        let Some(ip) = read_or_tombstone(d, result, GonePolicy::NotFoundOrForbidden)? else {
            return Ok(Diagnostics::new());
        };
        flatten_ip(&zone, &ip, d)?;
        Ok(Diagnostics::new())
    }

    async fn update_ip(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let request = UpdateIpRequest {
            reverse: Patch::<String>::string_change(d, "reverse"),
            tags: Patch::<Vec<String>>::list_change(d, "tags"),
        };

        if !request.is_empty() {
            self.update_reverse(ctx, &zone, &id, &request).await?;
        }

        self.read_ip(ctx, d).await
    }

    async fn delete_ip(&self, _ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let mut diags = Diagnostics::new();

        let result = ignore_not_found(self.api.delete_ip(&zone, &id).await);
        downgrade_to_warning(
            result,
            &[ErrorKind::Forbidden, ErrorKind::Conflict, ErrorKind::PreconditionFailed],
            "IP was not released",
            &mut diags,
        )?;
        Ok(diags)
    }

    /// Send the update, waiting for a new reverse DNS record to resolve
    async fn update_reverse(
        &self,
        ctx: &OperationContext,
        zone: &Zone,
        id: &str,
        request: &UpdateIpRequest,
    ) -> ScalewayResult<()> {
        let api = &self.api;
        retry_update_reverse(
            ctx,
            move || async move { api.update_ip(zone, id, request).await.map(|_| ()) },
            ctx.timeout,
            self.meta.poll_interval(Domain::Instance),
        )
        .await
    }
}

fn flatten_ip(zone: &Zone, ip: &Ip, d: &mut ResourceData) -> ScalewayResult<()> {
    flatten_model(&schema(), ip, d)?;
    d.set("reverse", ip.reverse.clone().unwrap_or_default());
    d.set(
        "server_id",
        ip.server
            .as_ref()
            .map(|server| flatten_zoned_id(zone, &server.id))
            .unwrap_or_default(),
    );
    Ok(())
}

#[async_trait]
impl ResourceContract for InstanceIpResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    fn timeouts(&self) -> Timeouts {
        default_timeouts(Domain::Instance)
    }

    async fn create(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.create_ip(ctx, d).await;
        surface(d, result)
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.read_ip(ctx, d).await;
        surface(d, result)
    }

    async fn update(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.update_ip(ctx, d).await;
        surface(d, result)
    }

    async fn delete(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.delete_ip(ctx, d).await;
        surface(d, result)
    }
}
