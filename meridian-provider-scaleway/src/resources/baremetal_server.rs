//! scaleway_baremetal_server - Elastic metal server, its installation and options

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{OperationContext, ProviderResult, ResourceContract, Timeouts};
use meridian_core::resource::{ResourceData, Value};
use meridian_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use crate::api::BaremetalApi;
use crate::api::baremetal::{
    CreateServerRequest, InstallServerRequest, Installing, Server, UpdateServerRequest,
};
use crate::diff_policy::{diff_suppress_func_locality, diff_suppress_func_time_rfc3339};
use crate::envelope::{
    GonePolicy, Patch, default_timeouts, diff_associations, expand_ids, flatten_model, guarded_change,
    ignore_not_found, name_or_random, read_or_tombstone,
};
use crate::errors::ScalewayResult;
use crate::locality::{Zone, expand_id, flatten_zoned_id, new_zoned_id, parse_zoned_id};
use crate::provider::Meta;
use crate::resources::{
    organization_id_attribute, project_id_attribute, reference_attribute, surface, tags_attribute, zone_attribute,
};
use crate::scope::{extract_project_id, extract_zone};
use crate::waiter::{Domain, WaitPlan, wait_for, wait_for_absence, wait_for_optional};

pub const TYPE_NAME: &str = "scaleway_baremetal_server";

const INSTALL_KEYS: [&str; 3] = ["os", "hostname", "ssh_key_ids"];

fn option_block() -> ResourceSchema {
    ResourceSchema::new("options")
        .attribute(
            reference_attribute("id")
                .required()
                .with_description("IDs of the options"),
        )
        .attribute(
            AttributeSchema::new("expires_at", AttributeType::String)
                .optional()
                .with_diff_suppress(diff_suppress_func_time_rfc3339)
                .with_description("Auto expire the option after this date"),
        )
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .computed()
                .with_description("name of the option"),
        )
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE_NAME)
        .with_description("Elastic metal server")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .optional()
                .computed()
                .with_description("Name of the server")
                .with_api_field("name"),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .optional()
                .with_description("Some description to associate to the server, max 255 characters")
                .with_api_field("description"),
        )
        .attribute(
            reference_attribute("offer")
                .required()
                .force_new()
                .with_description("ID of the server type"),
        )
        .attribute(
            reference_attribute("os")
                .optional()
                .with_description("The base image of the server"),
        )
        .attribute(
            AttributeSchema::new("hostname", AttributeType::String)
                .optional()
                .computed()
                .with_description("Hostname of the server"),
        )
        .attribute(
            AttributeSchema::new("ssh_key_ids", types::string_list())
                .optional()
                .with_diff_suppress(diff_suppress_func_locality)
                .with_description("Array of SSH key IDs allowed to SSH to the server"),
        )
        .attribute(
            AttributeSchema::new("reinstall_on_config_changes", AttributeType::Bool)
                .optional()
                .with_default(false)
                .with_description("Allow reinstalling the server when its install settings change"),
        )
        .attribute(
            AttributeSchema::new("options", AttributeType::list_of(option_block()))
                .optional()
                .with_description("The options to enable on server"),
        )
        .attribute(tags_attribute())
        .attribute(zone_attribute())
        .attribute(project_id_attribute("project_id"))
        .attribute(organization_id_attribute("organization_id"))
}

/// `(option id, expiry)` of every configured option
fn option_requests(value: Option<&Value>) -> Vec<(String, Option<String>)> {
    value
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_map)
        .filter_map(|block| {
            let id = block.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?;
            let expires_at = block
                .get("expires_at")
                .and_then(Value::as_str)
                .filter(|at| !at.is_empty())
                .map(str::to_string);
            Some((id.to_string(), expires_at))
        })
        .collect()
}

fn expiry_changed(old: Option<&str>, new: Option<&str>) -> bool {
    match (old, new) {
        (None, None) => false,
        (Some(old), Some(new)) => {
            old != new && !diff_suppress_func_time_rfc3339("expires_at", &Value::from(old), &Value::from(new))
        }
        _ => true,
    }
}

#[derive(Clone)]
pub struct BaremetalServerResource {
    api: Arc<dyn BaremetalApi>,
    meta: Arc<Meta>,
}

impl BaremetalServerResource {
    pub fn new(api: Arc<dyn BaremetalApi>, meta: Arc<Meta>) -> Self {
        Self { api, meta }
    }

    fn plan(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> WaitPlan {
        self.meta
            .wait_plan("baremetal server", zone, id, Domain::Baremetal, ctx.timeout)
    }

    async fn wait_server(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> ScalewayResult<Server> {
        let api = &self.api;
        wait_for(ctx, &self.plan(ctx, zone, id), move || api.get_server(zone, id)).await
    }

    async fn wait_installation(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> ScalewayResult<Server> {
        let api = &self.api;
        let plan = self
            .meta
            .wait_plan("baremetal installation", zone, id, Domain::Baremetal, ctx.timeout);
        let installing = wait_for(ctx, &plan, move || async move {
            api.get_server(zone, id).await.map(Installing)
        })
        .await?;
        Ok(installing.0)
    }

    /// Install the configured OS, naming the host after the server unless `hostname` is set
    async fn install(
        &self,
        ctx: &OperationContext,
        d: &ResourceData,
        zone: &Zone,
        server: &Server,
    ) -> ScalewayResult<()> {
        let id = server.id.as_str();
        let request = InstallServerRequest {
            os_id: expand_id(d.get_string("os").unwrap_or_default()).to_string(),
            hostname: d.get_string("hostname").unwrap_or(&server.name).to_string(),
            ssh_key_ids: expand_ids(&d.get_string_list("ssh_key_ids")),
        };
        self.api.install_server(zone, id, &request).await?;
        log::info!("installing {} on baremetal server {}", request.os_id, id);
        self.wait_installation(ctx, zone, id).await?;
        Ok(())
    }

    async fn add_options(&self, zone: &Zone, id: &str, options: &[(String, Option<String>)]) -> ScalewayResult<()> {
        for (option_id, expires_at) in options {
            self.api
                .add_option(zone, id, expand_id(option_id), expires_at.as_deref())
                .await?;
        }
        Ok(())
    }

    async fn create_server(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let zone = extract_zone(d, &self.meta.defaults)?.scope;
        let request = CreateServerRequest {
            offer_id: expand_id(d.get_string("offer").unwrap_or_default()).to_string(),
            name: name_or_random(d, "bm"),
            description: d.get_string("description").unwrap_or_default().to_string(),
            project_id: extract_project_id(d, &self.meta.defaults),
            tags: d.get_string_list("tags"),
            option_ids: Vec::new(),
        };

        let server = self.api.create_server(&zone, &request).await?;
        d.set_id(new_zoned_id(&zone, &server.id));
        log::info!("created {} {}", TYPE_NAME, d.id());

        let server = self.wait_server(ctx, &zone, &server.id).await?;

        if d.get_string("os").is_some() {
            self.install(ctx, d, &zone, &server).await?;
        }

        let options = option_requests(d.get("options"));
        if !options.is_empty() {
            self.add_options(&zone, &server.id, &options).await?;
            self.wait_server(ctx, &zone, &server.id).await?;
        }

        self.read_server(ctx, d).await
    }

    async fn read_server(&self, _ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let result = self.api.get_server(&zone, &id).await;
        let Some(server) = read_or_tombstone(d, result, GonePolicy::NotFound)? else {
            return Ok(Diagnostics::new());
        };

        flatten_model(&schema(), &server, d)?;
        d.set("offer", flatten_zoned_id(&zone, &server.offer_id));

        if let Some(install) = &server.install {
            d.set("os", flatten_zoned_id(&zone, &install.os_id));
            d.set("hostname", install.hostname.as_str());
            d.set("ssh_key_ids", install.ssh_key_ids.clone());
        }

        let options = server
            .options
            .iter()
            .map(|option| {
                let block: HashMap<String, Value> = [
                    ("id".to_string(), Value::from(flatten_zoned_id(&zone, &option.id))),
                    ("name".to_string(), Value::from(option.name.as_str())),
                    (
                        "expires_at".to_string(),
                        Value::from(option.expires_at.clone().unwrap_or_default()),
                    ),
                ]
                .into_iter()
                .collect();
                Value::Map(block)
            })
            .collect();
        d.set("options", Value::List(options));
        Ok(Diagnostics::new())
    }

    async fn update_server(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let mut diags = Diagnostics::new();
        let server = self.wait_server(ctx, &zone, &id).await?;

        let request = UpdateServerRequest {
            name: d
                .has_change("name")
                .then(|| d.get_string("name").unwrap_or_default().to_string()),
            description: Patch::<String>::string_change(d, "description"),
            tags: Patch::<Vec<String>>::list_change(d, "tags"),
        };
        if !request.is_empty() {
            self.api.update_server(&zone, &id, &request).await?;
        }

        if d.has_changes(&INSTALL_KEYS) {
            match guarded_change(d, &INSTALL_KEYS, "reinstall_on_config_changes", "be reinstalled") {
                Some(warning) => diags.push(warning),
                None => self.install(ctx, d, &zone, &server).await?,
            }
        }

        if d.has_change("options") {
            let (old, new) = d.get_change("options");
            let (old, new) = (option_requests(old), option_requests(new));
            let current: Vec<String> = old.iter().map(|(id, _)| id.clone()).collect();
            let desired: Vec<String> = new.iter().map(|(id, _)| id.clone()).collect();
            let (mut to_delete, mut to_add) = diff_associations(&current, &desired);

            // A kept option with a new expiry is removed and added again
            for (option_id, expires_at) in &new {
                let previous = old
                    .iter()
                    .find(|(old_id, _)| expand_id(old_id) == expand_id(option_id));
                if let Some((old_id, old_expiry)) = previous
                    && expiry_changed(old_expiry.as_deref(), expires_at.as_deref())
                {
                    to_delete.push(old_id.clone());
                    to_add.push(option_id.clone());
                }
            }

            if !to_delete.is_empty() {
                for option_id in &to_delete {
                    ignore_not_found(self.api.delete_option(&zone, &id, expand_id(option_id)).await)?;
                }
                self.wait_server(ctx, &zone, &id).await?;
            }

            let to_add: Vec<(String, Option<String>)> = new
                .into_iter()
                .filter(|(option_id, _)| to_add.contains(option_id))
                .collect();
            if !to_add.is_empty() {
                self.add_options(&zone, &id, &to_add).await?;
                self.wait_server(ctx, &zone, &id).await?;
            }
        }

        diags.extend(self.read_server(ctx, d).await?);
        Ok(diags)
    }

    async fn delete_server(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let plan = self.plan(ctx, &zone, &id);
        let api = &self.api;
        let (zone, id) = (&zone, id.as_str());

        if wait_for_optional(ctx, &plan, move || api.get_server(zone, id))
            .await?
            .is_none()
        {
            return Ok(Diagnostics::new());
        }

        ignore_not_found(self.api.delete_server(zone, id).await)?;
        wait_for_absence(ctx, &plan, move || api.get_server(zone, id)).await?;
        Ok(Diagnostics::new())
    }
}

#[async_trait]
impl ResourceContract for BaremetalServerResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    fn timeouts(&self) -> Timeouts {
        default_timeouts(Domain::Baremetal)
    }

    async fn create(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.create_server(ctx, d).await;
        surface(d, result)
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.read_server(ctx, d).await;
        surface(d, result)
    }

    async fn update(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.update_server(ctx, d).await;
        surface(d, result)
    }

    async fn delete(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.delete_server(ctx, d).await;
        surface(d, result)
    }
}
