//! scaleway_lb - Load balancer with its private network attachments

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{CustomizeDiffFn, OperationContext, ProviderResult, ResourceContract, Timeouts};
use meridian_core::resource::{ResourceData, Value};
use meridian_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::api::LbApi;
use crate::api::lb::{CreateLbRequest, Lb, LbPrivateNetworks, UpdateLbRequest};
use crate::diff_policy::{customize_diff_locality_check, diff_suppress_func_ignore_case};
use crate::envelope::{
    GonePolicy, Patch, default_timeouts, diff_associations, flatten_model, guarded_change, ignore_not_found,
    name_or_random, read_or_tombstone,
};
use crate::errors::ScalewayResult;
use crate::locality::{Zone, expand_id, flatten_regional_id, flatten_zoned_id, new_zoned_id, parse_zoned_id};
use crate::provider::Meta;
use crate::resources::{
    organization_id_attribute, project_id_attribute, reference_attribute, surface, tags_attribute, zone_attribute,
};
use crate::scope::{extract_project_id, extract_zone};
use crate::waiter::{Domain, WaitPlan, wait_for, wait_for_absence, wait_for_optional};

pub const TYPE_NAME: &str = "scaleway_lb";

const DEFAULT_SSL_COMPATIBILITY_LEVEL: &str = "ssl_compatibility_level_intermediate";

fn private_network_block() -> ResourceSchema {
    ResourceSchema::new("private_network")
        .attribute(
            reference_attribute("private_network_id")
                .required()
                .with_description("The Private Network ID"),
        )
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_description("The status of private network connection"),
        )
}

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE_NAME)
        .with_description("Load balancer")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .optional()
                .computed()
                .with_description("Name of the lb")
                .with_api_field("name"),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .optional()
                .with_description("The description of the lb")
                .with_api_field("description"),
        )
        .attribute(
            AttributeSchema::new("type", AttributeType::String)
                .required()
                .with_diff_suppress(diff_suppress_func_ignore_case)
                .with_description("The type of load-balancer you want to create")
                .with_api_field("type"),
        )
        .attribute(
            AttributeSchema::new("migrate_on_type_change", AttributeType::Bool)
                .optional()
                .with_default(false)
                .with_description("Migrate the load-balancer when its type changes"),
        )
        .attribute(
            reference_attribute("ip_id")
                .optional()
                .computed()
                .force_new()
                .with_description("The load-balance public IP ID"),
        )
        .attribute(
            AttributeSchema::new("ip_address", AttributeType::String)
                .computed()
                .with_description("The load-balance public IP address"),
        )
        .attribute(
            AttributeSchema::new("ssl_compatibility_level", AttributeType::String)
                .optional()
                .with_default(DEFAULT_SSL_COMPATIBILITY_LEVEL)
                .with_description("Enforces minimal SSL version (in SSL/TLS offloading context)")
                .with_api_field("ssl_compatibility_level"),
        )
        .attribute(
            AttributeSchema::new("private_network", AttributeType::list_of(private_network_block()))
                .optional()
                .with_description("List of private networks connected to your load balancer"),
        )
        .attribute(tags_attribute())
        .attribute(zone_attribute())
        .attribute(project_id_attribute("project_id"))
        .attribute(organization_id_attribute("organization_id"))
}

/// Private network identifiers of a `private_network` block list
fn private_network_ids(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_list)
        .unwrap_or_default()
        .iter()
        .filter_map(Value::as_map)
        .filter_map(|block| block.get("private_network_id").and_then(Value::as_str))
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Clone)]
pub struct LbResource {
    api: Arc<dyn LbApi>,
    meta: Arc<Meta>,
}

impl LbResource {
    pub fn new(api: Arc<dyn LbApi>, meta: Arc<Meta>) -> Self {
        Self { api, meta }
    }

    fn plan(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> WaitPlan {
        self.meta.wait_plan("lb", zone, id, Domain::Lb, ctx.timeout)
    }

    async fn wait_lb(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> ScalewayResult<Lb> {
        let api = &self.api;
        wait_for(ctx, &self.plan(ctx, zone, id), move || api.get_lb(zone, id)).await
    }

    async fn wait_private_networks(
        &self,
        ctx: &OperationContext,
        zone: &Zone,
        id: &str,
    ) -> ScalewayResult<LbPrivateNetworks> {
        let api = &self.api;
        let plan = self
            .meta
            .wait_plan("lb private networks", zone, id, Domain::Lb, ctx.timeout);
        wait_for(ctx, &plan, move || api.list_lb_private_networks(zone, id)).await
    }

    async fn attach(&self, zone: &Zone, id: &str, private_network_ids: &[String]) -> ScalewayResult<()> {
        for pn_id in private_network_ids {
            self.api
                .attach_private_network(zone, id, expand_id(pn_id))
                .await?;
            log::info!("attached private network {} to lb {}", pn_id, id);
        }
        Ok(())
    }

    async fn detach(&self, zone: &Zone, id: &str, private_network_ids: &[String]) -> ScalewayResult<()> {
        for pn_id in private_network_ids {
            ignore_not_found(
                self.api
                    .detach_private_network(zone, id, expand_id(pn_id))
                    .await,
            )?;
            log::info!("detached private network {} from lb {}", pn_id, id);
        }
        Ok(())
    }

    async fn create_lb(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let zone = extract_zone(d, &self.meta.defaults)?.scope;
        let request = CreateLbRequest {
            name: name_or_random(d, "lb"),
            description: d.get_string("description").unwrap_or_default().to_string(),
            lb_type: d.get_string("type").unwrap_or_default().to_string(),
            project_id: extract_project_id(d, &self.meta.defaults),
            ip_id: d.get_string("ip_id").map(|id| expand_id(id).to_string()),
            tags: d.get_string_list("tags"),
            ssl_compatibility_level: d.get_string("ssl_compatibility_level").map(str::to_string),
        };

        let lb = self.api.create_lb(&zone, &request).await?;
        d.set_id(new_zoned_id(&zone, &lb.id));
        log::info!("created {} {}", TYPE_NAME, d.id());

        self.wait_lb(ctx, &zone, &lb.id).await?;

        let private_networks = private_network_ids(d.get("private_network"));
        if !private_networks.is_empty() {
            self.attach(&zone, &lb.id, &private_networks).await?;
            self.wait_private_networks(ctx, &zone, &lb.id).await?;
        }

        self.read_lb(ctx, d).await
    }

    pub(crate) async fn read_lb(&self, _ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let result = self.api.get_lb(&zone, &id).await;
        let Some(lb) = read_or_tombstone(d, result, GonePolicy::NotFound)? else {
            return Ok(Diagnostics::new());
        };

        flatten_model(&schema(), &lb, d)?;
        if let Some(ip) = lb.ip.first() {
            d.set("ip_id", flatten_zoned_id(&zone, &ip.id));
            d.set("ip_address", ip.ip_address.as_str());
        }

        let region = zone.region();
        let attachments = self.api.list_lb_private_networks(&zone, &id).await?;
        let blocks = attachments
            .0
            .iter()
            .map(|pn| {
                let block: HashMap<String, Value> = [
                    (
                        "private_network_id".to_string(),
                        Value::from(flatten_regional_id(&region, &pn.private_network_id)),
                    ),
                    ("status".to_string(), Value::from(pn.status.as_str())),
                ]
                .into_iter()
                .collect();
                Value::Map(block)
            })
            .collect();
        d.set("private_network", Value::List(blocks));
        Ok(Diagnostics::new())
    }

    async fn update_lb(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let mut diags = Diagnostics::new();
        self.wait_lb(ctx, &zone, &id).await?;

        let request = UpdateLbRequest {
            name: d
                .has_change("name")
                .then(|| d.get_string("name").unwrap_or_default().to_string()),
            description: Patch::<String>::string_change(d, "description"),
            tags: Patch::<Vec<String>>::list_change(d, "tags"),
            ssl_compatibility_level: d
                .has_change("ssl_compatibility_level")
                .then(|| d.get_string("ssl_compatibility_level").unwrap_or_default().to_string()),
        };
        if !request.is_empty() {
            self.api.update_lb(&zone, &id, &request).await?;
            self.wait_lb(ctx, &zone, &id).await?;
        }

        if d.has_change("type") {
            match guarded_change(d, &["type"], "migrate_on_type_change", "be migrated") {
                Some(warning) => diags.push(warning),
                None => {
                    let lb_type = d.get_string("type").unwrap_or_default().to_string();
                    self.api.migrate_lb(&zone, &id, &lb_type).await?;
                    log::info!("migrating {} {} to {}", TYPE_NAME, d.id(), lb_type);
                    self.wait_lb(ctx, &zone, &id).await?;
                }
            }
        }

        if d.has_change("private_network") {
            let (old, new) = d.get_change("private_network");
            let (to_detach, to_attach) = diff_associations(&private_network_ids(old), &private_network_ids(new));

            // Detach first: a network can only be attached once
            if !to_detach.is_empty() {
                self.detach(&zone, &id, &to_detach).await?;
                self.wait_private_networks(ctx, &zone, &id).await?;
            }
            if !to_attach.is_empty() {
                self.attach(&zone, &id, &to_attach).await?;
                self.wait_private_networks(ctx, &zone, &id).await?;
            }
        }

        diags.extend(self.read_lb(ctx, d).await?);
        Ok(diags)
    }

    async fn delete_lb(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let plan = self.plan(ctx, &zone, &id);
        let api = &self.api;

        {
            let (zone, id) = (&zone, id.as_str());
            if wait_for_optional(ctx, &plan, move || api.get_lb(zone, id))
                .await?
                .is_none()
            {
                return Ok(Diagnostics::new());
            }
        }

        // The API refuses to delete a load balancer with attachments
        let attached = self.api.list_lb_private_networks(&zone, &id).await?.ids();
        if !attached.is_empty() {
            self.detach(&zone, &id, &attached).await?;
            self.wait_private_networks(ctx, &zone, &id).await?;
        }

        let (zone, id) = (&zone, id.as_str());
        ignore_not_found(self.api.delete_lb(zone, id).await)?;
        wait_for_absence(ctx, &plan, move || api.get_lb(zone, id)).await?;
        Ok(Diagnostics::new())
    }
}

#[async_trait]
impl ResourceContract for LbResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    fn timeouts(&self) -> Timeouts {
        default_timeouts(Domain::Lb)
    }

    fn customize_diff(&self) -> Vec<CustomizeDiffFn> {
        vec![customize_diff_locality_check(
            &["ip_id", "private_network.#.private_network_id"],
            self.meta.defaults.clone(),
        )]
    }

    async fn create(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.create_lb(ctx, d).await;
        surface(d, result)
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.read_lb(ctx, d).await;
        surface(d, result)
    }

    async fn update(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.update_lb(ctx, d).await;
        surface(d, result)
    }

    async fn delete(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.delete_lb(ctx, d).await;
        surface(d, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::differ::{Diff, plan};
    use meridian_core::provider::Operation;

    use crate::test_support::{FakeCloud, attrs, changed, ctx, meta, persisted, planned};

    fn resource(cloud: &Arc<FakeCloud>) -> LbResource {
        LbResource::new(cloud.clone(), meta())
    }

    fn private_networks(ids: &[&str]) -> Value {
        Value::List(
            ids.iter()
                .map(|id| {
                    Value::Map(
                        [("private_network_id".to_string(), Value::from(*id))]
                            .into_iter()
                            .collect(),
                    )
                })
                .collect(),
        )
    }

    async fn created(cloud: &Arc<FakeCloud>, pairs: Vec<(&str, Value)>) -> ResourceData {
        let mut d = planned(TYPE_NAME, pairs);
        schema().apply_defaults(&mut d);
        resource(cloud).create(&ctx(Operation::Create), &mut d).await.unwrap();
        d
    }

    #[test]
    fn foreign_ip_is_rejected_at_plan_time() {
        let cloud = FakeCloud::new();
        let config = attrs(vec![
            ("type", Value::from("LB-S")),
            ("ip_id", Value::from("nl-ams-1/11111111-1111-1111-1111-111111111111")),
        ]);

        let err = plan(&resource(&cloud), None, &config).unwrap_err();
        assert!(err.message.contains("different locality"));
        assert!(err.message.contains("fr-par-1"));
        assert_eq!(cloud.calls_starting_with(""), 0);
    }

    #[test]
    fn regional_private_network_is_accepted_in_its_zones() {
        let cloud = FakeCloud::new();
        let config = attrs(vec![
            ("type", Value::from("LB-S")),
            ("ip_id", Value::from("fr-par-1/11111111-1111-1111-1111-111111111111")),
            ("private_network", private_networks(&["fr-par/22222222-2222-2222-2222-222222222222"])),
        ]);
        let change = plan(&resource(&cloud), None, &config).unwrap();
        assert_eq!(change.diff, Diff::Create);

        let config = attrs(vec![
            ("type", Value::from("LB-S")),
            ("private_network", private_networks(&["nl-ams/22222222-2222-2222-2222-222222222222"])),
        ]);
        let err = plan(&resource(&cloud), None, &config).unwrap_err();
        assert!(err.message.contains("private_network.#.private_network_id"));
    }

    #[tokio::test]
    async fn type_case_is_not_a_change() {
        let cloud = FakeCloud::new();
        let d = created(&cloud, vec![("type", Value::from("lb-s"))]).await;
        assert_eq!(d.get_string("type"), Some("LB-S"));

        let mut config = attrs(vec![("type", Value::from("lb-s"))]);
        config.insert("name".to_string(), d.get("name").unwrap().clone());
        config.insert("migrate_on_type_change".to_string(), Value::Bool(false));
        config.insert(
            "ssl_compatibility_level".to_string(),
            Value::from(DEFAULT_SSL_COMPATIBILITY_LEVEL),
        );
        let change = plan(&resource(&cloud), Some(&d), &config).unwrap();
        assert_eq!(change.diff, Diff::NoChange);
    }

    #[tokio::test]
    async fn type_change_without_guard_warns_and_skips_migration() {
        let cloud = FakeCloud::new();
        let d = created(&cloud, vec![("type", Value::from("LB-S"))]).await;

        let mut d = changed(&d, vec![("type", Value::from("LB-GP-M"))]);
        let diags = resource(&cloud).update(&ctx(Operation::Update), &mut d).await.unwrap();
        assert_eq!(diags.warnings().count(), 1);
        assert_eq!(
            diags.iter().next().unwrap().attribute.as_deref(),
            Some("migrate_on_type_change")
        );
        assert_eq!(cloud.calls("migrate_lb"), 0);
        assert_eq!(d.get_string("type"), Some("LB-S"));
    }

    #[tokio::test]
    async fn type_change_with_guard_migrates() {
        let cloud = FakeCloud::new();
        let d = created(&cloud, vec![("type", Value::from("LB-S"))]).await;

        let mut d = changed(
            &d,
            vec![
                ("type", Value::from("LB-GP-M")),
                ("migrate_on_type_change", Value::Bool(true)),
            ],
        );
        let diags = resource(&cloud).update(&ctx(Operation::Update), &mut d).await.unwrap();
        assert!(diags.is_empty());
        assert_eq!(cloud.calls("migrate_lb"), 1);
        assert_eq!(d.get_string("type"), Some("LB-GP-M"));
    }

    #[tokio::test]
    async fn private_networks_are_swapped_detach_first() {
        let cloud = FakeCloud::new();
        let a = cloud.insert_private_network("fr-par", "a");
        let b = cloud.insert_private_network("fr-par", "b");
        let d = created(
            &cloud,
            vec![
                ("type", Value::from("LB-S")),
                ("private_network", private_networks(&[&format!("fr-par/{}", a.id)])),
            ],
        )
        .await;
        assert_eq!(private_network_ids(d.get("private_network")), vec![format!("fr-par/{}", a.id)]);

        // Unscoped in configuration, scoped in state
        let mut d = changed(&d, vec![("private_network", private_networks(&[&b.id]))]);
        resource(&cloud).update(&ctx(Operation::Update), &mut d).await.unwrap();

        assert_eq!(cloud.calls("detach_private_network"), 1);
        assert_eq!(cloud.calls("attach_private_network"), 2);
        assert_eq!(private_network_ids(d.get("private_network")), vec![format!("fr-par/{}", b.id)]);
    }

    #[tokio::test]
    async fn delete_detaches_before_deleting() {
        let cloud = FakeCloud::new();
        let pn = cloud.insert_private_network("fr-par", "a");
        let d = created(
            &cloud,
            vec![
                ("type", Value::from("LB-S")),
                ("private_network", private_networks(&[&pn.id])),
            ],
        )
        .await;

        resource(&cloud).delete(&ctx(Operation::Delete), &mut persisted(&d)).await.unwrap();
        assert_eq!(cloud.calls("detach_private_network"), 1);
        assert!(cloud.lbs.lock().unwrap().is_empty());
    }
}
