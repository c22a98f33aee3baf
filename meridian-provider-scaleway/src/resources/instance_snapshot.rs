//! scaleway_instance_snapshot - Snapshot of an instance volume

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{OperationContext, ProviderResult, ResourceContract, Timeouts};
use meridian_core::resource::ResourceData;
use meridian_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::api::InstanceApi;
use crate::api::instance::{CreateSnapshotRequest, Snapshot, UpdateSnapshotRequest};
use crate::envelope::{
    GonePolicy, Patch, default_timeouts, flatten_model, ignore_not_found, name_or_random, read_or_tombstone,
};
use crate::errors::ScalewayResult;
use crate::locality::{Zone, expand_id, flatten_zoned_id, new_zoned_id, parse_zoned_id};
use crate::provider::Meta;
use crate::resources::{
    organization_id_attribute, project_id_attribute, reference_attribute, surface, tags_attribute, zone_attribute,
};
use crate::scope::{extract_project_id, extract_zone};
use crate::waiter::{Domain, WaitPlan, wait_for, wait_for_absence, wait_for_optional};

pub const TYPE_NAME: &str = "scaleway_instance_snapshot";

pub fn schema() -> ResourceSchema {
    ResourceSchema::new(TYPE_NAME)
        .with_description("Snapshot of an instance volume")
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .optional()
                .computed()
                .with_description("The name of the snapshot")
                .with_api_field("name"),
        )
        .attribute(
            reference_attribute("volume_id")
                .required()
                .force_new()
                .with_description("ID of the volume to take a snapshot from"),
        )
        .attribute(
            AttributeSchema::new("type", AttributeType::String)
                .computed()
                .with_description("The snapshot's volume type")
                .with_api_field("volume_type"),
        )
        .attribute(
            AttributeSchema::new("size_in_gb", AttributeType::Int)
                .computed()
                .with_description("The size of the snapshot in gigabytes"),
        )
        .attribute(
            AttributeSchema::new("created_at", AttributeType::String)
                .computed()
                .with_description("The date and time of the creation of the snapshot")
                .with_api_field("creation_date"),
        )
        .attribute(tags_attribute())
        .attribute(zone_attribute())
        .attribute(project_id_attribute("project"))
        .attribute(organization_id_attribute("organization"))
}

#[derive(Clone)]
pub struct InstanceSnapshotResource {
    api: Arc<dyn InstanceApi>,
    meta: Arc<Meta>,
}

impl InstanceSnapshotResource {
    pub fn new(api: Arc<dyn InstanceApi>, meta: Arc<Meta>) -> Self {
        Self { api, meta }
    }

    fn plan(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> WaitPlan {
        self.meta
            .wait_plan("snapshot", zone, id, Domain::Snapshot, ctx.timeout)
    }

    async fn wait_snapshot(&self, ctx: &OperationContext, zone: &Zone, id: &str) -> ScalewayResult<Snapshot> {
        let api = &self.api;
        wait_for(ctx, &self.plan(ctx, zone, id), move || api.get_snapshot(zone, id)).await
    }

    async fn create_snapshot(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let zone = extract_zone(d, &self.meta.defaults)?.scope;
        let volume_id = expand_id(d.get_string("volume_id").unwrap_or_default()).to_string();

        // A snapshot can only be taken from a volume at rest
        let api = &self.api;
        let volume_plan = self
            .meta
            .wait_plan("volume", &zone, &volume_id, Domain::Volume, ctx.timeout);
        let (zone_ref, volume_ref) = (&zone, volume_id.as_str());
        wait_for(ctx, &volume_plan, move || api.get_volume(zone_ref, volume_ref)).await?;

        let request = CreateSnapshotRequest {
            name: name_or_random(d, "snp"),
            volume_id,
            project: extract_project_id(d, &self.meta.defaults),
            tags: d.get_string_list("tags"),
        };
        let snapshot = self.api.create_snapshot(&zone, &request).await?;
        d.set_id(new_zoned_id(&zone, &snapshot.id));
        log::info!("created {} {}", TYPE_NAME, d.id());

        self.wait_snapshot(ctx, &zone, &snapshot.id).await?;
        self.read_snapshot(ctx, d).await
    }

    async fn read_snapshot(&self, _ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let result = self.api.get_snapshot(&zone, &id).await;
        let Some(snapshot) = read_or_tombstone(d, result, GonePolicy::NotFound)? else {
            return Ok(Diagnostics::new());
        };

        flatten_model(&schema(), &snapshot, d)?;
        d.set("size_in_gb", (snapshot.size / 1_000_000_000) as i64);
        if let Some(volume) = &snapshot.base_volume {
            d.set("volume_id", flatten_zoned_id(&zone, &volume.id));
        }
        Ok(Diagnostics::new())
    }

    async fn update_snapshot(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let request = UpdateSnapshotRequest {
            name: d
                .has_change("name")
                .then(|| d.get_string("name").unwrap_or_default().to_string()),
            tags: Patch::<Vec<String>>::list_change(d, "tags"),
        };

        if !request.is_empty() {
            self.wait_snapshot(ctx, &zone, &id).await?;
            self.api.update_snapshot(&zone, &id, &request).await?;
        }

        self.read_snapshot(ctx, d).await
    }

    async fn delete_snapshot(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let (zone, id) = parse_zoned_id(d.id())?;
        let plan = self.plan(ctx, &zone, &id);
        let api = &self.api;
        let (zone, id) = (&zone, id.as_str());

        if wait_for_optional(ctx, &plan, move || api.get_snapshot(zone, id))
            .await?
            .is_none()
        {
            return Ok(Diagnostics::new());
        }

        ignore_not_found(self.api.delete_snapshot(zone, id).await)?;
        wait_for_absence(ctx, &plan, move || api.get_snapshot(zone, id)).await?;
        Ok(Diagnostics::new())
    }
}

#[async_trait]
impl ResourceContract for InstanceSnapshotResource {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        schema()
    }

    fn timeouts(&self) -> Timeouts {
        default_timeouts(Domain::Snapshot)
    }

    async fn create(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.create_snapshot(ctx, d).await;
        surface(d, result)
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.read_snapshot(ctx, d).await;
        surface(d, result)
    }

    async fn update(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.update_snapshot(ctx, d).await;
        surface(d, result)
    }

    async fn delete(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.delete_snapshot(ctx, d).await;
        surface(d, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use meridian_core::differ::{Diff, plan};
    use meridian_core::provider::Operation;
    use meridian_core::resource::Value;

    use crate::test_support::{FakeCloud, attrs, changed, ctx, meta, persisted, planned};

    fn resource(cloud: &Arc<FakeCloud>) -> InstanceSnapshotResource {
        InstanceSnapshotResource::new(cloud.clone(), meta())
    }

    async fn created(cloud: &Arc<FakeCloud>) -> ResourceData {
        let volume = cloud.insert_volume("fr-par-1", "data");
        let mut d = planned(
            TYPE_NAME,
            vec![("volume_id", Value::from(format!("fr-par-1/{}", volume.id)))],
        );
        resource(cloud).create(&ctx(Operation::Create), &mut d).await.unwrap();
        d
    }

    #[tokio::test]
    async fn create_records_scoped_volume_reference() {
        let cloud = FakeCloud::new();
        let d = created(&cloud).await;

        let volume_id = cloud.volumes.lock().unwrap().keys().next().unwrap().clone();
        assert_eq!(d.get_string("volume_id"), Some(format!("fr-par-1/{}", volume_id).as_str()));
        assert_eq!(d.get_int("size_in_gb"), Some(20));
        assert_eq!(d.get_string("created_at"), Some("2026-01-01T10:00:00Z"));
        assert_eq!(cloud.calls("get_volume"), 1);
    }

    #[tokio::test]
    async fn bare_volume_id_does_not_drift() {
        let cloud = FakeCloud::new();
        let d = created(&cloud).await;
        let bare = expand_id(d.get_string("volume_id").unwrap()).to_string();

        let mut config = attrs(vec![("volume_id", Value::from(bare))]);
        config.insert("name".to_string(), d.get("name").unwrap().clone());
        let change = plan(&resource(&cloud), Some(&d), &config).unwrap();
        assert_eq!(change.diff, Diff::NoChange);

        let mut planned = change.data;
        resource(&cloud)
            .update(&ctx(Operation::Update), &mut planned)
            .await
            .unwrap();
        assert_eq!(cloud.calls_starting_with("update_"), 0);
    }

    #[tokio::test]
    async fn rename_updates_in_place() {
        let cloud = FakeCloud::new();
        let d = created(&cloud).await;

        let mut d = changed(&d, vec![("name", Value::from("nightly"))]);
        resource(&cloud).update(&ctx(Operation::Update), &mut d).await.unwrap();
        assert_eq!(cloud.calls("update_snapshot"), 1);
        assert_eq!(d.get_string("name"), Some("nightly"));
    }

    #[tokio::test]
    async fn delete_waits_for_absence() {
        let cloud = FakeCloud::new();
        let d = created(&cloud).await;
        resource(&cloud)
            .delete(&ctx(Operation::Delete), &mut persisted(&d))
            .await
            .unwrap();
        assert!(cloud.snapshots.lock().unwrap().is_empty());
        assert_eq!(resource(&cloud).timeouts().create, Duration::from_secs(3600));
    }
}
