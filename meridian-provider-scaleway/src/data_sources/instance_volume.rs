//! scaleway_instance_volume data source - Look up a volume by name or ID

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{DataSourceContract, OperationContext, ProviderResult};
use meridian_core::resource::ResourceData;
use meridian_core::schema::ResourceSchema;

use crate::api::InstanceApi;
use crate::api::instance::ListFilter;
use crate::data_sources::{lookup_schema, missing_lookup};
use crate::datasource::{ensure_found, find_exact, zoned_lookup_id};
use crate::errors::ScalewayResult;
use crate::locality::new_zoned_id;
use crate::provider::Meta;
use crate::resources::instance_volume::{self, InstanceVolumeResource};
use crate::resources::surface;
use crate::scope::extract_zone;

pub struct InstanceVolumeDataSource {
    api: Arc<dyn InstanceApi>,
    resource: InstanceVolumeResource,
    meta: Arc<Meta>,
}

impl InstanceVolumeDataSource {
    pub fn new(api: Arc<dyn InstanceApi>, meta: Arc<Meta>) -> Self {
        Self {
            resource: InstanceVolumeResource::new(api.clone(), meta.clone()),
            api,
            meta,
        }
    }

    async fn lookup(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let defaults = &self.meta.defaults;
        let id = match d.get_string("volume_id") {
            Some(raw) => zoned_lookup_id(d, defaults, raw)?.1,
            None => {
                let name = d
                    .get_string("name")
                    .ok_or_else(|| missing_lookup("name", "volume_id"))?;
                let zone = extract_zone(d, defaults)?.scope;
                let filter = ListFilter {
                    name: Some(name.to_string()),
                    project: d.get_string("project_id").map(str::to_string),
                };
                // The name filter matches substrings
                let volumes = self.api.list_volumes(&zone, &filter).await?;
                let volume = find_exact(volumes, |v| v.name == name, "volume", name)?;
                new_zoned_id(&zone, &volume.id)
            }
        };

        d.set_id(id.clone());
        d.set("volume_id", id.clone());
        let diags = self.resource.read_volume(ctx, d).await?;
        ensure_found(d, "volume", &id)?;
        Ok(diags)
    }
}

#[async_trait]
impl DataSourceContract for InstanceVolumeDataSource {
    fn type_name(&self) -> &'static str {
        instance_volume::TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        lookup_schema(&instance_volume::schema(), "name", "volume_id")
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.lookup(ctx, d).await;
        surface(d, result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::provider::Operation;
    use meridian_core::resource::Value;

    use crate::test_support::{FakeCloud, ctx, meta, planned};

    #[tokio::test]
    async fn substring_matches_are_discarded() {
        let cloud = FakeCloud::new();
        cloud.insert_volume("fr-par-1", "data-old");
        let data = cloud.insert_volume("fr-par-1", "data");

        let mut d = planned(instance_volume::TYPE_NAME, vec![("name", Value::from("data"))]);
        InstanceVolumeDataSource::new(cloud.clone(), meta())
            .read(&ctx(Operation::Read), &mut d)
            .await
            .unwrap();

        assert_eq!(d.id(), format!("fr-par-1/{}", data.id));
        assert_eq!(d.get_int("size_in_gb"), Some(20));
        assert_eq!(d.get_string("type"), Some("b_ssd"));
    }

    #[tokio::test]
    async fn id_is_rescoped_to_the_operation_zone() {
        let cloud = FakeCloud::new();
        let volume = cloud.insert_volume("nl-ams-1", "data");

        let mut d = planned(
            instance_volume::TYPE_NAME,
            vec![("volume_id", Value::from(format!("nl-ams-1/{}", volume.id)))],
        );
        InstanceVolumeDataSource::new(cloud.clone(), meta())
            .read(&ctx(Operation::Read), &mut d)
            .await
            .unwrap();
        assert_eq!(d.id(), format!("fr-par-1/{}", volume.id));
        assert_eq!(d.get_string("volume_id"), Some(d.id()));
    }
}
