//! scaleway_instance_ip data source - Look up a flexible IP by address or ID

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
use crate::resources::instance_ip::{self, InstanceIpResource};
use crate::resources::surface;
use crate::scope::extract_zone;

pub struct InstanceIpDataSource {
    api: Arc<dyn InstanceApi>,
    resource: InstanceIpResource,
    meta: Arc<Meta>,
}

impl InstanceIpDataSource {
    pub fn new(api: Arc<dyn InstanceApi>, meta: Arc<Meta>) -> Self {
        Self {
            resource: InstanceIpResource::new(api.clone(), meta.clone()),
            api,
            meta,
        }
    }

    async fn lookup(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let defaults = &self.meta.defaults;
        let id = match d.get_string("ip_id") {
            Some(raw) => zoned_lookup_id(d, defaults, raw)?.1,
            None => {
                let address = d
                    .get_string("address")
                    .ok_or_else(|| missing_lookup("address", "ip_id"))?;
                let zone = extract_zone(d, defaults)?.scope;
                // The API cannot filter on the address itself
                let filter = ListFilter {
                    name: None,
                    project: d.get_string("project_id").map(str::to_string),
                };
                let ips = self.api.list_ips(&zone, &filter).await?;
                let ip = find_exact(ips, |ip| ip.address == address, "IP", address)?;
                new_zoned_id(&zone, &ip.id)
            }
        };

        d.set_id(id.clone());
        d.set("ip_id", id.clone());
        let diags = self.resource.read_ip(ctx, d).await?;
        ensure_found(d, "IP", &id)?;
        Ok(diags)
    }
}

#[async_trait]
impl DataSourceContract for InstanceIpDataSource {
    fn type_name(&self) -> &'static str {
        instance_ip::TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        lookup_schema(&instance_ip::schema(), "address", "ip_id")
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.lookup(ctx, d).await;
        surface(d, result)
    }
}
