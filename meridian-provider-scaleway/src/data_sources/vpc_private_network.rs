//! scaleway_vpc_private_network data source - Look up a private network by name or ID

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{DataSourceContract, OperationContext, ProviderResult};
use meridian_core::resource::ResourceData;
use meridian_core::schema::ResourceSchema;

use crate::api::VpcApi;
use crate::data_sources::{lookup_schema, missing_lookup};
use crate::datasource::{ensure_found, find_exact, regional_lookup_id};
use crate::errors::ScalewayResult;
use crate::locality::new_regional_id;
use crate::provider::Meta;
use crate::resources::surface;
use crate::resources::vpc_private_network::{self, VpcPrivateNetworkResource};
use crate::scope::extract_region;

pub struct VpcPrivateNetworkDataSource {
    api: Arc<dyn VpcApi>,
    resource: VpcPrivateNetworkResource,
    meta: Arc<Meta>,
}

impl VpcPrivateNetworkDataSource {
    pub fn new(api: Arc<dyn VpcApi>, meta: Arc<Meta>) -> Self {
        Self {
            resource: VpcPrivateNetworkResource::new(api.clone(), meta.clone()),
            api,
            meta,
        }
    }

    async fn lookup(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let defaults = &self.meta.defaults;
        let id = match d.get_string("private_network_id") {
            Some(raw) => regional_lookup_id(d, defaults, raw)?.1,
            None => {
                let name = d
                    .get_string("name")
                    .ok_or_else(|| missing_lookup("name", "private_network_id"))?;
                let region = extract_region(d, defaults)?.scope;
                let pns = self
                    .api
                    .list_private_networks(&region, Some(name), d.get_string("project_id"))
                    .await?;
                let pn = find_exact(pns, |pn| pn.name == name, "private network", name)?;
                new_regional_id(&region, &pn.id)
            }
        };

        d.set_id(id.clone());
        d.set("private_network_id", id.clone());
        let diags = self.resource.read_private_network(ctx, d).await?;
        ensure_found(d, "private network", &id)?;
        Ok(diags)
    }
}

#[async_trait]
impl DataSourceContract for VpcPrivateNetworkDataSource {
    fn type_name(&self) -> &'static str {
        vpc_private_network::TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        lookup_schema(&vpc_private_network::schema(), "name", "private_network_id")
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.lookup(ctx, d).await;
        surface(d, result)
    }
}
