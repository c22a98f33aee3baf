//! scaleway_lb data source - Look up a load balancer by name or ID

use std::sync::Arc;

use async_trait::async_trait;
use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{DataSourceContract, OperationContext, ProviderResult};
use meridian_core::resource::ResourceData;
use meridian_core::schema::ResourceSchema;

use crate::api::LbApi;
use crate::data_sources::{lookup_schema, missing_lookup};
use crate::datasource::{ensure_found, find_exact, zoned_lookup_id};
use crate::errors::ScalewayResult;
use crate::locality::new_zoned_id;
use crate::provider::Meta;
use crate::resources::lb::{self, LbResource};
use crate::resources::surface;
use crate::scope::extract_zone;

pub struct LbDataSource {
    api: Arc<dyn LbApi>,
    resource: LbResource,
    meta: Arc<Meta>,
}

impl LbDataSource {
    pub fn new(api: Arc<dyn LbApi>, meta: Arc<Meta>) -> Self {
        Self {
            resource: LbResource::new(api.clone(), meta.clone()),
            api,
            meta,
        }
    }

    async fn lookup(&self, ctx: &OperationContext, d: &mut ResourceData) -> ScalewayResult<Diagnostics> {
        let defaults = &self.meta.defaults;
        let id = match d.get_string("lb_id") {
            Some(raw) => zoned_lookup_id(d, defaults, raw)?.1,
            None => {
                let name = d
                    .get_string("name")
                    .ok_or_else(|| missing_lookup("name", "lb_id"))?;
                let zone = extract_zone(d, defaults)?.scope;
                let lbs = self
                    .api
                    .list_lbs(&zone, Some(name), d.get_string("project_id"))
                    .await?;
                let lb = find_exact(lbs, |lb| lb.name == name, "load balancer", name)?;
                new_zoned_id(&zone, &lb.id)
            }
        };

        d.set_id(id.clone());
        d.set("lb_id", id.clone());
        let diags = self.resource.read_lb(ctx, d).await?;
        ensure_found(d, "load balancer", &id)?;
        Ok(diags)
    }
}

#[async_trait]
impl DataSourceContract for LbDataSource {
    fn type_name(&self) -> &'static str {
        lb::TYPE_NAME
    }

    fn schema(&self) -> ResourceSchema {
        lookup_schema(&lb::schema(), "name", "lb_id")
    }

    async fn read(&self, ctx: &OperationContext, d: &mut ResourceData) -> ProviderResult<Diagnostics> {
        let result = self.lookup(ctx, d).await;
        surface(d, result)
    }
}
