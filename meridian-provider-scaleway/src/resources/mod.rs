//! Managed resources
//!
//! Every handler resolves its scope, calls the typed API, persists the scoped
//! identifier as soon as the remote object exists, waits for stability and
//! finishes with a read. Handlers work on [`ScalewayResult`] and convert to
//! the host error type at the contract boundary.

pub mod baremetal_server;
pub mod instance_ip;
pub mod instance_snapshot;
pub mod instance_volume;
pub mod lb;
pub mod vpc_gateway_network;
pub mod vpc_private_network;
pub mod vpc_public_gateway;

pub use baremetal_server::BaremetalServerResource;
pub use instance_ip::InstanceIpResource;
pub use instance_snapshot::InstanceSnapshotResource;
pub use instance_volume::InstanceVolumeResource;
pub use lb::LbResource;
pub use vpc_gateway_network::VpcGatewayNetworkResource;
pub use vpc_private_network::VpcPrivateNetworkResource;
pub use vpc_public_gateway::VpcPublicGatewayResource;

use meridian_core::diagnostics::Diagnostics;
use meridian_core::provider::{ProviderResult, ResourceAddress};
use meridian_core::resource::ResourceData;
use meridian_core::schema::{AttributeSchema, AttributeType, types};

use crate::diff_policy::diff_suppress_func_locality;
use crate::errors::ScalewayResult;

/// Convert a handler outcome into the host's error type, addressed to `d`
pub(crate) fn surface(d: &ResourceData, result: ScalewayResult<Diagnostics>) -> ProviderResult<Diagnostics> {
    result.map_err(|e| {
        log::debug!("{} {} failed: {}", d.resource_type(), d.id(), e);
        e.into_provider_error(ResourceAddress::of(d))
    })
}

pub(crate) fn zone_attribute() -> AttributeSchema {
    AttributeSchema::new("zone", AttributeType::String)
        .optional()
        .computed()
        .force_new()
        .with_description("The zone you want to attach the resource to")
        .with_api_field("zone")
}

pub(crate) fn region_attribute() -> AttributeSchema {
    AttributeSchema::new("region", AttributeType::String)
        .optional()
        .computed()
        .force_new()
        .with_description("The region you want to attach the resource to")
        .with_api_field("region")
}

pub(crate) fn project_id_attribute(api_field: &str) -> AttributeSchema {
    AttributeSchema::new("project_id", AttributeType::String)
        .optional()
        .computed()
        .force_new()
        .with_description("The project_id you want to attach the resource to")
        .with_api_field(api_field)
}

pub(crate) fn organization_id_attribute(api_field: &str) -> AttributeSchema {
    AttributeSchema::new("organization_id", AttributeType::String)
        .computed()
        .with_description("The organization_id the resource is associated to")
        .with_api_field(api_field)
}

pub(crate) fn tags_attribute() -> AttributeSchema {
    AttributeSchema::new("tags", types::string_list())
        .optional()
        .with_description("The tags associated with the resource")
        .with_api_field("tags")
}

/// Reference to another resource, compared without its scope prefix
pub(crate) fn reference_attribute(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String).with_diff_suppress(diff_suppress_func_locality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::resource::Value;

    use crate::errors::{ApiError, ScalewayError};

    #[test]
    fn surfaced_errors_carry_the_address_and_cloud_message() {
        let mut d = ResourceData::new("scaleway_lb", Default::default());
        d.set_id("fr-par-1/abc");
        let err = surface(
            &d,
            Err(ScalewayError::Api(ApiError::new(409, "lb is locked"))),
        )
        .unwrap_err();
        assert_eq!(err.resource, Some(ResourceAddress::new("scaleway_lb", "fr-par-1/abc")));
        assert!(err.message.contains("lb is locked"));
    }

    #[test]
    fn references_ignore_scope() {
        let attr = reference_attribute("ip_id").optional();
        let suppress = attr.diff_suppress.unwrap();
        assert!(suppress("ip_id", &Value::from("fr-par-1/abc"), &Value::from("abc")));
    }
}
