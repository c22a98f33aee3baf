//! Data sources
//!
//! Each data source shares its resource's type name and attribute surface.
//! It resolves the identifier of the object (given directly or found by
//! name) and then hands over to the resource read.

pub mod instance_ip;
pub mod instance_volume;
pub mod lb;
pub mod vpc_private_network;

pub use instance_ip::InstanceIpDataSource;
pub use instance_volume::InstanceVolumeDataSource;
pub use lb::LbDataSource;
pub use vpc_private_network::VpcPrivateNetworkDataSource;

use meridian_core::datasource::{
    add_optional_field, datasource_schema_from_resource_schema, fix_datasource_schema_flags,
};
use meridian_core::schema::ResourceSchema;

use crate::errors::ScalewayError;
use crate::resources::reference_attribute;

/// Data-source schema looked up by `lookup_key` or by `id_key`, exclusively.
///
/// Every attribute of the resource is reported; the lookup key and the scope
/// attribute become optional inputs.
pub(crate) fn lookup_schema(resource: &ResourceSchema, lookup_key: &str, id_key: &str) -> ResourceSchema {
    let mut schema = datasource_schema_from_resource_schema(resource);
    fix_datasource_schema_flags(&mut schema, false, &[lookup_key, "zone", "region", "project_id"]);

    if let Some(attr) = schema.attributes.get_mut(lookup_key) {
        attr.conflicts_with.push(id_key.to_string());
    }
    add_optional_field(
        &mut schema,
        reference_attribute(id_key)
            .computed()
            .conflicts_with(&[lookup_key])
            .with_description(format!("The ID of the {}", resource.resource_type)),
    );
    schema
}

pub(crate) fn missing_lookup(lookup_key: &str, id_key: &str) -> ScalewayError {
    ScalewayError::InvalidInput(format!("one of {} or {} must be set", id_key, lookup_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::resource::Value;

    use crate::resources::lb::schema;

    #[test]
    fn lookup_keys_are_optional_and_exclusive() {
        let schema = lookup_schema(&schema(), "name", "lb_id");

        let name = schema.get("name").unwrap();
        assert!(name.optional && name.computed && !name.required);
        assert_eq!(name.conflicts_with, vec!["lb_id".to_string()]);

        let id = schema.get("lb_id").unwrap();
        assert!(id.optional && id.computed);
        assert!(id.diff_suppress.is_some());

        // Everything else is reported, never configured
        assert!(schema.get("type").unwrap().is_computed_only());
        assert!(schema.get("private_network").unwrap().is_computed_only());

        let config = [
            ("name".to_string(), Value::from("web")),
            ("lb_id".to_string(), Value::from("fr-par-1/abc")),
        ]
        .into_iter()
        .collect();
        assert!(schema.validate(&config).is_err());
    }

    #[test]
    fn missing_lookup_names_both_keys() {
        let err = missing_lookup("name", "lb_id");
        assert_eq!(err.to_string(), "one of lb_id or name must be set");
    }
}
