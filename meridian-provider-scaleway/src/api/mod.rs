//! Typed access to the Scaleway APIs
//!
//! Each domain exposes an async trait implemented by
//! [`ScalewayClient`](crate::client::ScalewayClient); resources hold the trait
//! object so tests can substitute in-memory implementations.

pub mod baremetal;
pub mod instance;
pub mod lb;
pub mod vpc;
pub mod vpcgw;

pub use baremetal::BaremetalApi;
pub use instance::InstanceApi;
pub use lb::LbApi;
pub use vpc::VpcApi;
pub use vpcgw::GatewayApi;
