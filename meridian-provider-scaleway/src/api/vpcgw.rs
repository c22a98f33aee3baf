//! Public gateway API: gateways and their private network attachments (zoned)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ScalewayClient;
use crate::envelope::Patch;
use crate::errors::ScalewayResult;
use crate::locality::Zone;
use crate::waiter::Waitable;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayIp {
    pub id: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayType {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gateway {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "type", default)]
    pub gateway_type: Option<GatewayType>,
    #[serde(default)]
    pub ip: Option<GatewayIp>,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub upstream_dns_servers: Vec<String>,
    #[serde(default)]
    pub bastion_enabled: bool,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Waitable for Gateway {
    fn status(&self) -> &str {
        &self.status
    }

    fn is_transient(&self) -> bool {
        matches!(
            self.status.as_str(),
            "allocating" | "configuring" | "stopping" | "deleting"
        )
    }

    fn is_failed(&self) -> bool {
        self.status == "failed"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayNetwork {
    pub id: String,
    #[serde(default)]
    pub gateway_id: String,
    #[serde(default)]
    pub private_network_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub enable_masquerade: bool,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub mac_address: Option<String>,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Waitable for GatewayNetwork {
    fn status(&self) -> &str {
        &self.status
    }

    fn is_transient(&self) -> bool {
        matches!(self.status.as_str(), "attaching" | "configuring" | "detaching")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateGatewayRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub gateway_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upstream_dns_servers: Vec<String>,
    pub enable_bastion: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateGatewayRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub tags: Patch<Vec<String>>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub upstream_dns_servers: Patch<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_bastion: Option<bool>,
}

impl UpdateGatewayRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.tags.is_omit()
            && self.upstream_dns_servers.is_omit()
            && self.enable_bastion.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateGatewayNetworkRequest {
    pub gateway_id: String,
    pub private_network_id: String,
    pub enable_masquerade: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateGatewayNetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_masquerade: Option<bool>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub address: Patch<String>,
}

impl UpdateGatewayNetworkRequest {
    pub fn is_empty(&self) -> bool {
        self.enable_masquerade.is_none() && self.address.is_omit()
    }
}

#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn create_gateway(&self, zone: &Zone, request: &CreateGatewayRequest) -> ScalewayResult<Gateway>;
    async fn get_gateway(&self, zone: &Zone, id: &str) -> ScalewayResult<Gateway>;
    async fn update_gateway(&self, zone: &Zone, id: &str, request: &UpdateGatewayRequest) -> ScalewayResult<Gateway>;
    async fn delete_gateway(&self, zone: &Zone, id: &str) -> ScalewayResult<()>;

    async fn create_gateway_network(
        &self,
        zone: &Zone,
        request: &CreateGatewayNetworkRequest,
    ) -> ScalewayResult<GatewayNetwork>;
    async fn get_gateway_network(&self, zone: &Zone, id: &str) -> ScalewayResult<GatewayNetwork>;
    async fn update_gateway_network(
        &self,
        zone: &Zone,
        id: &str,
        request: &UpdateGatewayNetworkRequest,
    ) -> ScalewayResult<GatewayNetwork>;
    async fn delete_gateway_network(&self, zone: &Zone, id: &str) -> ScalewayResult<()>;
}

fn base(zone: &Zone) -> String {
    format!("/vpc-gw/v1/zones/{}", zone)
}

#[async_trait]
impl GatewayApi for ScalewayClient {
    async fn create_gateway(&self, zone: &Zone, request: &CreateGatewayRequest) -> ScalewayResult<Gateway> {
        self.post(&format!("{}/gateways", base(zone)), request).await
    }

    async fn get_gateway(&self, zone: &Zone, id: &str) -> ScalewayResult<Gateway> {
        self.get(&format!("{}/gateways/{}", base(zone), id)).await
    }

    async fn update_gateway(&self, zone: &Zone, id: &str, request: &UpdateGatewayRequest) -> ScalewayResult<Gateway> {
        self.patch(&format!("{}/gateways/{}", base(zone), id), request).await
    }

    async fn delete_gateway(&self, zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.delete_with_query(
            &format!("{}/gateways/{}", base(zone), id),
            &[("cleanup_dhcp", "false".to_string())],
        )
        .await
    }

    async fn create_gateway_network(
        &self,
        zone: &Zone,
        request: &CreateGatewayNetworkRequest,
    ) -> ScalewayResult<GatewayNetwork> {
        self.post(&format!("{}/gateway-networks", base(zone)), request).await
    }

    async fn get_gateway_network(&self, zone: &Zone, id: &str) -> ScalewayResult<GatewayNetwork> {
        self.get(&format!("{}/gateway-networks/{}", base(zone), id)).await
    }

    async fn update_gateway_network(
        &self,
        zone: &Zone,
        id: &str,
        request: &UpdateGatewayNetworkRequest,
    ) -> ScalewayResult<GatewayNetwork> {
        self.patch(&format!("{}/gateway-networks/{}", base(zone), id), request)
            .await
    }

    async fn delete_gateway_network(&self, zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.delete_with_query(
            &format!("{}/gateway-networks/{}", base(zone), id),
            &[("cleanup_dhcp", "false".to_string())],
        )
        .await
    }
}
