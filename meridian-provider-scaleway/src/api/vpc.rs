//! VPC API: private networks (regional)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ScalewayClient;
use crate::envelope::Patch;
use crate::errors::ScalewayResult;
use crate::locality::Region;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateNetwork {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub subnets: Vec<String>,
    #[serde(default)]
    pub region: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreatePrivateNetworkRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdatePrivateNetworkRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub tags: Patch<Vec<String>>,
}

impl UpdatePrivateNetworkRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.tags.is_omit()
    }
}

#[async_trait]
pub trait VpcApi: Send + Sync {
    async fn create_private_network(
        &self,
        region: &Region,
        request: &CreatePrivateNetworkRequest,
    ) -> ScalewayResult<PrivateNetwork>;
    async fn get_private_network(&self, region: &Region, id: &str) -> ScalewayResult<PrivateNetwork>;
    async fn update_private_network(
        &self,
        region: &Region,
        id: &str,
        request: &UpdatePrivateNetworkRequest,
    ) -> ScalewayResult<PrivateNetwork>;
    async fn delete_private_network(&self, region: &Region, id: &str) -> ScalewayResult<()>;
    async fn list_private_networks(
        &self,
        region: &Region,
        name: Option<&str>,
        project_id: Option<&str>,
    ) -> ScalewayResult<Vec<PrivateNetwork>>;
}

fn base(region: &Region) -> String {
    format!("/vpc/v2/regions/{}/private-networks", region)
}

#[async_trait]
impl VpcApi for ScalewayClient {
    async fn create_private_network(
        &self,
        region: &Region,
        request: &CreatePrivateNetworkRequest,
    ) -> ScalewayResult<PrivateNetwork> {
        self.post(&base(region), request).await
    }

    async fn get_private_network(&self, region: &Region, id: &str) -> ScalewayResult<PrivateNetwork> {
        self.get(&format!("{}/{}", base(region), id)).await
    }

    async fn update_private_network(
        &self,
        region: &Region,
        id: &str,
        request: &UpdatePrivateNetworkRequest,
    ) -> ScalewayResult<PrivateNetwork> {
        self.patch(&format!("{}/{}", base(region), id), request).await
    }

    async fn delete_private_network(&self, region: &Region, id: &str) -> ScalewayResult<()> {
        self.delete(&format!("{}/{}", base(region), id)).await
    }

    async fn list_private_networks(
        &self,
        region: &Region,
        name: Option<&str>,
        project_id: Option<&str>,
    ) -> ScalewayResult<Vec<PrivateNetwork>> {
        let mut query = Vec::new();
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        if let Some(project_id) = project_id {
            query.push(("project_id", project_id.to_string()));
        }
        self.list_all(&base(region), "private_networks", &query).await
    }
}
