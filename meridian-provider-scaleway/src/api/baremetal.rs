//! Elastic metal API: servers, installation and options (zoned)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ScalewayClient;
use crate::envelope::Patch;
use crate::errors::ScalewayResult;
use crate::locality::Zone;
use crate::waiter::Waitable;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInstall {
    #[serde(default)]
    pub os_id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ssh_key_ids: Vec<String>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerOption {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub expires_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub offer_id: String,
    #[serde(default)]
    pub install: Option<ServerInstall>,
    #[serde(default)]
    pub options: Vec<ServerOption>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub zone: String,
}

impl Waitable for Server {
    fn status(&self) -> &str {
        &self.status
    }

    fn is_transient(&self) -> bool {
        matches!(
            self.status.as_str(),
            "delivering" | "deleting" | "starting" | "stopping" | "resetting" | "ordered"
        )
    }
}

/// The server as seen through its installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installing(pub Server);

impl Waitable for Installing {
    fn status(&self) -> &str {
        self.0
            .install
            .as_ref()
            .map(|install| install.status.as_str())
            .unwrap_or(self.0.status.as_str())
    }

    fn is_transient(&self) -> bool {
        match &self.0.install {
            Some(install) => matches!(
                install.status.as_str(),
                "to_install" | "installing" | "to_clean" | "cleaning"
            ),
            None => self.0.is_transient(),
        }
    }

    fn is_failed(&self) -> bool {
        self.status() == "error"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateServerRequest {
    pub offer_id: String,
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub option_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateServerRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub description: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub tags: Patch<Vec<String>>,
}

impl UpdateServerRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_omit() && self.tags.is_omit()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallServerRequest {
    pub os_id: String,
    pub hostname: String,
    pub ssh_key_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
struct AddOptionRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<&'a str>,
}

#[async_trait]
pub trait BaremetalApi: Send + Sync {
    async fn create_server(&self, zone: &Zone, request: &CreateServerRequest) -> ScalewayResult<Server>;
    async fn get_server(&self, zone: &Zone, id: &str) -> ScalewayResult<Server>;
    async fn update_server(&self, zone: &Zone, id: &str, request: &UpdateServerRequest) -> ScalewayResult<Server>;
    async fn delete_server(&self, zone: &Zone, id: &str) -> ScalewayResult<()>;
    async fn install_server(&self, zone: &Zone, id: &str, request: &InstallServerRequest) -> ScalewayResult<Server>;
    async fn add_option(
        &self,
        zone: &Zone,
        server_id: &str,
        option_id: &str,
        expires_at: Option<&str>,
    ) -> ScalewayResult<Server>;
    async fn delete_option(&self, zone: &Zone, server_id: &str, option_id: &str) -> ScalewayResult<()>;
}

fn base(zone: &Zone) -> String {
    format!("/baremetal/v1/zones/{}/servers", zone)
}

#[async_trait]
impl BaremetalApi for ScalewayClient {
    async fn create_server(&self, zone: &Zone, request: &CreateServerRequest) -> ScalewayResult<Server> {
        self.post(&base(zone), request).await
    }

    async fn get_server(&self, zone: &Zone, id: &str) -> ScalewayResult<Server> {
        self.get(&format!("{}/{}", base(zone), id)).await
    }

    async fn update_server(&self, zone: &Zone, id: &str, request: &UpdateServerRequest) -> ScalewayResult<Server> {
        self.patch(&format!("{}/{}", base(zone), id), request).await
    }

    async fn delete_server(&self, zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.delete(&format!("{}/{}", base(zone), id)).await
    }

    async fn install_server(&self, zone: &Zone, id: &str, request: &InstallServerRequest) -> ScalewayResult<Server> {
        self.post(&format!("{}/{}/install", base(zone), id), request).await
    }

    async fn add_option(
        &self,
        zone: &Zone,
        server_id: &str,
        option_id: &str,
        expires_at: Option<&str>,
    ) -> ScalewayResult<Server> {
        self.post(
            &format!("{}/{}/options/{}", base(zone), server_id, option_id),
            &AddOptionRequest { expires_at },
        )
        .await
    }

    async fn delete_option(&self, zone: &Zone, server_id: &str, option_id: &str) -> ScalewayResult<()> {
        self.delete(&format!("{}/{}/options/{}", base(zone), server_id, option_id))
            .await
    }
}
