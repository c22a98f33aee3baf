//! Load balancer API: load balancers and their private network attachments (zoned)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ScalewayClient;
use crate::envelope::Patch;
use crate::errors::ScalewayResult;
use crate::locality::Zone;
use crate::waiter::Waitable;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbIp {
    pub id: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub reverse: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lb {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: String,
    #[serde(rename = "type", default)]
    pub lb_type: String,
    #[serde(default)]
    pub ip: Vec<LbIp>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub organization_id: String,
    #[serde(default)]
    pub ssl_compatibility_level: String,
    #[serde(default)]
    pub zone: String,
}

impl Waitable for Lb {
    fn status(&self) -> &str {
        &self.status
    }

    fn is_transient(&self) -> bool {
        matches!(
            self.status.as_str(),
            "pending" | "migrating" | "to_create" | "creating" | "to_delete" | "deleting"
        )
    }
}

/// Attachment of a private network to a load balancer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LbPrivateNetwork {
    pub private_network_id: String,
    #[serde(default)]
    pub status: String,
}

impl Waitable for LbPrivateNetwork {
    fn status(&self) -> &str {
        &self.status
    }

    fn is_transient(&self) -> bool {
        self.status == "pending"
    }
}

/// Every attachment of a load balancer, awaited as a whole
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LbPrivateNetworks(pub Vec<LbPrivateNetwork>);

impl LbPrivateNetworks {
    pub fn ids(&self) -> Vec<String> {
        self.0.iter().map(|pn| pn.private_network_id.clone()).collect()
    }
}

impl Waitable for LbPrivateNetworks {
    fn status(&self) -> &str {
        self.0
            .iter()
            .find(|pn| pn.is_transient() || pn.is_failed())
            .map(|pn| pn.status())
            .unwrap_or("ready")
    }

    fn is_transient(&self) -> bool {
        self.0.iter().any(Waitable::is_transient)
    }

    fn is_failed(&self) -> bool {
        self.0.iter().any(Waitable::is_failed)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateLbRequest {
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub lb_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_id: Option<String>,
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_compatibility_level: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateLbRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub description: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub tags: Patch<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_compatibility_level: Option<String>,
}

impl UpdateLbRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_omit()
            && self.tags.is_omit()
            && self.ssl_compatibility_level.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct MigrateLbRequest<'a> {
    #[serde(rename = "type")]
    lb_type: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct AttachPrivateNetworkRequest {
    dhcp_config: serde_json::Value,
}

#[async_trait]
pub trait LbApi: Send + Sync {
    async fn create_lb(&self, zone: &Zone, request: &CreateLbRequest) -> ScalewayResult<Lb>;
    async fn get_lb(&self, zone: &Zone, id: &str) -> ScalewayResult<Lb>;
    async fn update_lb(&self, zone: &Zone, id: &str, request: &UpdateLbRequest) -> ScalewayResult<Lb>;
    async fn delete_lb(&self, zone: &Zone, id: &str) -> ScalewayResult<()>;
    async fn list_lbs(&self, zone: &Zone, name: Option<&str>, project_id: Option<&str>) -> ScalewayResult<Vec<Lb>>;
    async fn migrate_lb(&self, zone: &Zone, id: &str, lb_type: &str) -> ScalewayResult<Lb>;

    async fn list_lb_private_networks(&self, zone: &Zone, lb_id: &str) -> ScalewayResult<LbPrivateNetworks>;
    async fn attach_private_network(&self, zone: &Zone, lb_id: &str, private_network_id: &str) -> ScalewayResult<()>;
    async fn detach_private_network(&self, zone: &Zone, lb_id: &str, private_network_id: &str) -> ScalewayResult<()>;
}

fn base(zone: &Zone) -> String {
    format!("/lb/v1/zones/{}/lbs", zone)
}

#[async_trait]
impl LbApi for ScalewayClient {
    async fn create_lb(&self, zone: &Zone, request: &CreateLbRequest) -> ScalewayResult<Lb> {
        self.post(&base(zone), request).await
    }

    async fn get_lb(&self, zone: &Zone, id: &str) -> ScalewayResult<Lb> {
        self.get(&format!("{}/{}", base(zone), id)).await
    }

    async fn update_lb(&self, zone: &Zone, id: &str, request: &UpdateLbRequest) -> ScalewayResult<Lb> {
        self.patch(&format!("{}/{}", base(zone), id), request).await
    }

    async fn delete_lb(&self, zone: &Zone, id: &str) -> ScalewayResult<()> {
        // The flexible IP outlives the load balancer
        self.delete_with_query(
            &format!("{}/{}", base(zone), id),
            &[("release_ip", "false".to_string())],
        )
        .await
    }

    async fn list_lbs(&self, zone: &Zone, name: Option<&str>, project_id: Option<&str>) -> ScalewayResult<Vec<Lb>> {
        let mut query = Vec::new();
        if let Some(name) = name {
            query.push(("name", name.to_string()));
        }
        if let Some(project_id) = project_id {
            query.push(("project_id", project_id.to_string()));
        }
        self.list_all(&base(zone), "lbs", &query).await
    }

    async fn migrate_lb(&self, zone: &Zone, id: &str, lb_type: &str) -> ScalewayResult<Lb> {
        self.post(
            &format!("{}/{}/migrate", base(zone), id),
            &MigrateLbRequest { lb_type },
        )
        .await
    }

    async fn list_lb_private_networks(&self, zone: &Zone, lb_id: &str) -> ScalewayResult<LbPrivateNetworks> {
        let items: Vec<LbPrivateNetwork> = self
            .list_all(
                &format!("{}/{}/private-networks", base(zone), lb_id),
                "private_network",
                &[],
            )
            .await?;
        Ok(LbPrivateNetworks(items))
    }

    async fn attach_private_network(&self, zone: &Zone, lb_id: &str, private_network_id: &str) -> ScalewayResult<()> {
        self.post_empty(
            &format!("{}/{}/private-networks/{}/attach", base(zone), lb_id, private_network_id),
            &AttachPrivateNetworkRequest {
                dhcp_config: serde_json::json!({}),
            },
        )
        .await
    }

    async fn detach_private_network(&self, zone: &Zone, lb_id: &str, private_network_id: &str) -> ScalewayResult<()> {
        self.post_empty(
            &format!("{}/{}/private-networks/{}/detach", base(zone), lb_id, private_network_id),
            &serde_json::json!({}),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pn(status: &str) -> LbPrivateNetwork {
        LbPrivateNetwork {
            private_network_id: format!("pn-{}", status),
            status: status.to_string(),
        }
    }

    #[test]
    fn attachments_are_awaited_together() {
        let ready = LbPrivateNetworks(vec![pn("ready"), pn("ready")]);
        assert!(!ready.is_transient());
        assert_eq!(ready.status(), "ready");

        let pending = LbPrivateNetworks(vec![pn("ready"), pn("pending")]);
        assert!(pending.is_transient());
        assert_eq!(pending.status(), "pending");

        let failed = LbPrivateNetworks(vec![pn("error")]);
        assert!(failed.is_failed());
        assert!(!LbPrivateNetworks::default().is_transient());
    }

    #[test]
    fn lb_decodes_type_and_ips() {
        let lb: Lb = serde_json::from_value(serde_json::json!({
            "id": "lb-1",
            "name": "web",
            "status": "ready",
            "type": "LB-S",
            "ip": [{"id": "ip-1", "ip_address": "51.15.0.1"}],
            "zone": "fr-par-1"
        }))
        .unwrap();
        assert_eq!(lb.lb_type, "LB-S");
        assert_eq!(lb.ip[0].ip_address, "51.15.0.1");
        assert!(!lb.is_transient());
    }

    #[test]
    fn update_request_is_empty_without_changes() {
        assert!(UpdateLbRequest::default().is_empty());
        let request = UpdateLbRequest {
            description: Patch::Clear,
            ..UpdateLbRequest::default()
        };
        assert!(!request.is_empty());
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"description": null})
        );
    }
}
