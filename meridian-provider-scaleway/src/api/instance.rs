//! Instance API: flexible IPs, volumes and snapshots (zoned)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::ScalewayClient;
use crate::envelope::Patch;
use crate::errors::ScalewayResult;
use crate::locality::Zone;
use crate::waiter::Waitable;

/// Reference to a server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ip {
    pub id: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub reverse: Option<String>,
    #[serde(default)]
    pub server: Option<ServerRef>,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub zone: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub volume_type: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub server: Option<ServerRef>,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub zone: String,
}

impl Waitable for Volume {
    fn status(&self) -> &str {
        &self.state
    }

    fn is_transient(&self) -> bool {
        matches!(
            self.state.as_str(),
            "snapshotting" | "fetching" | "resizing" | "saving" | "hotsyncing"
        )
    }
}

/// Volume the snapshot was taken from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub volume_type: String,
    #[serde(default)]
    pub base_volume: Option<VolumeRef>,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub creation_date: Option<String>,
}

impl Waitable for Snapshot {
    fn status(&self) -> &str {
        &self.state
    }

    fn is_transient(&self) -> bool {
        matches!(self.state.as_str(), "snapshotting" | "importing" | "exporting")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateIpRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateIpRequest {
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub reverse: Patch<String>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub tags: Patch<Vec<String>>,
}

impl UpdateIpRequest {
    pub fn is_empty(&self) -> bool {
        self.reverse.is_omit() && self.tags.is_omit()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateVolumeRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub volume_type: String,
    /// Size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateVolumeRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub tags: Patch<Vec<String>>,
    /// New size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl UpdateVolumeRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.tags.is_omit() && self.size.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateSnapshotRequest {
    pub name: String,
    pub volume_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpdateSnapshotRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Patch::is_omit")]
    pub tags: Patch<Vec<String>>,
}

impl UpdateSnapshotRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.tags.is_omit()
    }
}

/// Filters of list calls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub name: Option<String>,
    pub project: Option<String>,
}

impl ListFilter {
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(name) = &self.name {
            query.push(("name", name.clone()));
        }
        if let Some(project) = &self.project {
            query.push(("project", project.clone()));
        }
        query
    }
}

#[async_trait]
pub trait InstanceApi: Send + Sync {
    async fn create_ip(&self, zone: &Zone, request: &CreateIpRequest) -> ScalewayResult<Ip>;
    async fn get_ip(&self, zone: &Zone, id: &str) -> ScalewayResult<Ip>;
    async fn update_ip(&self, zone: &Zone, id: &str, request: &UpdateIpRequest) -> ScalewayResult<Ip>;
    async fn delete_ip(&self, zone: &Zone, id: &str) -> ScalewayResult<()>;
    async fn list_ips(&self, zone: &Zone, filter: &ListFilter) -> ScalewayResult<Vec<Ip>>;

    async fn create_volume(&self, zone: &Zone, request: &CreateVolumeRequest) -> ScalewayResult<Volume>;
    async fn get_volume(&self, zone: &Zone, id: &str) -> ScalewayResult<Volume>;
    async fn update_volume(&self, zone: &Zone, id: &str, request: &UpdateVolumeRequest) -> ScalewayResult<Volume>;
    async fn delete_volume(&self, zone: &Zone, id: &str) -> ScalewayResult<()>;
    async fn list_volumes(&self, zone: &Zone, filter: &ListFilter) -> ScalewayResult<Vec<Volume>>;

    async fn create_snapshot(&self, zone: &Zone, request: &CreateSnapshotRequest) -> ScalewayResult<Snapshot>;
    async fn get_snapshot(&self, zone: &Zone, id: &str) -> ScalewayResult<Snapshot>;
    async fn update_snapshot(
        &self,
        zone: &Zone,
        id: &str,
        request: &UpdateSnapshotRequest,
    ) -> ScalewayResult<Snapshot>;
    async fn delete_snapshot(&self, zone: &Zone, id: &str) -> ScalewayResult<()>;
}

#[derive(Deserialize)]
struct IpEnvelope {
    ip: Ip,
}

#[derive(Deserialize)]
struct VolumeEnvelope {
    volume: Volume,
}

#[derive(Deserialize)]
struct SnapshotEnvelope {
    snapshot: Snapshot,
}

fn base(zone: &Zone) -> String {
    format!("/instance/v1/zones/{}", zone)
}

#[async_trait]
impl InstanceApi for ScalewayClient {
    async fn create_ip(&self, zone: &Zone, request: &CreateIpRequest) -> ScalewayResult<Ip> {
        let envelope: IpEnvelope = self.post(&format!("{}/ips", base(zone)), request).await?;
        Ok(envelope.ip)
    }

    async fn get_ip(&self, zone: &Zone, id: &str) -> ScalewayResult<Ip> {
        let envelope: IpEnvelope = self.get(&format!("{}/ips/{}", base(zone), id)).await?;
        Ok(envelope.ip)
    }

    async fn update_ip(&self, zone: &Zone, id: &str, request: &UpdateIpRequest) -> ScalewayResult<Ip> {
        let envelope: IpEnvelope = self.patch(&format!("{}/ips/{}", base(zone), id), request).await?;
        Ok(envelope.ip)
    }

    async fn delete_ip(&self, zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.delete(&format!("{}/ips/{}", base(zone), id)).await
    }

    async fn list_ips(&self, zone: &Zone, filter: &ListFilter) -> ScalewayResult<Vec<Ip>> {
        self.list_all(&format!("{}/ips", base(zone)), "ips", &filter.query()).await
    }

    async fn create_volume(&self, zone: &Zone, request: &CreateVolumeRequest) -> ScalewayResult<Volume> {
        let envelope: VolumeEnvelope = self.post(&format!("{}/volumes", base(zone)), request).await?;
        Ok(envelope.volume)
    }

    async fn get_volume(&self, zone: &Zone, id: &str) -> ScalewayResult<Volume> {
        let envelope: VolumeEnvelope = self.get(&format!("{}/volumes/{}", base(zone), id)).await?;
        Ok(envelope.volume)
    }

    async fn update_volume(&self, zone: &Zone, id: &str, request: &UpdateVolumeRequest) -> ScalewayResult<Volume> {
        let envelope: VolumeEnvelope = self
            .patch(&format!("{}/volumes/{}", base(zone), id), request)
            .await?;
        Ok(envelope.volume)
    }

    async fn delete_volume(&self, zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.delete(&format!("{}/volumes/{}", base(zone), id)).await
    }

    async fn list_volumes(&self, zone: &Zone, filter: &ListFilter) -> ScalewayResult<Vec<Volume>> {
        self.list_all(&format!("{}/volumes", base(zone)), "volumes", &filter.query())
            .await
    }

    async fn create_snapshot(&self, zone: &Zone, request: &CreateSnapshotRequest) -> ScalewayResult<Snapshot> {
        let envelope: SnapshotEnvelope = self
            .post(&format!("{}/snapshots", base(zone)), request)
            .await?;
        Ok(envelope.snapshot)
    }

    async fn get_snapshot(&self, zone: &Zone, id: &str) -> ScalewayResult<Snapshot> {
        let envelope: SnapshotEnvelope = self.get(&format!("{}/snapshots/{}", base(zone), id)).await?;
        Ok(envelope.snapshot)
    }

    async fn update_snapshot(
        &self,
        zone: &Zone,
        id: &str,
        request: &UpdateSnapshotRequest,
    ) -> ScalewayResult<Snapshot> {
        let envelope: SnapshotEnvelope = self
            .patch(&format!("{}/snapshots/{}", base(zone), id), request)
            .await?;
        Ok(envelope.snapshot)
    }

    async fn delete_snapshot(&self, zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.delete(&format!("{}/snapshots/{}", base(zone), id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_skips_omitted_fields() {
        let request = UpdateIpRequest {
            reverse: Patch::Clear,
            tags: Patch::Omit,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({"reverse": null})
        );
        assert!(UpdateIpRequest::default().is_empty());
    }

    #[test]
    fn ip_tolerates_missing_optional_fields() {
        let ip: Ip = serde_json::from_str(r#"{"id": "abc", "address": "51.15.0.1", "server": null}"#).unwrap();
        assert_eq!(ip.address, "51.15.0.1");
        assert!(ip.server.is_none());
        assert!(ip.tags.is_empty());
    }

    #[test]
    fn volume_states() {
        let mut volume = Volume {
            state: "resizing".to_string(),
            ..Volume::default()
        };
        assert!(volume.is_transient());
        volume.state = "available".to_string();
        assert!(!volume.is_transient());
        volume.state = "error".to_string();
        assert!(volume.is_failed());
    }

    #[test]
    fn list_filter_query() {
        let filter = ListFilter {
            name: Some("web".to_string()),
            project: None,
        };
        assert_eq!(filter.query(), vec![("name", "web".to_string())]);
    }
}
