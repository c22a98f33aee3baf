//! In-memory cloud for handler tests
//!
//! Implements every API trait over hash maps, counts calls by method name and
//! can replay injected failures or report freshly created objects in a
//! transient state for a number of reads.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use meridian_core::provider::{Operation, OperationContext};
use meridian_core::resource::{ResourceData, Value};

use crate::api::baremetal::{
    BaremetalApi, CreateServerRequest, InstallServerRequest, Server, ServerInstall, ServerOption,
    UpdateServerRequest,
};
use crate::api::instance::{
    CreateIpRequest, CreateSnapshotRequest, CreateVolumeRequest, InstanceApi, Ip, ListFilter, Snapshot,
    UpdateIpRequest, UpdateSnapshotRequest, UpdateVolumeRequest, Volume, VolumeRef,
};
use crate::api::lb::{CreateLbRequest, Lb, LbApi, LbIp, LbPrivateNetwork, LbPrivateNetworks, UpdateLbRequest};
use crate::api::vpc::{CreatePrivateNetworkRequest, PrivateNetwork, UpdatePrivateNetworkRequest, VpcApi};
use crate::api::vpcgw::{
    CreateGatewayNetworkRequest, CreateGatewayRequest, Gateway, GatewayApi, GatewayIp, GatewayNetwork, GatewayType,
    UpdateGatewayNetworkRequest, UpdateGatewayRequest,
};
use crate::config::RetrySettings;
use crate::envelope::Patch;
use crate::errors::{ApiError, ScalewayError, ScalewayResult};
use crate::locality::{Region, Zone};
use crate::provider::Meta;
use crate::scope::ClientDefaults;

pub(crate) const PROJECT: &str = "11111111-2222-3333-4444-555555555555";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap()
}

fn apply<T>(field: &mut T, patch: &Patch<T>)
where
    T: Clone + Default,
{
    match patch {
        Patch::Omit => {}
        Patch::Clear => *field = T::default(),
        Patch::Set(value) => *field = value.clone(),
    }
}

pub(crate) fn not_found(kind: &str) -> ScalewayError {
    ScalewayError::Api(ApiError::new(404, format!("{} not found", kind)).with_type("not_found"))
}

pub(crate) fn transient_state(kind: &str) -> ScalewayError {
    ScalewayError::Api(
        ApiError::new(409, format!("{} is in a transient state", kind)).with_type("transient_state"),
    )
}

/// Handler metadata with zero polling waits and `fr-par-1` defaults
pub(crate) fn meta() -> Arc<Meta> {
    Arc::new(Meta::new(
        ClientDefaults {
            zone: Some("fr-par-1".parse().unwrap()),
            region: Some("fr-par".parse().unwrap()),
            project_id: Some(PROJECT.to_string()),
            organization_id: None,
        },
        RetrySettings::for_tests(),
    ))
}

pub(crate) fn ctx(operation: Operation) -> OperationContext {
    OperationContext::new(operation, Duration::from_secs(60))
}

pub(crate) fn attrs(pairs: Vec<(&str, Value)>) -> HashMap<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

/// Handle for a resource about to be created
pub(crate) fn planned(resource_type: &str, pairs: Vec<(&str, Value)>) -> ResourceData {
    ResourceData::new(resource_type, attrs(pairs))
}

/// Handle for an update: the persisted state with `changes` applied on top
pub(crate) fn changed(state: &ResourceData, changes: Vec<(&str, Value)>) -> ResourceData {
    let mut planned = state.attributes().clone();
    planned.extend(attrs(changes));
    ResourceData::existing(state.resource_type(), state.id(), state.attributes().clone(), planned)
}

/// Handle for a read or delete of the persisted state
pub(crate) fn persisted(state: &ResourceData) -> ResourceData {
    ResourceData::from_state(state.resource_type(), state.id(), state.attributes().clone())
}

#[derive(Default)]
pub(crate) struct FakeCloud {
    pub ips: Mutex<HashMap<String, Ip>>,
    pub volumes: Mutex<HashMap<String, Volume>>,
    pub snapshots: Mutex<HashMap<String, Snapshot>>,
    pub private_networks: Mutex<HashMap<String, PrivateNetwork>>,
    pub gateways: Mutex<HashMap<String, Gateway>>,
    pub gateway_networks: Mutex<HashMap<String, GatewayNetwork>>,
    pub lbs: Mutex<HashMap<String, Lb>>,
    pub lb_attachments: Mutex<HashMap<String, Vec<LbPrivateNetwork>>>,
    pub servers: Mutex<HashMap<String, Server>>,
    calls: Mutex<Vec<String>>,
    failures: Mutex<HashMap<String, VecDeque<ScalewayError>>>,
    transient_reads: AtomicUsize,
    settling: Mutex<HashMap<String, usize>>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Report new objects in a transient state for their first `reads` reads
    pub fn with_transient_reads(self: Arc<Self>, reads: usize) -> Arc<Self> {
        self.transient_reads.store(reads, Ordering::SeqCst);
        self
    }

    /// Fail the next call to `method` with `error`
    pub fn fail_next(&self, method: &str, error: ScalewayError) {
        lock(&self.failures)
            .entry(method.to_string())
            .or_default()
            .push_back(error);
    }

    /// Number of calls to `method`
    pub fn calls(&self, method: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.as_str() == method).count()
    }

    /// Every call so far, in order
    pub fn call_log(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// Number of calls to any method starting with `prefix`
    pub fn calls_starting_with(&self, prefix: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.starts_with(prefix)).count()
    }

    fn record(&self, method: &str) -> ScalewayResult<()> {
        lock(&self.calls).push(method.to_string());
        match lock(&self.failures).get_mut(method).and_then(VecDeque::pop_front) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn created(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let reads = self.transient_reads.load(Ordering::SeqCst);
        if reads > 0 {
            lock(&self.settling).insert(id.clone(), reads);
        }
        id
    }

    /// Returns true while `id` should still be reported as transient
    fn is_settling(&self, id: &str) -> bool {
        let mut settling = lock(&self.settling);
        match settling.get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn fetch<T: Clone>(&self, store: &Mutex<HashMap<String, T>>, id: &str, kind: &str) -> ScalewayResult<T> {
        lock(store).get(id).cloned().ok_or_else(|| not_found(kind))
    }

    fn remove<T>(&self, store: &Mutex<HashMap<String, T>>, id: &str, kind: &str) -> ScalewayResult<()> {
        lock(store).remove(id).map(|_| ()).ok_or_else(|| not_found(kind))
    }

    pub fn insert_ip(&self, zone: &str, address: &str) -> Ip {
        let ip = Ip {
            id: uuid::Uuid::new_v4().to_string(),
            address: address.to_string(),
            project: PROJECT.to_string(),
            zone: zone.to_string(),
            ..Ip::default()
        };
        lock(&self.ips).insert(ip.id.clone(), ip.clone());
        ip
    }

    pub fn insert_lb(&self, zone: &str, name: &str) -> Lb {
        let lb = Lb {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            status: "ready".to_string(),
            lb_type: "LB-S".to_string(),
            project_id: PROJECT.to_string(),
            zone: zone.to_string(),
            ..Lb::default()
        };
        lock(&self.lbs).insert(lb.id.clone(), lb.clone());
        lb
    }

    pub fn insert_volume(&self, zone: &str, name: &str) -> Volume {
        let volume = Volume {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            size: 20_000_000_000,
            volume_type: "b_ssd".to_string(),
            state: "available".to_string(),
            project: PROJECT.to_string(),
            zone: zone.to_string(),
            ..Volume::default()
        };
        lock(&self.volumes).insert(volume.id.clone(), volume.clone());
        volume
    }

    pub fn insert_private_network(&self, region: &str, name: &str) -> PrivateNetwork {
        let pn = PrivateNetwork {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            project_id: PROJECT.to_string(),
            region: region.to_string(),
            ..PrivateNetwork::default()
        };
        lock(&self.private_networks).insert(pn.id.clone(), pn.clone());
        pn
    }
}

fn project_matches(filter: Option<&str>, project: &str) -> bool {
    filter.is_none_or(|p| p == project)
}

#[async_trait]
impl InstanceApi for FakeCloud {
    async fn create_ip(&self, zone: &Zone, request: &CreateIpRequest) -> ScalewayResult<Ip> {
        self.record("create_ip")?;
        let ip = Ip {
            id: self.created(),
            address: "51.15.0.1".to_string(),
            reverse: Some("51-15-0-1.instances.scw.cloud".to_string()),
            project: request.project.clone().unwrap_or_default(),
            tags: request.tags.clone(),
            zone: zone.to_string(),
            ..Ip::default()
        };
        lock(&self.ips).insert(ip.id.clone(), ip.clone());
        Ok(ip)
    }

    async fn get_ip(&self, _zone: &Zone, id: &str) -> ScalewayResult<Ip> {
        self.record("get_ip")?;
        self.fetch(&self.ips, id, "ip")
    }

    async fn update_ip(&self, _zone: &Zone, id: &str, request: &UpdateIpRequest) -> ScalewayResult<Ip> {
        self.record("update_ip")?;
        let mut ips = lock(&self.ips);
        let ip = ips.get_mut(id).ok_or_else(|| not_found("ip"))?;
        match &request.reverse {
            Patch::Omit => {}
            Patch::Clear => ip.reverse = None,
            Patch::Set(reverse) => ip.reverse = Some(reverse.clone()),
        }
        apply(&mut ip.tags, &request.tags);
        Ok(ip.clone())
    }

    async fn delete_ip(&self, _zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.record("delete_ip")?;
        self.remove(&self.ips, id, "ip")
    }

    async fn list_ips(&self, _zone: &Zone, filter: &ListFilter) -> ScalewayResult<Vec<Ip>> {
        self.record("list_ips")?;
        Ok(lock(&self.ips)
            .values()
            .filter(|ip| project_matches(filter.project.as_deref(), &ip.project))
            .cloned()
            .collect())
    }

    async fn create_volume(&self, zone: &Zone, request: &CreateVolumeRequest) -> ScalewayResult<Volume> {
        self.record("create_volume")?;
        let volume = Volume {
            id: self.created(),
            name: request.name.clone(),
            size: request.size.unwrap_or(10_000_000_000),
            volume_type: request.volume_type.clone(),
            state: "available".to_string(),
            project: request.project.clone().unwrap_or_default(),
            tags: request.tags.clone(),
            zone: zone.to_string(),
            ..Volume::default()
        };
        lock(&self.volumes).insert(volume.id.clone(), volume.clone());
        Ok(volume)
    }

    async fn get_volume(&self, _zone: &Zone, id: &str) -> ScalewayResult<Volume> {
        self.record("get_volume")?;
        let mut volume = self.fetch(&self.volumes, id, "volume")?;
        if self.is_settling(id) {
            volume.state = "fetching".to_string();
        }
        Ok(volume)
    }

    async fn update_volume(&self, _zone: &Zone, id: &str, request: &UpdateVolumeRequest) -> ScalewayResult<Volume> {
        self.record("update_volume")?;
        let mut volumes = lock(&self.volumes);
        let volume = volumes.get_mut(id).ok_or_else(|| not_found("volume"))?;
        if let Some(name) = &request.name {
            volume.name = name.clone();
        }
        if let Some(size) = request.size {
            volume.size = size;
        }
        apply(&mut volume.tags, &request.tags);
        Ok(volume.clone())
    }

    async fn delete_volume(&self, _zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.record("delete_volume")?;
        self.remove(&self.volumes, id, "volume")
    }

    async fn list_volumes(&self, _zone: &Zone, filter: &ListFilter) -> ScalewayResult<Vec<Volume>> {
        self.record("list_volumes")?;
        Ok(lock(&self.volumes)
            .values()
            .filter(|v| filter.name.as_deref().is_none_or(|name| v.name.contains(name)))
            .filter(|v| project_matches(filter.project.as_deref(), &v.project))
            .cloned()
            .collect())
    }

    async fn create_snapshot(&self, zone: &Zone, request: &CreateSnapshotRequest) -> ScalewayResult<Snapshot> {
        self.record("create_snapshot")?;
        let volume = self.fetch(&self.volumes, &request.volume_id, "volume")?;
        let snapshot = Snapshot {
            id: self.created(),
            name: request.name.clone(),
            state: "available".to_string(),
            size: volume.size,
            volume_type: volume.volume_type.clone(),
            base_volume: Some(VolumeRef {
                id: volume.id.clone(),
                name: volume.name.clone(),
            }),
            project: request.project.clone().unwrap_or_default(),
            tags: request.tags.clone(),
            zone: zone.to_string(),
            creation_date: Some("2026-01-01T10:00:00Z".to_string()),
        };
        lock(&self.snapshots).insert(snapshot.id.clone(), snapshot.clone());
        Ok(snapshot)
    }

    async fn get_snapshot(&self, _zone: &Zone, id: &str) -> ScalewayResult<Snapshot> {
        self.record("get_snapshot")?;
        let mut snapshot = self.fetch(&self.snapshots, id, "snapshot")?;
        if self.is_settling(id) {
            snapshot.state = "snapshotting".to_string();
        }
        Ok(snapshot)
    }

    async fn update_snapshot(
        &self,
        _zone: &Zone,
        id: &str,
        request: &UpdateSnapshotRequest,
    ) -> ScalewayResult<Snapshot> {
        self.record("update_snapshot")?;
        let mut snapshots = lock(&self.snapshots);
        let snapshot = snapshots.get_mut(id).ok_or_else(|| not_found("snapshot"))?;
        if let Some(name) = &request.name {
            snapshot.name = name.clone();
        }
        apply(&mut snapshot.tags, &request.tags);
        Ok(snapshot.clone())
    }

    async fn delete_snapshot(&self, _zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.record("delete_snapshot")?;
        self.remove(&self.snapshots, id, "snapshot")
    }
}

#[async_trait]
impl VpcApi for FakeCloud {
    async fn create_private_network(
        &self,
        region: &Region,
        request: &CreatePrivateNetworkRequest,
    ) -> ScalewayResult<PrivateNetwork> {
        self.record("create_private_network")?;
        let pn = PrivateNetwork {
            id: self.created(),
            name: request.name.clone(),
            project_id: request.project_id.clone().unwrap_or_default(),
            tags: request.tags.clone(),
            subnets: if request.subnets.is_empty() {
                vec!["172.16.0.0/22".to_string()]
            } else {
                request.subnets.clone()
            },
            region: region.to_string(),
            ..PrivateNetwork::default()
        };
        lock(&self.private_networks).insert(pn.id.clone(), pn.clone());
        Ok(pn)
    }

    async fn get_private_network(&self, _region: &Region, id: &str) -> ScalewayResult<PrivateNetwork> {
        self.record("get_private_network")?;
        self.fetch(&self.private_networks, id, "private network")
    }

    async fn update_private_network(
        &self,
        _region: &Region,
        id: &str,
        request: &UpdatePrivateNetworkRequest,
    ) -> ScalewayResult<PrivateNetwork> {
        self.record("update_private_network")?;
        let mut pns = lock(&self.private_networks);
        let pn = pns.get_mut(id).ok_or_else(|| not_found("private network"))?;
        if let Some(name) = &request.name {
            pn.name = name.clone();
        }
        apply(&mut pn.tags, &request.tags);
        Ok(pn.clone())
    }

    async fn delete_private_network(&self, _region: &Region, id: &str) -> ScalewayResult<()> {
        self.record("delete_private_network")?;
        self.remove(&self.private_networks, id, "private network")
    }

    async fn list_private_networks(
        &self,
        _region: &Region,
        name: Option<&str>,
        project_id: Option<&str>,
    ) -> ScalewayResult<Vec<PrivateNetwork>> {
        self.record("list_private_networks")?;
        Ok(lock(&self.private_networks)
            .values()
            .filter(|pn| name.is_none_or(|name| pn.name.contains(name)))
            .filter(|pn| project_matches(project_id, &pn.project_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl GatewayApi for FakeCloud {
    async fn create_gateway(&self, zone: &Zone, request: &CreateGatewayRequest) -> ScalewayResult<Gateway> {
        self.record("create_gateway")?;
        let gateway = Gateway {
            id: self.created(),
            name: request.name.clone(),
            status: "running".to_string(),
            gateway_type: Some(GatewayType {
                name: request.gateway_type.clone(),
            }),
            ip: Some(GatewayIp {
                id: request
                    .ip_id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                address: "51.15.0.2".to_string(),
            }),
            project_id: request.project_id.clone().unwrap_or_default(),
            tags: request.tags.clone(),
            upstream_dns_servers: request.upstream_dns_servers.clone(),
            bastion_enabled: request.enable_bastion,
            zone: zone.to_string(),
            ..Gateway::default()
        };
        lock(&self.gateways).insert(gateway.id.clone(), gateway.clone());
        Ok(gateway)
    }

    async fn get_gateway(&self, _zone: &Zone, id: &str) -> ScalewayResult<Gateway> {
        self.record("get_gateway")?;
        let mut gateway = self.fetch(&self.gateways, id, "gateway")?;
        if self.is_settling(id) {
            gateway.status = "allocating".to_string();
        }
        Ok(gateway)
    }

    async fn update_gateway(&self, _zone: &Zone, id: &str, request: &UpdateGatewayRequest) -> ScalewayResult<Gateway> {
        self.record("update_gateway")?;
        let mut gateways = lock(&self.gateways);
        let gateway = gateways.get_mut(id).ok_or_else(|| not_found("gateway"))?;
        if let Some(name) = &request.name {
            gateway.name = name.clone();
        }
        apply(&mut gateway.tags, &request.tags);
        apply(&mut gateway.upstream_dns_servers, &request.upstream_dns_servers);
        if let Some(enabled) = request.enable_bastion {
            gateway.bastion_enabled = enabled;
        }
        Ok(gateway.clone())
    }

    async fn delete_gateway(&self, _zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.record("delete_gateway")?;
        self.remove(&self.gateways, id, "gateway")
    }

    async fn create_gateway_network(
        &self,
        zone: &Zone,
        request: &CreateGatewayNetworkRequest,
    ) -> ScalewayResult<GatewayNetwork> {
        self.record("create_gateway_network")?;
        self.fetch(&self.gateways, &request.gateway_id, "gateway")?;
        let network = GatewayNetwork {
            id: self.created(),
            gateway_id: request.gateway_id.clone(),
            private_network_id: request.private_network_id.clone(),
            status: "ready".to_string(),
            enable_masquerade: request.enable_masquerade,
            address: request.address.clone(),
            mac_address: Some("02:00:00:00:00:01".to_string()),
            zone: zone.to_string(),
            ..GatewayNetwork::default()
        };
        lock(&self.gateway_networks).insert(network.id.clone(), network.clone());
        Ok(network)
    }

    async fn get_gateway_network(&self, _zone: &Zone, id: &str) -> ScalewayResult<GatewayNetwork> {
        self.record("get_gateway_network")?;
        let mut network = self.fetch(&self.gateway_networks, id, "gateway network")?;
        if self.is_settling(id) {
            network.status = "attaching".to_string();
        }
        Ok(network)
    }

    async fn update_gateway_network(
        &self,
        _zone: &Zone,
        id: &str,
        request: &UpdateGatewayNetworkRequest,
    ) -> ScalewayResult<GatewayNetwork> {
        self.record("update_gateway_network")?;
        let mut networks = lock(&self.gateway_networks);
        let network = networks.get_mut(id).ok_or_else(|| not_found("gateway network"))?;
        if let Some(masquerade) = request.enable_masquerade {
            network.enable_masquerade = masquerade;
        }
        match &request.address {
            Patch::Omit => {}
            Patch::Clear => network.address = None,
            Patch::Set(address) => network.address = Some(address.clone()),
        }
        Ok(network.clone())
    }

    async fn delete_gateway_network(&self, _zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.record("delete_gateway_network")?;
        self.remove(&self.gateway_networks, id, "gateway network")
    }
}

#[async_trait]
impl LbApi for FakeCloud {
    async fn create_lb(&self, zone: &Zone, request: &CreateLbRequest) -> ScalewayResult<Lb> {
        self.record("create_lb")?;
        let lb = Lb {
            id: self.created(),
            name: request.name.clone(),
            description: request.description.clone(),
            status: "ready".to_string(),
            lb_type: request.lb_type.to_uppercase(),
            ip: vec![LbIp {
                id: request
                    .ip_id
                    .clone()
                    .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                ip_address: "51.15.0.3".to_string(),
                reverse: None,
            }],
            tags: request.tags.clone(),
            project_id: request.project_id.clone().unwrap_or_default(),
            ssl_compatibility_level: request
                .ssl_compatibility_level
                .clone()
                .unwrap_or_else(|| "ssl_compatibility_level_intermediate".to_string()),
            zone: zone.to_string(),
            ..Lb::default()
        };
        lock(&self.lbs).insert(lb.id.clone(), lb.clone());
        Ok(lb)
    }

    async fn get_lb(&self, _zone: &Zone, id: &str) -> ScalewayResult<Lb> {
        self.record("get_lb")?;
        let mut lb = self.fetch(&self.lbs, id, "lb")?;
        if self.is_settling(id) {
            lb.status = "pending".to_string();
        }
        Ok(lb)
    }

    async fn update_lb(&self, _zone: &Zone, id: &str, request: &UpdateLbRequest) -> ScalewayResult<Lb> {
        self.record("update_lb")?;
        let mut lbs = lock(&self.lbs);
        let lb = lbs.get_mut(id).ok_or_else(|| not_found("lb"))?;
        if let Some(name) = &request.name {
            lb.name = name.clone();
        }
        apply(&mut lb.description, &request.description);
        apply(&mut lb.tags, &request.tags);
        if let Some(level) = &request.ssl_compatibility_level {
            lb.ssl_compatibility_level = level.clone();
        }
        Ok(lb.clone())
    }

    async fn delete_lb(&self, _zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.record("delete_lb")?;
        if lock(&self.lb_attachments).get(id).is_some_and(|pns| !pns.is_empty()) {
            return Err(ScalewayError::Api(
                ApiError::new(412, "private networks still attached").with_type("precondition_failed"),
            ));
        }
        self.remove(&self.lbs, id, "lb")
    }

    async fn list_lbs(&self, _zone: &Zone, name: Option<&str>, project_id: Option<&str>) -> ScalewayResult<Vec<Lb>> {
        self.record("list_lbs")?;
        Ok(lock(&self.lbs)
            .values()
            .filter(|lb| name.is_none_or(|name| lb.name.contains(name)))
            .filter(|lb| project_matches(project_id, &lb.project_id))
            .cloned()
            .collect())
    }

    async fn migrate_lb(&self, _zone: &Zone, id: &str, lb_type: &str) -> ScalewayResult<Lb> {
        self.record("migrate_lb")?;
        let mut lbs = lock(&self.lbs);
        let lb = lbs.get_mut(id).ok_or_else(|| not_found("lb"))?;
        lb.lb_type = lb_type.to_uppercase();
        Ok(lb.clone())
    }

    async fn list_lb_private_networks(&self, _zone: &Zone, lb_id: &str) -> ScalewayResult<LbPrivateNetworks> {
        self.record("list_lb_private_networks")?;
        Ok(LbPrivateNetworks(
            lock(&self.lb_attachments).get(lb_id).cloned().unwrap_or_default(),
        ))
    }

    async fn attach_private_network(&self, _zone: &Zone, lb_id: &str, private_network_id: &str) -> ScalewayResult<()> {
        self.record("attach_private_network")?;
        lock(&self.lb_attachments)
            .entry(lb_id.to_string())
            .or_default()
            .push(LbPrivateNetwork {
                private_network_id: private_network_id.to_string(),
                status: "ready".to_string(),
            });
        Ok(())
    }

    async fn detach_private_network(&self, _zone: &Zone, lb_id: &str, private_network_id: &str) -> ScalewayResult<()> {
        self.record("detach_private_network")?;
        let mut attachments = lock(&self.lb_attachments);
        let pns = attachments.get_mut(lb_id).ok_or_else(|| not_found("lb private network"))?;
        let before = pns.len();
        pns.retain(|pn| pn.private_network_id != private_network_id);
        if pns.len() == before {
            return Err(not_found("lb private network"));
        }
        Ok(())
    }
}

#[async_trait]
impl BaremetalApi for FakeCloud {
    async fn create_server(&self, zone: &Zone, request: &CreateServerRequest) -> ScalewayResult<Server> {
        self.record("create_server")?;
        let server = Server {
            id: self.created(),
            name: request.name.clone(),
            description: request.description.clone(),
            status: "ready".to_string(),
            offer_id: request.offer_id.clone(),
            tags: request.tags.clone(),
            project_id: request.project_id.clone().unwrap_or_default(),
            zone: zone.to_string(),
            ..Server::default()
        };
        lock(&self.servers).insert(server.id.clone(), server.clone());
        Ok(server)
    }

    async fn get_server(&self, _zone: &Zone, id: &str) -> ScalewayResult<Server> {
        self.record("get_server")?;
        let mut server = self.fetch(&self.servers, id, "server")?;
        if self.is_settling(id) {
            server.status = "delivering".to_string();
        }
        Ok(server)
    }

    async fn update_server(&self, _zone: &Zone, id: &str, request: &UpdateServerRequest) -> ScalewayResult<Server> {
        self.record("update_server")?;
        let mut servers = lock(&self.servers);
        let server = servers.get_mut(id).ok_or_else(|| not_found("server"))?;
        if let Some(name) = &request.name {
            server.name = name.clone();
        }
        apply(&mut server.description, &request.description);
        apply(&mut server.tags, &request.tags);
        Ok(server.clone())
    }

    async fn delete_server(&self, _zone: &Zone, id: &str) -> ScalewayResult<()> {
        self.record("delete_server")?;
        self.remove(&self.servers, id, "server")
    }

    async fn install_server(&self, _zone: &Zone, id: &str, request: &InstallServerRequest) -> ScalewayResult<Server> {
        self.record("install_server")?;
        let mut servers = lock(&self.servers);
        let server = servers.get_mut(id).ok_or_else(|| not_found("server"))?;
        server.install = Some(ServerInstall {
            os_id: request.os_id.clone(),
            hostname: request.hostname.clone(),
            ssh_key_ids: request.ssh_key_ids.clone(),
            status: "completed".to_string(),
        });
        Ok(server.clone())
    }

    async fn add_option(
        &self,
        _zone: &Zone,
        server_id: &str,
        option_id: &str,
        expires_at: Option<&str>,
    ) -> ScalewayResult<Server> {
        self.record("add_option")?;
        let mut servers = lock(&self.servers);
        let server = servers.get_mut(server_id).ok_or_else(|| not_found("server"))?;
        server.options.push(ServerOption {
            id: option_id.to_string(),
            name: format!("option-{}", &option_id[..option_id.len().min(4)]),
            status: "option_status_enabled".to_string(),
            expires_at: expires_at.map(str::to_string),
        });
        Ok(server.clone())
    }

    async fn delete_option(&self, _zone: &Zone, server_id: &str, option_id: &str) -> ScalewayResult<()> {
        self.record("delete_option")?;
        let mut servers = lock(&self.servers);
        let server = servers.get_mut(server_id).ok_or_else(|| not_found("server"))?;
        server.options.retain(|option| option.id != option_id);
        Ok(())
    }
}
