//! Cluster state sampler.
//!
//! Pure query operations against the cluster management API: one topology
//! query plus one guest listing per node and kind, every cycle. No caching
//! and no retry; a transport failure propagates and terminates the loop.
//! The only hardening applied is a per-request timeout so a hung API cannot
//! wedge the refresh loop forever.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PanelError, Result};
use crate::model::{ClusterNode, Guest, GuestKind, GuestStatus};

/// Query surface the runtime samples from.
pub trait ClusterSampler: Send {
    fn nodes(&self) -> Result<Vec<ClusterNode>>;
    fn guests(&self, node: &str, kind: GuestKind) -> Result<Vec<Guest>>;
}

/// Envelope every API response is wrapped in.
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct NodeRecord {
    node: String,
}

/// Guest record as returned by the per-node `qemu` / `lxc` listings. Metric
/// fields can be absent for guests that never ran; `tags` is a
/// semicolon-separated string and absent when no tags are set.
#[derive(Debug, Deserialize)]
struct GuestRecord {
    vmid: u32,
    #[serde(default)]
    name: Option<String>,
    status: String,
    #[serde(default)]
    cpu: Option<f64>,
    #[serde(default)]
    mem: Option<u64>,
    #[serde(default)]
    tags: Option<String>,
}

impl GuestRecord {
    fn into_guest(self, kind: GuestKind) -> Guest {
        Guest {
            vmid: self.vmid,
            name: self.name.unwrap_or_default(),
            kind,
            status: GuestStatus::from_wire(&self.status),
            cpu: self.cpu.unwrap_or(0.0),
            mem: self.mem.unwrap_or(0),
            tags: parse_tags(self.tags.as_deref()),
        }
    }
}

fn parse_tags(raw: Option<&str>) -> BTreeSet<String> {
    raw.map(|value| {
        value
            .split(';')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

/// Blocking sampler over the Proxmox-style HTTP API.
pub struct ProxmoxSampler {
    agent: ureq::Agent,
    base_url: String,
    token: Option<String>,
}

impl ProxmoxSampler {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    fn fetch<T>(&self, path: &str) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}/api2/json/{path}", self.base_url);
        let mut request = self.agent.get(&url);
        if let Some(token) = &self.token {
            request = request.set("Authorization", &format!("PVEAPIToken={token}"));
        }
        let response = request
            .call()
            .map_err(|err| PanelError::Transport(format!("GET {url}: {err}")))?;
        let envelope: ApiEnvelope<T> = response
            .into_json()
            .map_err(|err| PanelError::Transport(format!("decode {url}: {err}")))?;
        Ok(envelope.data)
    }
}

impl ClusterSampler for ProxmoxSampler {
    fn nodes(&self) -> Result<Vec<ClusterNode>> {
        let records: Vec<NodeRecord> = self.fetch("nodes")?;
        Ok(records
            .into_iter()
            .map(|record| ClusterNode::new(record.node))
            .collect())
    }

    fn guests(&self, node: &str, kind: GuestKind) -> Result<Vec<Guest>> {
        let records: Vec<GuestRecord> = self.fetch(&format!("nodes/{node}/{}", kind.api_path()))?;
        Ok(records
            .into_iter()
            .map(|record| record.into_guest(kind))
            .collect())
    }
}
