//! Domain model for cluster inventory snapshots.
//!
//! Everything here is ephemeral: nodes and guests are rebuilt from scratch on
//! every polling cycle and carry no cross-cycle identity.

use std::collections::BTreeSet;

/// A node in the cluster, identified by name (e.g. `pve3`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    pub id: String,
}

impl ClusterNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Which inventory listing a guest came from. Rendering is kind-agnostic;
/// the kind only selects the API endpoint that produced the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestKind {
    Vm,
    Container,
}

impl GuestKind {
    /// Path segment of the per-node listing endpoint.
    pub fn api_path(&self) -> &'static str {
        match self {
            GuestKind::Vm => "qemu",
            GuestKind::Container => "lxc",
        }
    }
}

/// Guest status as reported by the cluster. Only `running` is meaningful to
/// the panel; every other wire value is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestStatus {
    Running,
    Other(String),
}

impl GuestStatus {
    pub fn from_wire(raw: &str) -> Self {
        if raw == "running" {
            GuestStatus::Running
        } else {
            GuestStatus::Other(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            GuestStatus::Running => "running",
            GuestStatus::Other(raw) => raw,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, GuestStatus::Running)
    }
}

/// One guest record from a polling cycle.
///
/// `vmid` uniquely identifies a guest within a single frame; it is not
/// required to be stable across frames.
#[derive(Debug, Clone, PartialEq)]
pub struct Guest {
    pub vmid: u32,
    pub name: String,
    pub kind: GuestKind,
    pub status: GuestStatus,
    /// CPU usage as a fraction in `0.0..=1.0`.
    pub cpu: f64,
    /// Memory usage in bytes.
    pub mem: u64,
    pub tags: BTreeSet<String>,
}

impl Guest {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}
