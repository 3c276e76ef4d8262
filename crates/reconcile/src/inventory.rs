//! Local VM inventory, loaded from a vSphere export.
//!
//! Two export shapes are understood:
//!
//! - [`Layout::Flat`]: `{ "<vm>": { attributes } }`
//! - [`Layout::ByCluster`]: `{ "<datacenter>": { "<cluster>": { "<host>": { "<vm>": { attributes } } } } }`
//!
//! The loader keeps every VM regardless of power state; filtering is done by
//! the reconciler.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

/// Power state as reported by vSphere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PowerState {
    PoweredOn,
    PoweredOff,
    /// Anything else (`suspended`, unknown values).
    Other(String),
}

impl PowerState {
    pub fn is_on(&self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

impl From<String> for PowerState {
    fn from(value: String) -> Self {
        match value.as_str() {
            "poweredOn" => Self::PoweredOn,
            "poweredOff" => Self::PoweredOff,
            _ => Self::Other(value),
        }
    }
}

impl From<PowerState> for String {
    fn from(state: PowerState) -> Self {
        state.to_string()
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoweredOn => write!(f, "poweredOn"),
            Self::PoweredOff => write!(f, "poweredOff"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// One (interface, address) pair of a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub name: String,
    pub ip: IpAddr,
}

/// A VM from the local export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalVm {
    pub name: String,
    pub power_state: PowerState,
    pub cluster: String,
    /// Folder name, used as the project.
    pub project: String,
    /// ESXi host, known in the by-cluster layout.
    pub host: Option<String>,
    /// Address pairs in export order.
    pub interfaces: Vec<Interface>,
}

/// Shape of the export document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    #[default]
    Flat,
    ByCluster,
}

#[derive(Debug, Deserialize)]
struct RawNic {
    #[serde(default, alias = "mac", alias = "name")]
    interface: Option<String>,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default, alias = "ipAddress", alias = "ips")]
    ip_addresses: Option<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct RawVm {
    #[serde(alias = "powerState", alias = "power")]
    power_state: PowerState,
    #[serde(default)]
    cluster: Option<String>,
    #[serde(alias = "project")]
    folder: String,
    #[serde(default)]
    host: Option<String>,
    #[serde(default, alias = "nics", alias = "network")]
    net: Vec<RawNic>,
}

type ByCluster = BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, RawVm>>>>;

impl RawVm {
    fn into_vm(self, name: String, cluster: Option<&str>, host: Option<&str>) -> Result<LocalVm> {
        let cluster = self
            .cluster
            .filter(|c| !c.is_empty())
            .or_else(|| cluster.map(str::to_string))
            .ok_or_else(|| Error::InvalidRecord {
                vm: name.clone(),
                message: "missing cluster".to_string(),
            })?;

        let mut interfaces = Vec::new();
        for (index, nic) in self.net.into_iter().enumerate() {
            let iface = nic.interface.unwrap_or_else(|| format!("nic{index}"));
            let listed = nic.ip_addresses.into_iter().flatten().flatten();
            // Powered-off VMs report blank addresses
            for raw in nic.ip.into_iter().chain(listed) {
                let raw = raw.trim();
                if raw.is_empty() {
                    continue;
                }
                let ip = raw.parse().map_err(|_| Error::InvalidRecord {
                    vm: name.clone(),
                    message: format!("invalid IP address '{raw}' on {iface}"),
                })?;
                interfaces.push(Interface {
                    name: iface.clone(),
                    ip,
                });
            }
        }

        Ok(LocalVm {
            name,
            power_state: self.power_state,
            cluster,
            project: self.folder,
            host: self.host.or_else(|| host.map(str::to_string)),
            interfaces,
        })
    }
}

/// The full local dataset, keyed by VM name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    vms: BTreeMap<String, LocalVm>,
}

impl Inventory {
    /// Load an export file.
    pub fn load(path: &Path, layout: Layout) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                Error::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                Error::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let inventory = Self::parse(&content, layout, path)?;
        log::info!("loaded {} VMs from {}", inventory.len(), path.display());
        Ok(inventory)
    }

    /// Parse an export held in memory.
    pub fn from_json(json: &str, layout: Layout) -> Result<Self> {
        Self::parse(json, layout, Path::new("<memory>"))
    }

    fn parse(json: &str, layout: Layout, path: &Path) -> Result<Self> {
        let parse_err = |source| Error::Parse {
            path: path.to_path_buf(),
            source,
        };

        let mut vms = BTreeMap::new();
        match layout {
            Layout::Flat => {
                let raw: BTreeMap<String, RawVm> = serde_json::from_str(json).map_err(parse_err)?;
                for (name, record) in raw {
                    let vm = record.into_vm(name.clone(), None, None)?;
                    vms.insert(name, vm);
                }
            }
            Layout::ByCluster => {
                let raw: ByCluster = serde_json::from_str(json).map_err(parse_err)?;
                for (datacenter, clusters) in raw {
                    for (cluster, hosts) in clusters {
                        for (host, records) in hosts {
                            for (name, record) in records {
                                let vm = record.into_vm(name.clone(), Some(&cluster), Some(&host))?;
                                if vms.insert(name.clone(), vm).is_some() {
                                    log::warn!(
                                        "VM '{name}' listed more than once (last seen on {datacenter}/{cluster}/{host})"
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(Self { vms })
    }

    /// Keep only VMs placed in `cluster`.
    pub fn retain_cluster(&mut self, cluster: &str) {
        self.vms.retain(|_, vm| vm.cluster == cluster);
    }

    pub fn get(&self, name: &str) -> Option<&LocalVm> {
        self.vms.get(name)
    }

    /// VMs in name order.
    pub fn iter(&self) -> impl Iterator<Item = &LocalVm> {
        self.vms.values()
    }

    pub fn len(&self) -> usize {
        self.vms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vms.is_empty()
    }
}

impl FromIterator<LocalVm> for Inventory {
    fn from_iter<I: IntoIterator<Item = LocalVm>>(iter: I) -> Self {
        Self {
            vms: iter.into_iter().map(|vm| (vm.name.clone(), vm)).collect(),
        }
    }
}
