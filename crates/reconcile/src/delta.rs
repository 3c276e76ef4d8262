//! Per-field deltas for VMs present on both sides.
//!
//! The project tag and addresses are only filled when the remote side has
//! none; the container link is the one relationship that is corrected when
//! wrong.

use crate::diff::{Reconciliation, RemoteSummary};
use crate::error::{Error, LookupKind, Result};
use crate::inventory::{Interface, Inventory, LocalVm};
use racktables::{ClusterIndex, ObjectId, ProjectTagIndex, TagId};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;

/// Default prefix for interface names recorded with new addresses.
pub const DEFAULT_INTERFACE_PREFIX: &str = "veth";

/// How the container link has to change, decided on names alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerChange {
    /// Remote already matches.
    Keep,
    /// Remote has no container.
    Link,
    /// Remote has a different container.
    Replace,
}

/// Compare the remote container name against the local cluster name.
pub fn container_change(remote: &str, local: &str) -> ContainerChange {
    if remote == local {
        ContainerChange::Keep
    } else if remote.is_empty() {
        ContainerChange::Link
    } else {
        ContainerChange::Replace
    }
}

/// Container delta with resolved ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerDelta {
    Keep,
    Link {
        to: ObjectId,
    },
    Replace {
        from: ObjectId,
        to: ObjectId,
    },
}

/// Which address differences are acted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IpPolicy {
    /// Only populate objects that have no addresses at all.
    #[default]
    FillEmpty,
    /// Remove addresses missing locally and add addresses missing remotely.
    Converge,
}

/// An address to allocate, with the interface name to record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpAssignment {
    pub ip: IpAddr,
    pub interface: String,
}

/// A project tag to set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAssignment {
    pub project: String,
    pub tag: TagId,
    /// Full explicit tag list to send, since `update_object_tag` replaces it.
    pub tags: Vec<TagId>,
}

/// One remote write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Create { name: String },
    SetTags { object_id: ObjectId, tags: Vec<TagId> },
    Unlink { object_id: ObjectId, container: ObjectId },
    Link { object_id: ObjectId, container: ObjectId },
    RemoveIp { object_id: ObjectId, ip: IpAddr },
    AddIp { object_id: ObjectId, ip: IpAddr, interface: String },
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create { name } => write!(f, "create object {name}"),
            Self::SetTags { tags, .. } => {
                let ids: Vec<String> = tags.iter().map(ToString::to_string).collect();
                write!(f, "set tags [{}]", ids.join(", "))
            }
            Self::Unlink { container, .. } => write!(f, "unlink from container {container}"),
            Self::Link { container, .. } => write!(f, "link to container {container}"),
            Self::RemoveIp { ip, .. } => write!(f, "remove IP {ip}"),
            Self::AddIp { ip, interface, .. } => write!(f, "add IP {ip} on {interface}"),
        }
    }
}

/// Everything that has to change for one matched VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmPlan {
    pub name: String,
    pub object_id: ObjectId,
    pub tag: Option<TagAssignment>,
    pub container: ContainerDelta,
    pub ip_removals: Vec<IpAddr>,
    pub ip_additions: Vec<IpAssignment>,
}

impl VmPlan {
    /// Whether the VM is already converged.
    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
            && self.container == ContainerDelta::Keep
            && self.ip_removals.is_empty()
            && self.ip_additions.is_empty()
    }

    /// Writes in apply order: tag, container, addresses.
    pub fn mutations(&self) -> Vec<Mutation> {
        let object_id = self.object_id;
        let mut mutations = Vec::new();

        if let Some(tag) = &self.tag {
            mutations.push(Mutation::SetTags {
                object_id,
                tags: tag.tags.clone(),
            });
        }

        match self.container {
            ContainerDelta::Keep => {}
            ContainerDelta::Link { to } => mutations.push(Mutation::Link {
                object_id,
                container: to,
            }),
            ContainerDelta::Replace { from, to } => {
                mutations.push(Mutation::Unlink {
                    object_id,
                    container: from,
                });
                mutations.push(Mutation::Link {
                    object_id,
                    container: to,
                });
            }
        }

        mutations.extend(
            self.ip_removals
                .iter()
                .map(|&ip| Mutation::RemoveIp { object_id, ip }),
        );
        mutations.extend(self.ip_additions.iter().map(|a| Mutation::AddIp {
            object_id,
            ip: a.ip,
            interface: a.interface.clone(),
        }));

        mutations
    }
}

/// Tag delta: fires only when none of the remote explicit tags is a
/// project tag.
///
/// The explicit tags already set are kept. `required` tags (the depot
/// filter) are added unless the object already carries them, so that a
/// filtered `get_depot` lists the object afterwards.
pub fn tag_delta(
    vm: &LocalVm,
    remote: &RemoteSummary,
    projects: &ProjectTagIndex,
    required: &[TagId],
) -> Result<Option<TagAssignment>> {
    if remote
        .explicit_tags
        .iter()
        .any(|&tag| projects.is_project_tag(tag))
    {
        return Ok(None);
    }

    let tag = projects.get(&vm.project).ok_or_else(|| Error::Lookup {
        kind: LookupKind::ProjectTag,
        name: vm.project.clone(),
        vm: vm.name.clone(),
    })?;

    let mut tags = remote.explicit_tags.clone();
    tags.insert(tag);
    tags.extend(
        required
            .iter()
            .copied()
            .filter(|t| !remote.implicit_tags.contains(t)),
    );

    Ok(Some(TagAssignment {
        project: vm.project.clone(),
        tag,
        tags: tags.into_iter().collect(),
    }))
}

/// Container delta with ids resolved from `clusters`.
///
/// The old container id comes from the remote record when available.
pub fn container_delta(
    vm: &LocalVm,
    remote: &RemoteSummary,
    clusters: &ClusterIndex,
) -> Result<ContainerDelta> {
    let lookup = |name: &str| {
        clusters.get(name).ok_or_else(|| Error::Lookup {
            kind: LookupKind::Container,
            name: name.to_string(),
            vm: vm.name.clone(),
        })
    };

    match container_change(&remote.container, &vm.cluster) {
        ContainerChange::Keep => Ok(ContainerDelta::Keep),
        ContainerChange::Link => Ok(ContainerDelta::Link {
            to: lookup(&vm.cluster)?,
        }),
        ContainerChange::Replace => {
            let from = match remote.container_id {
                Some(id) => id,
                None => lookup(&remote.container)?,
            };
            Ok(ContainerDelta::Replace {
                from,
                to: lookup(&vm.cluster)?,
            })
        }
    }
}

/// Address delta. Interface names are `<prefix><position>` by local order,
/// whatever the local interface was called.
pub fn ip_delta(
    remote: &[IpAddr],
    local: &[Interface],
    policy: IpPolicy,
    prefix: &str,
) -> (Vec<IpAddr>, Vec<IpAssignment>) {
    let assign = |(index, iface): (usize, &Interface)| IpAssignment {
        ip: iface.ip,
        interface: format!("{prefix}{index}"),
    };

    match policy {
        IpPolicy::FillEmpty if remote.is_empty() => {
            (Vec::new(), local.iter().enumerate().map(assign).collect())
        }
        IpPolicy::FillEmpty => (Vec::new(), Vec::new()),
        IpPolicy::Converge => {
            let local_ips: BTreeSet<IpAddr> = local.iter().map(|i| i.ip).collect();
            let remote_ips: BTreeSet<IpAddr> = remote.iter().copied().collect();

            let removals = remote
                .iter()
                .copied()
                .filter(|ip| !local_ips.contains(ip))
                .collect();
            let additions = local
                .iter()
                .enumerate()
                .filter(|(_, iface)| !remote_ips.contains(&iface.ip))
                .map(assign)
                .collect();
            (removals, additions)
        }
    }
}

/// Builds [`VmPlan`]s for matched VMs.
#[derive(Debug, Clone)]
pub struct Planner {
    pub ip_policy: IpPolicy,
    pub interface_prefix: String,
    /// Tags every tagged object must end up with
    pub required_tags: Vec<TagId>,
}

impl Default for Planner {
    fn default() -> Self {
        Self {
            ip_policy: IpPolicy::FillEmpty,
            interface_prefix: DEFAULT_INTERFACE_PREFIX.to_string(),
            required_tags: Vec::new(),
        }
    }
}

impl Planner {
    /// Plan one VM against its remote summary.
    pub fn plan_vm(
        &self,
        vm: &LocalVm,
        remote: &RemoteSummary,
        projects: &ProjectTagIndex,
        clusters: &ClusterIndex,
    ) -> Result<VmPlan> {
        let tag = tag_delta(vm, remote, projects, &self.required_tags)?;
        let container = container_delta(vm, remote, clusters)?;
        let (ip_removals, ip_additions) = ip_delta(
            &remote.ips,
            &vm.interfaces,
            self.ip_policy,
            &self.interface_prefix,
        );

        Ok(VmPlan {
            name: vm.name.clone(),
            object_id: remote.id,
            tag,
            container,
            ip_removals,
            ip_additions,
        })
    }

    /// Plan every matched VM, in name order.
    ///
    /// Stops at the first lookup miss.
    pub fn plan(
        &self,
        reconciliation: &Reconciliation,
        inventory: &Inventory,
        projects: &ProjectTagIndex,
        clusters: &ClusterIndex,
    ) -> Result<Vec<VmPlan>> {
        reconciliation
            .matched
            .iter()
            .filter_map(|name| Some((inventory.get(name)?, reconciliation.remote.get(name)?)))
            .map(|(vm, remote)| self.plan_vm(vm, remote, projects, clusters))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::PowerState;

    fn vm(name: &str, cluster: &str, ips: &[&str]) -> LocalVm {
        LocalVm {
            name: name.to_string(),
            power_state: PowerState::PoweredOn,
            cluster: cluster.to_string(),
            project: "proj1".to_string(),
            host: None,
            interfaces: ips
                .iter()
                .enumerate()
                .map(|(i, ip)| Interface {
                    name: format!("eth{}", i + 3),
                    ip: ip.parse().unwrap(),
                })
                .collect(),
        }
    }

    fn remote(container: &str) -> RemoteSummary {
        RemoteSummary {
            id: ObjectId(7),
            container: container.to_string(),
            container_id: None,
            explicit_tags: BTreeSet::new(),
            implicit_tags: BTreeSet::new(),
            ips: Vec::new(),
        }
    }

    fn projects() -> ProjectTagIndex {
        [("proj1".to_string(), TagId(2))].into_iter().collect()
    }

    fn clusters() -> ClusterIndex {
        [
            ("B".to_string(), ObjectId(100)),
            ("C".to_string(), ObjectId(101)),
            ("OldC".to_string(), ObjectId(99)),
        ]
        .into_iter()
        .collect()
    }

    fn ips(items: &[&str]) -> Vec<IpAddr> {
        items.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_container_change_table() {
        assert_eq!(container_change("A", "A"), ContainerChange::Keep);
        assert_eq!(container_change("", "A"), ContainerChange::Link);
        assert_eq!(container_change("B", "A"), ContainerChange::Replace);
        assert_eq!(container_change("", ""), ContainerChange::Keep);
    }

    #[test]
    fn test_container_link_when_remote_empty() {
        let delta = container_delta(&vm("vm2", "B", &[]), &remote(""), &clusters()).unwrap();
        assert_eq!(delta, ContainerDelta::Link { to: ObjectId(100) });
    }

    #[test]
    fn test_container_replace_when_different() {
        let delta = container_delta(&vm("vm3", "C", &[]), &remote("OldC"), &clusters()).unwrap();
        assert_eq!(
            delta,
            ContainerDelta::Replace {
                from: ObjectId(99),
                to: ObjectId(101),
            }
        );
    }

    #[test]
    fn test_container_replace_prefers_remote_container_id() {
        let mut summary = remote("Gone");
        summary.container_id = Some(ObjectId(55));
        let delta = container_delta(&vm("vm3", "C", &[]), &summary, &clusters()).unwrap();
        assert_eq!(
            delta,
            ContainerDelta::Replace {
                from: ObjectId(55),
                to: ObjectId(101),
            }
        );
    }

    #[test]
    fn test_container_unknown_cluster_is_lookup_error() {
        let err = container_delta(&vm("vm4", "Nope", &[]), &remote(""), &clusters()).unwrap_err();
        assert!(matches!(
            err,
            Error::Lookup {
                kind: LookupKind::Container,
                ..
            }
        ));
    }

    #[test]
    fn test_tag_delta_fires_only_without_project_tag() {
        let local = vm("vm1", "B", &[]);
        let delta = tag_delta(&local, &remote("B"), &projects(), &[]).unwrap();
        assert_eq!(
            delta,
            Some(TagAssignment {
                project: "proj1".to_string(),
                tag: TagId(2),
                tags: vec![TagId(2)],
            })
        );

        let mut tagged = remote("B");
        tagged.explicit_tags.insert(TagId(2));
        assert_eq!(tag_delta(&local, &tagged, &projects(), &[]).unwrap(), None);
    }

    #[test]
    fn test_tag_delta_ignores_non_project_tags() {
        let local = vm("vm1", "B", &[]);
        let mut summary = remote("B");
        summary.explicit_tags.insert(TagId(15));
        summary.explicit_tags.insert(TagId(40));

        let delta = tag_delta(&local, &summary, &projects(), &[]).unwrap().unwrap();
        assert_eq!(delta.tag, TagId(2));
        assert_eq!(delta.tags, vec![TagId(2), TagId(15), TagId(40)]);
    }

    #[test]
    fn test_tag_delta_adds_required_tags() {
        let local = vm("vm1", "B", &[]);
        let delta = tag_delta(&local, &remote("B"), &projects(), &[TagId(15)])
            .unwrap()
            .unwrap();
        assert_eq!(delta.tags, vec![TagId(2), TagId(15)]);

        let mut inherited = remote("B");
        inherited.implicit_tags.insert(TagId(15));
        let delta = tag_delta(&local, &inherited, &projects(), &[TagId(15)])
            .unwrap()
            .unwrap();
        assert_eq!(delta.tags, vec![TagId(2)]);
    }

    #[test]
    fn test_tag_delta_missing_project() {
        let mut local = vm("vm1", "B", &[]);
        local.project = "unknown".to_string();
        let err = tag_delta(&local, &remote("B"), &projects(), &[]).unwrap_err();
        assert!(matches!(
            err,
            Error::Lookup {
                kind: LookupKind::ProjectTag,
                ..
            }
        ));
    }

    #[test]
    fn test_ip_fill_empty_names_sequentially() {
        let local = vm("vm1", "B", &["10.0.0.1", "10.0.0.2", "10.0.0.3"]);
        let (removals, additions) =
            ip_delta(&[], &local.interfaces, IpPolicy::FillEmpty, "veth");
        assert!(removals.is_empty());
        let got: Vec<(String, String)> = additions
            .iter()
            .map(|a| (a.ip.to_string(), a.interface.clone()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("10.0.0.1".to_string(), "veth0".to_string()),
                ("10.0.0.2".to_string(), "veth1".to_string()),
                ("10.0.0.3".to_string(), "veth2".to_string()),
            ]
        );
    }

    #[test]
    fn test_ip_fill_empty_ignores_populated_remote() {
        let local = vm("vm1", "B", &["10.0.0.1", "10.0.0.2"]);
        let (removals, additions) = ip_delta(
            &ips(&["192.168.0.9"]),
            &local.interfaces,
            IpPolicy::FillEmpty,
            "veth",
        );
        assert!(removals.is_empty());
        assert!(additions.is_empty());
    }

    #[test]
    fn test_ip_converge() {
        let local = vm("vm1", "B", &["10.0.0.1", "10.0.0.2"]);
        let (removals, additions) = ip_delta(
            &ips(&["10.0.0.1", "192.168.0.9"]),
            &local.interfaces,
            IpPolicy::Converge,
            "veth",
        );
        assert_eq!(removals, ips(&["192.168.0.9"]));
        assert_eq!(
            additions,
            vec![IpAssignment {
                ip: "10.0.0.2".parse().unwrap(),
                interface: "veth1".to_string(),
            }]
        );
    }

    #[test]
    fn test_plan_mutation_order() {
        let local = vm("vm3", "C", &["10.0.0.1"]);
        let plan = Planner::default()
            .plan_vm(&local, &remote("OldC"), &projects(), &clusters())
            .unwrap();

        let object_id = ObjectId(7);
        assert_eq!(
            plan.mutations(),
            vec![
                Mutation::SetTags {
                    object_id,
                    tags: vec![TagId(2)],
                },
                Mutation::Unlink {
                    object_id,
                    container: ObjectId(99),
                },
                Mutation::Link {
                    object_id,
                    container: ObjectId(101),
                },
                Mutation::AddIp {
                    object_id,
                    ip: "10.0.0.1".parse().unwrap(),
                    interface: "veth0".to_string(),
                },
            ]
        );
        assert!(!plan.is_empty());
    }

    #[test]
    fn test_plan_converged_vm_is_empty() {
        let local = vm("vm1", "B", &["10.0.0.1"]);
        let mut summary = remote("B");
        summary.explicit_tags.insert(TagId(2));
        summary.ips = ips(&["10.0.0.1"]);

        let plan = Planner::default()
            .plan_vm(&local, &summary, &projects(), &clusters())
            .unwrap();
        assert!(plan.is_empty());
        assert!(plan.mutations().is_empty());
    }

    #[test]
    fn test_plan_all_matched() {
        let inventory: Inventory = [vm("vm2", "B", &[]), vm("vm3", "C", &[]), vm("new", "B", &[])]
            .into_iter()
            .collect();
        let remote_map = [
            ("vm2".to_string(), remote("")),
            ("vm3".to_string(), remote("OldC")),
        ]
        .into_iter()
        .collect();
        let reconciliation = Reconciliation::from_summaries(&inventory, remote_map);

        let plans = Planner::default()
            .plan(&reconciliation, &inventory, &projects(), &clusters())
            .unwrap();
        let names: Vec<&str> = plans.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["vm2", "vm3"]);
        assert_eq!(plans[0].container, ContainerDelta::Link { to: ObjectId(100) });
    }

    #[test]
    fn test_mutation_display() {
        let m = Mutation::AddIp {
            object_id: ObjectId(7),
            ip: "10.0.0.1".parse().unwrap(),
            interface: "veth0".to_string(),
        };
        assert_eq!(m.to_string(), "add IP 10.0.0.1 on veth0");
    }
}
