//! Set difference between the local export and RackTables

use crate::inventory::Inventory;
use racktables::{ObjectId, RemoteObject, TagId};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;

/// What the reconciler needs to know about one remote VM object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSummary {
    pub id: ObjectId,
    /// Container name, empty when unlinked
    pub container: String,
    pub container_id: Option<ObjectId>,
    /// Explicit tags, project tags included
    pub explicit_tags: BTreeSet<TagId>,
    pub implicit_tags: BTreeSet<TagId>,
    pub ips: Vec<IpAddr>,
}

impl From<&RemoteObject> for RemoteSummary {
    fn from(object: &RemoteObject) -> Self {
        Self {
            id: object.id,
            container: object.container_name.clone(),
            container_id: object.container_id,
            explicit_tags: object.explicit_tags.keys().copied().collect(),
            implicit_tags: object.implicit_tags.keys().copied().collect(),
            ips: object.ips.iter().map(|a| a.ip).collect(),
        }
    }
}

/// Index remote objects by name.
///
/// Unnamed objects are skipped. If a name appears twice, the lowest id wins.
pub fn summarize(objects: &BTreeMap<ObjectId, RemoteObject>) -> BTreeMap<String, RemoteSummary> {
    let mut summaries = BTreeMap::new();
    for object in objects.values().filter(|o| !o.name.is_empty()) {
        if summaries.contains_key(&object.name) {
            log::warn!(
                "duplicate RackTables object name '{}' (id {}), ignoring",
                object.name,
                object.id
            );
            continue;
        }
        summaries.insert(object.name.clone(), RemoteSummary::from(object));
    }
    summaries
}

/// Result of comparing powered-on local VMs against remote objects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Powered-on VMs with no remote object
    pub to_create: BTreeSet<String>,
    /// Powered-on VMs with a remote object
    pub matched: BTreeSet<String>,
    /// Every named remote object
    pub remote: BTreeMap<String, RemoteSummary>,
}

impl Reconciliation {
    /// Compare `inventory` against a fresh `get_depot` snapshot
    pub fn compute(inventory: &Inventory, objects: &BTreeMap<ObjectId, RemoteObject>) -> Self {
        Self::from_summaries(inventory, summarize(objects))
    }

    /// Compare `inventory` against already summarized remote objects
    pub fn from_summaries(inventory: &Inventory, remote: BTreeMap<String, RemoteSummary>) -> Self {
        let (matched, to_create): (BTreeSet<String>, BTreeSet<String>) = inventory
            .iter()
            .filter(|vm| vm.power_state.is_on())
            .map(|vm| vm.name.clone())
            .partition(|name| remote.contains_key(name));

        Self {
            to_create,
            matched,
            remote,
        }
    }

    /// Number of powered-on local VMs considered
    pub fn considered(&self) -> usize {
        self.to_create.len() + self.matched.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{Interface, LocalVm, PowerState};
    use racktables::IpAllocation;

    fn local(name: &str, power: PowerState) -> LocalVm {
        LocalVm {
            name: name.to_string(),
            power_state: power,
            cluster: "A".to_string(),
            project: "proj1".to_string(),
            host: None,
            interfaces: vec![Interface {
                name: "eth0".to_string(),
                ip: "10.0.0.1".parse().unwrap(),
            }],
        }
    }

    fn remote(id: u64, name: &str) -> RemoteObject {
        RemoteObject {
            id: ObjectId(id),
            name: name.to_string(),
            container_name: String::new(),
            container_id: None,
            implicit_tags: BTreeMap::new(),
            explicit_tags: BTreeMap::new(),
            ips: Vec::new(),
        }
    }

    fn depot(objects: Vec<RemoteObject>) -> BTreeMap<ObjectId, RemoteObject> {
        objects.into_iter().map(|o| (o.id, o)).collect()
    }

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_empty_remote_creates_everything() {
        let inventory: Inventory = [local("vm1", PowerState::PoweredOn)].into_iter().collect();
        let result = Reconciliation::compute(&inventory, &BTreeMap::new());
        assert_eq!(result.to_create, names(&["vm1"]));
        assert!(result.matched.is_empty());
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let inventory: Inventory = [
            local("a", PowerState::PoweredOn),
            local("b", PowerState::PoweredOn),
            local("c", PowerState::PoweredOn),
            local("d", PowerState::PoweredOff),
            local("e", PowerState::Other("suspended".to_string())),
        ]
        .into_iter()
        .collect();
        let objects = depot(vec![remote(1, "b"), remote(2, "d"), remote(3, "zz")]);

        let result = Reconciliation::compute(&inventory, &objects);
        assert_eq!(result.to_create, names(&["a", "c"]));
        assert_eq!(result.matched, names(&["b"]));
        assert!(result.to_create.is_disjoint(&result.matched));

        let union: BTreeSet<String> = result.to_create.union(&result.matched).cloned().collect();
        assert_eq!(union, names(&["a", "b", "c"]));
        assert_eq!(result.considered(), 3);
    }

    #[test]
    fn test_powered_off_excluded_even_when_remote_exists() {
        let inventory: Inventory = [local("vm9", PowerState::PoweredOff)].into_iter().collect();
        let objects = depot(vec![remote(9, "vm9")]);
        let result = Reconciliation::compute(&inventory, &objects);
        assert!(result.to_create.is_empty());
        assert!(result.matched.is_empty());
        assert!(result.remote.contains_key("vm9"));
    }

    #[test]
    fn test_idempotent_against_same_snapshot() {
        let inventory: Inventory = [
            local("a", PowerState::PoweredOn),
            local("b", PowerState::PoweredOn),
        ]
        .into_iter()
        .collect();
        let objects = depot(vec![remote(1, "a")]);

        let first = Reconciliation::compute(&inventory, &objects);
        let second = Reconciliation::compute(&inventory, &objects);
        assert_eq!(first, second);
    }

    #[test]
    fn test_summarize_skips_unnamed_and_duplicates() {
        let mut first = remote(1, "vm1");
        first.container_name = "A".to_string();
        first.ips.push(IpAllocation {
            ip: "10.0.0.1".parse().unwrap(),
            interface: Some("veth0".to_string()),
        });
        first.explicit_tags.insert(TagId(2), "proj1".to_string());
        first.implicit_tags.insert(TagId(9), "virtual".to_string());
        let objects = depot(vec![first, remote(2, "vm1"), remote(3, "")]);

        let summaries = summarize(&objects);
        assert_eq!(summaries.len(), 1);
        let vm1 = &summaries["vm1"];
        assert_eq!(vm1.id, ObjectId(1));
        assert_eq!(vm1.container, "A");
        assert_eq!(vm1.explicit_tags, [TagId(2)].into_iter().collect());
        assert_eq!(vm1.implicit_tags, [TagId(9)].into_iter().collect());
        assert_eq!(vm1.ips, vec!["10.0.0.1".parse::<IpAddr>().unwrap()]);
    }
}
