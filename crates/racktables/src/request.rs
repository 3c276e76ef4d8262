//! Typed api.php requests.
//!
//! Every call is a GET against the same endpoint; the operation is selected
//! with `method=<name>` and the remaining query pairs. Each [`Request`]
//! variant renders its own pairs in a fixed order so no caller ever builds a
//! query string by hand.

use crate::types::{ObjectId, TagId};
use std::fmt;
use std::net::IpAddr;

/// Bond type sent with new IP allocations.
const BOND_TYPE: &str = "regular";

/// A single api.php call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// List objects of one type, with attributes, tags and addresses.
    GetDepot {
        /// Object type to list.
        type_id: u64,
        /// Only list objects carrying all of these tags.
        filter_tags: Vec<TagId>,
    },
    /// Fetch the full tag taxonomy.
    GetTags,
    /// Create an object.
    AddObject {
        /// Object type of the new object.
        type_id: u64,
        /// Object name.
        name: String,
    },
    /// Replace the explicit tags of an object.
    UpdateObjectTags {
        /// Target object.
        object_id: ObjectId,
        /// Tags to set.
        tags: Vec<TagId>,
    },
    /// Make `parent` the container of `child`.
    LinkEntities {
        /// Contained object.
        child: ObjectId,
        /// Container object.
        parent: ObjectId,
    },
    /// Remove the `parent` → `child` container link.
    UnlinkEntities {
        /// Contained object.
        child: ObjectId,
        /// Container object.
        parent: ObjectId,
    },
    /// Allocate an address to an object.
    AddIpAddress {
        /// Target object.
        object_id: ObjectId,
        /// Address to allocate.
        ip: IpAddr,
        /// OS interface name recorded with the allocation.
        bond_name: String,
    },
    /// Release an address from an object.
    DeleteIpAddress {
        /// Target object.
        object_id: ObjectId,
        /// Address to release.
        ip: IpAddr,
    },
}

impl Request {
    /// The api.php method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::GetDepot { .. } => "get_depot",
            Self::GetTags => "get_tags",
            Self::AddObject { .. } => "add_object",
            Self::UpdateObjectTags { .. } => "update_object_tag",
            Self::LinkEntities { .. } => "link_entities",
            Self::UnlinkEntities { .. } => "unlink_entities",
            Self::AddIpAddress { ip, .. } => match ip {
                IpAddr::V4(_) => "add_object_ipv4_address",
                IpAddr::V6(_) => "add_object_ipv6_address",
            },
            Self::DeleteIpAddress { ip, .. } => match ip {
                IpAddr::V4(_) => "delete_object_ipv4_address",
                IpAddr::V6(_) => "delete_object_ipv6_address",
            },
        }
    }

    /// Whether the call changes remote state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::GetDepot { .. } | Self::GetTags)
    }

    /// The object a mutation targets, if any.
    #[must_use]
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            Self::UpdateObjectTags { object_id, .. }
            | Self::AddIpAddress { object_id, .. }
            | Self::DeleteIpAddress { object_id, .. } => Some(*object_id),
            Self::LinkEntities { child, .. } | Self::UnlinkEntities { child, .. } => Some(*child),
            Self::GetDepot { .. } | Self::GetTags | Self::AddObject { .. } => None,
        }
    }

    /// Query pairs, `method` first.
    #[must_use]
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("method", self.method().to_string())];

        match self {
            Self::GetDepot {
                type_id,
                filter_tags,
            } => {
                pairs.push(("andor", "and".to_string()));
                pairs.extend(filter_tags.iter().map(|t| ("cft[]", t.to_string())));
                pairs.push(("cfe", format!("{{$typeid_{type_id}}}")));
                pairs.push(("include_attrs", "1".to_string()));
            }
            Self::GetTags => {}
            Self::AddObject { type_id, name } => {
                pairs.push(("object_type_id", type_id.to_string()));
                pairs.push(("object_name", name.clone()));
            }
            Self::UpdateObjectTags { object_id, tags } => {
                pairs.push(("object_id", object_id.to_string()));
                pairs.extend(tags.iter().map(|t| ("taglist[]", t.to_string())));
            }
            Self::LinkEntities { child, parent } | Self::UnlinkEntities { child, parent } => {
                pairs.push(("child_entity_type", "object".to_string()));
                pairs.push(("child_entity_id", child.to_string()));
                pairs.push(("parent_entity_type", "object".to_string()));
                pairs.push(("parent_entity_id", parent.to_string()));
            }
            Self::AddIpAddress {
                object_id,
                ip,
                bond_name,
            } => {
                pairs.push(("object_id", object_id.to_string()));
                pairs.push(("ip", ip.to_string()));
                pairs.push(("bond_name", bond_name.clone()));
                pairs.push(("bond_type", BOND_TYPE.to_string()));
            }
            Self::DeleteIpAddress { object_id, ip } => {
                pairs.push(("object_id", object_id.to_string()));
                pairs.push(("ip", ip.to_string()));
            }
        }

        pairs
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .query()
            .into_iter()
            .skip(1)
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        write!(f, "{}({})", self.method(), args.join(", "))
    }
}
