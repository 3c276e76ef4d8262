//! Core types for RackTables objects, tags and indexes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

/// Identifier of a RackTables object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a RackTables tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub u64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Credentials for HTTP Basic authentication against api.php.
#[derive(Clone)]
pub struct Credentials {
    /// User name.
    pub username: String,
    /// Password.
    pub password: String,
}

impl Credentials {
    /// Create a credential pair.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// An IP address allocated to an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAllocation {
    /// The allocated address.
    pub ip: IpAddr,
    /// OS interface (bond) name, when recorded.
    pub interface: Option<String>,
}

/// A tracked object as reported by `get_depot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObject {
    /// Remote-assigned identifier.
    pub id: ObjectId,
    /// Object name; empty for unnamed objects.
    pub name: String,
    /// Name of the parent container, empty when unlinked.
    pub container_name: String,
    /// Id of the parent container, when the API reports it.
    pub container_id: Option<ObjectId>,
    /// Implicit (inherited) tags.
    pub implicit_tags: BTreeMap<TagId, String>,
    /// Explicit tags. Project tags are among them, next to any other tag
    /// set by hand.
    pub explicit_tags: BTreeMap<TagId, String>,
    /// Allocated addresses, sorted by address.
    pub ips: Vec<IpAllocation>,
}

/// A node of the tag taxonomy as reported by `get_tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag id.
    pub id: TagId,
    /// Tag name.
    pub name: String,
    /// Parent tag, absent for roots.
    pub parent_id: Option<TagId>,
    /// Ancestor ids from the root down to the parent.
    pub trace: Vec<TagId>,
}

impl Tag {
    /// Whether `ancestor` appears anywhere above this tag.
    #[must_use]
    pub fn descends_from(&self, ancestor: TagId) -> bool {
        self.parent_id == Some(ancestor) || self.trace.contains(&ancestor)
    }
}

/// Result of an `add_object` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The object was created; the id is known when the API echoed it.
    Created {
        /// New object id.
        id: Option<ObjectId>,
    },
    /// The server reported that the object already exists.
    AlreadyExists,
}

/// How `add_object` treats a name that already exists remotely.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExistingObjectPolicy {
    /// Treat an "already exists" rejection as success.
    #[default]
    Accept,
    /// Surface the rejection as an error.
    Reject,
}

/// Project name to tag id, built from the tag taxonomy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectTagIndex(BTreeMap<String, TagId>);

impl ProjectTagIndex {
    /// Keep the tags below the root tag named `root_name`.
    ///
    /// An unknown root yields an empty index.
    pub fn from_tags(tags: &[Tag], root_name: &str) -> Self {
        let Some(root) = tags.iter().find(|t| t.name == root_name) else {
            return Self::default();
        };

        Self(
            tags.iter()
                .filter(|t| t.id != root.id && t.descends_from(root.id))
                .map(|t| (t.name.clone(), t.id))
                .collect(),
        )
    }

    /// Look up the tag of a project.
    #[must_use]
    pub fn get(&self, project: &str) -> Option<TagId> {
        self.0.get(project).copied()
    }

    /// Number of project tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over (project, tag) pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, TagId)> {
        self.0.iter().map(|(name, id)| (name.as_str(), *id))
    }

    /// Whether `tag` is one of the project tags.
    #[must_use]
    pub fn is_project_tag(&self, tag: TagId) -> bool {
        self.iter().any(|(_, id)| id == tag)
    }
}

impl FromIterator<(String, TagId)> for ProjectTagIndex {
    fn from_iter<I: IntoIterator<Item = (String, TagId)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Container name to container object id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterIndex(BTreeMap<String, ObjectId>);

impl ClusterIndex {
    /// Index named objects by name.
    pub fn from_objects<'a>(objects: impl IntoIterator<Item = &'a RemoteObject>) -> Self {
        Self(
            objects
                .into_iter()
                .filter(|o| !o.name.is_empty())
                .map(|o| (o.name.clone(), o.id))
                .collect(),
        )
    }

    /// Merge `other` into this index; `other` wins on a name collision.
    pub fn merge(&mut self, other: ClusterIndex) {
        self.0.extend(other.0);
    }

    /// Look up a container id by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<ObjectId> {
        self.0.get(name).copied()
    }

    /// Number of containers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ObjectId)> for ClusterIndex {
    fn from_iter<I: IntoIterator<Item = (String, ObjectId)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
