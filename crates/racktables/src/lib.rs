//! # racktables
//!
//! Blocking client for the RackTables `api.php` JSON interface.
//!
//! This crate provides:
//! - Typed requests for the api.php methods used to track virtual machines
//! - Decoding of RackTables' PHP-flavoured JSON (string ids, `[]` for empty maps)
//! - Project tag and container indexes built from the remote taxonomy
//!
//! ## Example
//!
//! ```no_run
//! use racktables::{Client, ClientConfig, Credentials};
//!
//! let client = Client::new(
//!     "http://rt.example.com/racktables/api.php",
//!     &Credentials::new("admin", "secret"),
//!     ClientConfig::default(),
//! );
//!
//! let objects = client.fetch_objects().expect("fetch failed");
//! for object in objects.values() {
//!     println!("{} in {}", object.name, object.container_name);
//! }
//! ```
//!
//! ## Object types
//!
//! | Type                  | Default id |
//! |-----------------------|-----------:|
//! | Virtual machine       | 1504       |
//! | VM cluster            | 1505       |
//! | VM resource pool      | 1506       |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
mod decode;
pub mod error;
pub mod request;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use request::Request;
pub use types::{
    ClusterIndex, CreateOutcome, Credentials, ExistingObjectPolicy, IpAllocation, ObjectId,
    ProjectTagIndex, RemoteObject, Tag, TagId,
};

use backend::Backend;
use backend::http::HttpBackend;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// RackTables dictionary id of the "VM" object type.
pub const VM_TYPE_ID: u64 = 1504;
/// RackTables dictionary id of the "VM Cluster" object type.
pub const VM_CLUSTER_TYPE_ID: u64 = 1505;
/// RackTables dictionary id of the "VM Resource Pool" object type.
pub const VM_RESOURCE_POOL_TYPE_ID: u64 = 1506;

/// Settings that shape the calls the client makes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Object type of tracked VMs.
    pub vm_type_id: u64,
    /// Object type of cluster containers.
    pub cluster_type_id: u64,
    /// Object type of project containers.
    pub project_container_type_id: u64,
    /// Name of the root tag above every project tag.
    pub projects_tag: String,
    /// Restrict the VM depot to objects carrying these tags.
    pub depot_filter_tags: Vec<TagId>,
    /// How `add_object` treats names that already exist.
    pub existing_objects: ExistingObjectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            vm_type_id: VM_TYPE_ID,
            cluster_type_id: VM_CLUSTER_TYPE_ID,
            project_container_type_id: VM_RESOURCE_POOL_TYPE_ID,
            projects_tag: "projects".to_string(),
            depot_filter_tags: Vec::new(),
            existing_objects: ExistingObjectPolicy::Accept,
        }
    }
}

/// High-level client for RackTables inventory operations.
///
/// Reads fail on any non-200 answer. Mutations return `Ok(())` on 200 and
/// [`Error::Remote`] otherwise; nothing is retried.
pub struct Client {
    backend: Box<dyn Backend>,
    config: ClientConfig,
}

impl Client {
    /// Create a client talking HTTP to `api_url`.
    #[must_use]
    pub fn new(api_url: &str, credentials: &Credentials, config: ClientConfig) -> Self {
        Self {
            backend: Box::new(HttpBackend::new(api_url, credentials)),
            config,
        }
    }

    /// Create a client with a custom backend (useful for testing).
    #[must_use]
    pub fn with_backend(backend: Box<dyn Backend>, config: ClientConfig) -> Self {
        Self { backend, config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Fetch every tracked VM object, keyed by id.
    pub fn fetch_objects(&self) -> Result<BTreeMap<ObjectId, RemoteObject>> {
        self.fetch_depot(self.config.vm_type_id, self.config.depot_filter_tags.clone())
    }

    /// Fetch every VM object, ignoring `depot_filter_tags`.
    ///
    /// Objects created by [`Client::create_object`] carry no tags yet, so a
    /// filtered depot does not list them.
    pub fn fetch_all_objects(&self) -> Result<BTreeMap<ObjectId, RemoteObject>> {
        self.fetch_depot(self.config.vm_type_id, Vec::new())
    }

    /// Fetch the tag taxonomy.
    pub fn fetch_tags(&self) -> Result<Vec<Tag>> {
        let body = self.read(&Request::GetTags)?;
        decode::tags(&body)
    }

    /// Fetch the project tags: every tag below the configured root tag.
    pub fn fetch_project_tags(&self) -> Result<ProjectTagIndex> {
        let tags = self.fetch_tags()?;
        let index = ProjectTagIndex::from_tags(&tags, &self.config.projects_tag);
        if index.is_empty() {
            log::warn!(
                "no tags found below root tag '{}' ({} tags fetched)",
                self.config.projects_tag,
                tags.len()
            );
        }
        Ok(index)
    }

    /// Fetch cluster and project containers as one name index.
    ///
    /// Project containers are fetched second and win on a name collision.
    pub fn fetch_clusters(&self) -> Result<ClusterIndex> {
        let clusters = self.fetch_depot(self.config.cluster_type_id, Vec::new())?;
        let containers = self.fetch_depot(self.config.project_container_type_id, Vec::new())?;

        let mut index = ClusterIndex::from_objects(clusters.values());
        index.merge(ClusterIndex::from_objects(containers.values()));
        Ok(index)
    }

    fn fetch_depot(
        &self,
        type_id: u64,
        filter_tags: Vec<TagId>,
    ) -> Result<BTreeMap<ObjectId, RemoteObject>> {
        let body = self.read(&Request::GetDepot {
            type_id,
            filter_tags,
        })?;
        decode::objects(&body)
    }

    fn read(&self, request: &Request) -> Result<String> {
        let response = self.backend.send(request)?;
        if !response.is_success() {
            return Err(Error::remote(
                request.method(),
                response.status,
                &response.body,
            ));
        }
        Ok(response.body)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a VM object named `name`.
    ///
    /// With [`ExistingObjectPolicy::Accept`], an "already exists" rejection is
    /// reported as [`CreateOutcome::AlreadyExists`] instead of an error.
    pub fn create_object(&self, name: &str) -> Result<CreateOutcome> {
        let request = Request::AddObject {
            type_id: self.config.vm_type_id,
            name: name.to_string(),
        };

        match self.mutate(&request) {
            Ok(body) => Ok(CreateOutcome::Created {
                id: decode::created_id(&body),
            }),
            Err(err)
                if err.is_already_exists()
                    && self.config.existing_objects == ExistingObjectPolicy::Accept =>
            {
                log::info!("object '{name}' already exists, treating as created");
                Ok(CreateOutcome::AlreadyExists)
            }
            Err(err) => Err(err),
        }
    }

    /// Replace the explicit tags of an object.
    pub fn set_tags(&self, id: ObjectId, tags: &[TagId]) -> Result<()> {
        self.mutate(&Request::UpdateObjectTags {
            object_id: id,
            tags: tags.to_vec(),
        })
        .map(drop)
    }

    /// Link an object into a container.
    pub fn link_container(&self, id: ObjectId, container: ObjectId) -> Result<()> {
        self.mutate(&Request::LinkEntities {
            child: id,
            parent: container,
        })
        .map(drop)
    }

    /// Remove an object from a container.
    pub fn unlink_container(&self, id: ObjectId, container: ObjectId) -> Result<()> {
        self.mutate(&Request::UnlinkEntities {
            child: id,
            parent: container,
        })
        .map(drop)
    }

    /// Allocate `ip` to an object on interface `interface`.
    pub fn add_ip(&self, id: ObjectId, ip: IpAddr, interface: &str) -> Result<()> {
        self.mutate(&Request::AddIpAddress {
            object_id: id,
            ip,
            bond_name: interface.to_string(),
        })
        .map(drop)
    }

    /// Release `ip` from an object.
    pub fn remove_ip(&self, id: ObjectId, ip: IpAddr) -> Result<()> {
        self.mutate(&Request::DeleteIpAddress { object_id: id, ip })
            .map(drop)
    }

    fn mutate(&self, request: &Request) -> Result<String> {
        let response = self.backend.send(request)?;
        if response.is_success() {
            Ok(response.body)
        } else {
            Err(Error::remote(
                request.method(),
                response.status,
                &response.body,
            ))
        }
    }
}
