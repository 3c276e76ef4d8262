use anyhow::{Context, Result, bail};
use racktables::{ClientConfig, ExistingObjectPolicy, TagId};
use reconcile::DEFAULT_INTERFACE_PREFIX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::ConnectionArgs;

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("rtsync"))
}

/// Default config file location
pub fn default_config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

// ============================================================================
// Config file
// ============================================================================

/// Contents of `config.toml`. Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub host: Option<String>,
    pub user: Option<String>,
    pub vm_type_id: Option<u64>,
    pub cluster_type_id: Option<u64>,
    pub project_container_type_id: Option<u64>,
    pub projects_tag: Option<String>,
    pub depot_filter_tags: Option<Vec<u64>>,
    pub interface_prefix: Option<String>,
    pub existing_objects: Option<ExistingObjectPolicy>,
}

impl FileConfig {
    /// Load the config file.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
                if !expanded.exists() {
                    bail!("Config file not found: {}", expanded.display());
                }
                expanded
            }
            None => {
                let path = default_config_path()?;
                if !path.exists() {
                    log::debug!("no config at {}, using defaults", path.display());
                    return Ok(Self::default());
                }
                path
            }
        };

        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Invalid config format in {}", path.display()))?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }
}

// ============================================================================
// Resolved settings
// ============================================================================

/// Connection and client settings after merging flags, file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_url: String,
    pub host: Option<String>,
    pub user: String,
    pub client: ClientConfig,
    pub interface_prefix: String,
}

impl Settings {
    /// Flags win over the file, the file wins over built-in defaults.
    pub fn resolve(file: FileConfig, args: &ConnectionArgs) -> Result<Self> {
        let host = args.host.clone().or(file.host);

        let api_url = match (args.api.clone().or(file.api_url), &host) {
            (Some(url), _) => url,
            (None, Some(host)) => api_url_for_host(host),
            (None, None) => bail!("No RackTables API given: pass --api or --host, or set api_url"),
        };

        let user = args
            .user
            .clone()
            .or(file.user)
            .context("No user given: pass --user or set user in the config file")?;

        let defaults = ClientConfig::default();
        let client = ClientConfig {
            vm_type_id: file.vm_type_id.unwrap_or(defaults.vm_type_id),
            cluster_type_id: file.cluster_type_id.unwrap_or(defaults.cluster_type_id),
            project_container_type_id: file
                .project_container_type_id
                .unwrap_or(defaults.project_container_type_id),
            projects_tag: file.projects_tag.unwrap_or(defaults.projects_tag),
            depot_filter_tags: file
                .depot_filter_tags
                .map(|tags| tags.into_iter().map(TagId).collect())
                .unwrap_or(defaults.depot_filter_tags),
            existing_objects: file.existing_objects.unwrap_or(defaults.existing_objects),
        };

        Ok(Self {
            api_url,
            host,
            user,
            client,
            interface_prefix: file
                .interface_prefix
                .unwrap_or_else(|| DEFAULT_INTERFACE_PREFIX.to_string()),
        })
    }

    /// Name shown in prompts and headers
    pub fn display_host(&self) -> &str {
        self.host.as_deref().unwrap_or(&self.api_url)
    }
}

fn api_url_for_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{host}/racktables/api.php")
    } else {
        format!("http://{host}/racktables/api.php")
    }
}
