//! Subcommand implementations and the setup they share

pub mod diff;
pub mod export;
pub mod sync;

use anyhow::{Context as AnyhowContext, Result, bail};
use racktables::{Client, Credentials};
use reconcile::{Inventory, IpPolicy, Planner};

use crate::cli::{ConnectionArgs, InputArgs};
use crate::config::{FileConfig, Settings};
use crate::ui;

/// Resolve settings, obtain a password and build the client
pub fn connect(args: &ConnectionArgs) -> Result<(Settings, Client)> {
    let file = FileConfig::load(args.config.as_deref())?;
    let settings = Settings::resolve(file, args)?;
    let password = password(&settings, args.password.clone())?;

    log::info!("using {} as {}", settings.api_url, settings.user);
    let client = Client::new(
        &settings.api_url,
        &Credentials::new(settings.user.clone(), password),
        settings.client.clone(),
    );
    Ok((settings, client))
}

fn password(settings: &Settings, given: Option<String>) -> Result<String> {
    if let Some(password) = given {
        return Ok(password);
    }
    if !console::user_attended() {
        bail!("No password given: pass --password or set RTSYNC_PASSWORD");
    }

    dialoguer::Password::new()
        .with_prompt(format!(
            "Enter password for host {} and user {}",
            settings.display_host(),
            settings.user
        ))
        .interact()
        .context("Could not read password")
}

/// Load the export named by the input flags
pub fn load_inventory(input: &InputArgs) -> Result<Inventory> {
    let mut inventory = Inventory::load(&input.jsonfile, input.layout.into())
        .with_context(|| format!("Could not load VM export {}", input.jsonfile.display()))?;

    if let Some(cluster) = &input.only_cluster {
        inventory.retain_cluster(cluster);
        if inventory.is_empty() {
            ui::warn(&format!("No VMs placed in cluster '{cluster}'"));
        }
    }
    Ok(inventory)
}

/// Planner configured from settings and input flags
pub fn planner(settings: &Settings, input: &InputArgs) -> Planner {
    Planner {
        ip_policy: if input.prune_ips {
            IpPolicy::Converge
        } else {
            IpPolicy::FillEmpty
        },
        interface_prefix: settings.interface_prefix.clone(),
        required_tags: settings.client.depot_filter_tags.clone(),
    }
}

/// Attach the advice for a RackTables failure
pub fn remote_error(err: racktables::Error) -> anyhow::Error {
    let advice = err.category().advice();
    anyhow::Error::new(err).context(format!("RackTables request failed. {advice}"))
}

/// Like [`remote_error`], for failures surfaced through the reconciler
pub fn remote_context(err: reconcile::Error) -> anyhow::Error {
    match err {
        reconcile::Error::Remote(remote) => remote_error(remote),
        other => anyhow::Error::new(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::LayoutArg;
    use std::fs;
    use tempfile::TempDir;

    fn input(path: std::path::PathBuf) -> InputArgs {
        InputArgs {
            jsonfile: path,
            layout: LayoutArg::Flat,
            only_cluster: None,
            prune_ips: false,
        }
    }

    #[test]
    fn test_load_inventory_only_cluster() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("vms.json");
        fs::write(
            &path,
            r#"{
                "vm1": {"power_state": "poweredOn", "cluster": "A", "folder": "p"},
                "vm2": {"power_state": "poweredOn", "cluster": "B", "folder": "p"}
            }"#,
        )
        .unwrap();

        let mut args = input(path);
        args.only_cluster = Some("B".to_string());
        let inventory = load_inventory(&args).unwrap();
        assert_eq!(inventory.len(), 1);
        assert!(inventory.get("vm2").is_some());
    }

    #[test]
    fn test_load_inventory_missing_file_names_path() {
        let tmp = TempDir::new().unwrap();
        let err = load_inventory(&input(tmp.path().join("absent.json"))).unwrap_err();
        assert!(err.to_string().contains("absent.json"));
    }

    #[test]
    fn test_remote_context_adds_advice() {
        let err = remote_context(reconcile::Error::Remote(racktables::Error::Http {
            message: "connection refused".to_string(),
        }));
        assert!(err.to_string().contains("reachable"));
        assert!(format!("{err:#}").contains("connection refused"));

        let err = remote_context(reconcile::Error::NotFound {
            path: "vms.json".into(),
        });
        assert!(!err.to_string().contains("RackTables"));
    }

    #[test]
    fn test_planner_prune_ips() {
        let settings = Settings::resolve(
            FileConfig::default(),
            &ConnectionArgs {
                api: Some("http://rt/api.php".to_string()),
                user: Some("admin".to_string()),
                ..ConnectionArgs::default()
            },
        )
        .unwrap();

        let mut args = input("vms.json".into());
        assert_eq!(planner(&settings, &args).ip_policy, IpPolicy::FillEmpty);
        args.prune_ips = true;
        assert_eq!(planner(&settings, &args).ip_policy, IpPolicy::Converge);
    }

    #[test]
    fn test_planner_requires_depot_filter_tags() {
        let file = FileConfig {
            api_url: Some("http://rt/api.php".to_string()),
            user: Some("admin".to_string()),
            depot_filter_tags: Some(vec![15]),
            ..FileConfig::default()
        };
        let settings = Settings::resolve(file, &ConnectionArgs::default()).unwrap();
        let planner = planner(&settings, &input("vms.json".into()));
        assert_eq!(planner.required_tags, vec![racktables::TagId(15)]);
    }
}
