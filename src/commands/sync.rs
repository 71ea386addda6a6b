//! The check, diff and apply commands.
//!
//! Each command loads the configuration file and walks the declared
//! instances in order. A failure against one instance aborts the run;
//! instances already converged stay converged.

use crate::Context;
use crate::api::ArrClient;
use crate::commands::ConsoleSink;
use crate::config::{Config, InstanceConfig};
use crate::secrets::Secrets;
use crate::state::AppliedState;
use anyhow::{Context as _, Result};
use colored::Colorize;
use std::path::Path;

/// Validate the configuration and probe every instance connection.
pub fn check(ctx: &Context, config_path: &Path) -> Result<()> {
    let config = Config::load(config_path)?;
    for (name, instance) in config.target_instances() {
        let secrets = Secrets::get(instance, &name)
            .with_context(|| format!("instance '{name}'"))?;
        if !ctx.quiet {
            println!(
                "{} {} ({}, version {})",
                "ok".green().bold(),
                name.bold(),
                secrets.host_url(),
                secrets.version
            );
        }
    }
    Ok(())
}

/// Show the changes an apply would make, without touching anything.
pub fn diff(ctx: &Context, config_path: &Path) -> Result<()> {
    run(ctx, config_path, true)
}

/// Converge every instance to the declared configuration.
pub fn apply(ctx: &Context, config_path: &Path) -> Result<()> {
    run(ctx, config_path, false)
}

fn run(ctx: &Context, config_path: &Path, dry_run: bool) -> Result<()> {
    let config = Config::load(config_path)?;
    let mut state = AppliedState::load()?;

    for (name, instance) in config.target_instances() {
        if !ctx.quiet {
            println!("{}", name.bold());
        }
        let changed = sync_instance(ctx, &name, instance, &state, dry_run)
            .with_context(|| format!("instance '{name}'"))?;
        if !ctx.quiet {
            if changed {
                let verb = if dry_run { "would change" } else { "changed" };
                println!("  {} {verb}", "=>".bold());
            } else {
                println!("  {} up to date", "=>".bold());
            }
        }
        if !dry_run {
            state.record_instance(&name, instance.settings.managed_keys());
        }
    }

    if !dry_run {
        state.save()?;
    }
    Ok(())
}

fn sync_instance(
    ctx: &Context,
    name: &str,
    instance: &InstanceConfig,
    previous: &AppliedState,
    dry_run: bool,
) -> Result<bool> {
    let secrets = Secrets::get(instance, name)?;
    log::info!(
        "connected to {} (version {})",
        secrets.host_url(),
        secrets.version
    );

    let api = if dry_run {
        ArrClient::from_secrets(&secrets).into_dry_run()
    } else {
        ArrClient::from_secrets(&secrets)
    };
    let remote = InstanceConfig::from_remote(&secrets, &api)?;

    // resources managed by the previous run but no longer declared
    for (section, keys) in &previous
        .instances
        .get(name)
        .map(|i| i.managed.clone())
        .unwrap_or_default()
    {
        let current = instance.settings.managed_keys();
        let current_keys = current.get(section);
        for key in keys {
            if current_keys.is_none_or(|keys| !keys.contains(key)) {
                log::info!(
                    "{section}[{key}]: previously managed, now unmanaged \
                     (deleted only where delete_unmanaged is set)"
                );
            }
        }
    }

    let mut sink = ConsoleSink::new(ctx.quiet, ctx.verbose);
    let tree = format!("{name}.settings");
    let updated = instance
        .settings
        .update_remote(&tree, &api, &remote.settings, &mut sink)?;
    let deleted = instance
        .settings
        .delete_remote(&tree, &api, &remote.settings, &mut sink)?;
    Ok(updated || deleted)
}
