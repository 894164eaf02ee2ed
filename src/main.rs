// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::prelude::*;

use cli::{Args, Command, OutputFormat};
use search_rbac::config::{self, Config};
use search_rbac::filter::{self, render};
use search_rbac::kubernetes::{HubClient, KubeImpersonator, KubeTopologyProvider};
use search_rbac::rbac::{PermissionCache, SharedTopologyCache};

const LOG_FILE: &str = "search-rbac.log";
const LOG_MAX_BYTES: u64 = 10 * 1024 * 1024;
const LOG_MAX_FILES: usize = 5;

/// Rolling file log under ~/.search-rbac/log, mirrored to stderr with -v
///
/// `RUST_LOG` overrides the default level.
fn init_logging(verbose: bool) -> Result<()> {
    use tracing_rolling_file::{RollingConditionBase, RollingFileAppenderBase};
    use tracing_subscriber::{EnvFilter, fmt};

    let log_dir = config::base_dir()?.join("log");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let condition = RollingConditionBase::new().daily().max_size(LOG_MAX_BYTES);
    let appender = RollingFileAppenderBase::new(log_dir.join(LOG_FILE), condition, LOG_MAX_FILES)
        .context("Failed to open log file")?;
    let (writer, guard) = appender.get_non_blocking_appender();
    // The writer thread must outlive main
    std::mem::forget(guard);

    let level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("search_rbac={}", level)));

    // stdout carries command output, so console logs go to stderr
    let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(stderr_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (aws-lc-rs)
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose) {
        eprintln!("Warning: logging disabled: {:#}", e);
    }

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(ctx) = &args.context {
        config.context = Some(ctx.clone());
    }

    match &args.command {
        Command::SaveConfig => {
            match &args.config {
                Some(path) => config.save_to(path)?,
                None => config.save()?,
            }
            info!(context = ?config.context, "Saved configuration");
        }
        Command::Filter {
            identity,
            all_managed_clusters,
            output,
        } => {
            let cache = build_cache(&config).await?;
            let filter = filter::obtain_filter(
                &cache,
                &identity.identity(),
                &identity.credential(),
                *all_managed_clusters,
            )
            .await
            .with_context(|| format!("Failed to build filter for user '{}'", identity.user))?;

            match output {
                OutputFormat::Sql => print_sql(&filter),
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&filter)?);
                }
            }
        }
        Command::Permissions { identity } => {
            let cache = build_cache(&config).await?;
            let snapshot = cache
                .obtain(&identity.identity(), &identity.credential())
                .await
                .with_context(|| {
                    format!("Failed to load permissions for user '{}'", identity.user)
                })?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
    }

    Ok(())
}

/// Wire the permission cache to the hub cluster
async fn build_cache(config: &Config) -> Result<PermissionCache> {
    let hub = HubClient::connect(config.context.as_deref())
        .await
        .context("Failed to connect to hub cluster")?;

    let topology = Arc::new(KubeTopologyProvider::new(hub.client()));
    let shared = Arc::new(SharedTopologyCache::new(topology, config.shared_cache_ttl()));
    let impersonator = Arc::new(KubeImpersonator::new(&hub));

    info!(
        user_ttl_ms = config.user_cache_ttl_ms,
        shared_ttl_ms = config.shared_cache_ttl_ms,
        "Permission cache ready"
    );
    Ok(
        PermissionCache::new(shared, impersonator, config.user_cache_ttl())
            .with_managed_label_marker(config.managed_cluster_label_marker.clone())
            .with_rules_concurrency(config.rules_review_concurrency),
    )
}

fn print_sql(filter: &filter::RbacFilter) {
    for statement in render::lookup_table_sql(&filter.lookup_table) {
        println!("{};", statement);
    }
    println!();
    println!("-- hub scope");
    println!("{}", render::to_sql(&filter.hub_scope));
    println!("-- managed cluster scope");
    println!("{}", render::to_sql(&filter.managed_cluster_scope));
    println!("-- combined");
    println!("{}", render::to_sql(&filter.combined()));
}
