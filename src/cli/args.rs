// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use search_rbac::rbac::{Identity, ImpersonationCredential};

#[derive(Parser, Debug)]
#[command(name = "search-rbac")]
#[command(author, version, about = "Build RBAC search filters for Kubernetes identities")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Kubernetes context of the hub cluster (overrides the config file)
    #[arg(short, long, value_name = "CONTEXT", global = true)]
    pub context: Option<String>,

    /// Config file (default: ~/.search-rbac/config.json)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the search filter for an identity
    Filter {
        #[command(flatten)]
        identity: IdentityArgs,

        /// The identity may see every managed cluster
        #[arg(long)]
        all_managed_clusters: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value = "sql")]
        output: OutputFormat,
    },

    /// Print the cached permissions of an identity as JSON
    Permissions {
        #[command(flatten)]
        identity: IdentityArgs,
    },

    /// Write the effective configuration (file plus overrides) back to the config file
    SaveConfig,
}

/// Who to build the filter for
#[derive(ClapArgs, Debug, Clone)]
pub struct IdentityArgs {
    /// User name to impersonate
    #[arg(short, long)]
    pub user: String,

    /// User UID (cache key and lookup table suffix)
    #[arg(long)]
    pub uid: String,

    /// Groups to impersonate (repeatable)
    #[arg(short, long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,
}

impl IdentityArgs {
    pub fn identity(&self) -> Identity {
        Identity::new(self.uid.clone(), self.user.clone())
    }

    pub fn credential(&self) -> ImpersonationCredential {
        ImpersonationCredential::for_identity(&self.identity()).with_groups(self.groups.clone())
    }
}

#[derive(ValueEnum, Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Sql,
    Json,
}
