// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! RBAC-scoped search filters
//!
//! Caches what each identity may list on a hub cluster (cluster-scoped
//! resources, namespace-scoped resources per managed-cluster namespace) and
//! turns that into a boolean filter over indexed objects.

pub mod config;
pub mod error;
pub mod filter;
pub mod kubernetes;
pub mod rbac;

pub use error::{Error, Result};
pub use filter::{BoolExpr, RbacFilter, obtain_filter};
pub use rbac::{Identity, ImpersonationCredential, PermissionCache, PermissionSnapshot};
