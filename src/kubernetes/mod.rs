// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Kubernetes-backed providers for the permission cache

mod authz;
mod client;
mod topology;

pub use authz::KubeAuthorizationProvider;
pub use client::{HubClient, KubeImpersonator};
pub use topology::KubeTopologyProvider;
