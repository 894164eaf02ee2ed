// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Error types for permission lookup and filter synthesis

use thiserror::Error;

/// Main error type for RBAC filter operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Authorization provider failed (access or rules review)
    #[error("authorization provider error: {0}")]
    Authorization(String),

    /// Topology provider failed (namespace listing or resource discovery)
    #[error("topology provider error: {0}")]
    Topology(String),

    /// Could not build the identity-scoped authorization client
    #[error("impersonation error: {0}")]
    Impersonation(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an authorization provider error with the given message
    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    /// Create a topology provider error with the given message
    pub fn topology(msg: impl Into<String>) -> Self {
        Self::Topology(msg.into())
    }

    /// Create an impersonation error with the given message
    pub fn impersonation(msg: impl Into<String>) -> Self {
        Self::Impersonation(msg.into())
    }

    /// Create a configuration error with the given message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
