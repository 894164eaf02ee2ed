// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Hub API client and identity impersonation

use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::authz::KubeAuthorizationProvider;
use crate::error::{Error, Result};
use crate::rbac::{AuthorizationProvider, ImpersonationCredential, Impersonator};

/// Timeout for connecting to K8s API
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for reading K8s API responses
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum attempts for transient failures
const MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (doubles each retry)
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Connection to the hub cluster
///
/// Keeps the resolved client config so identity-bound clients can be derived
/// from it without re-reading the kubeconfig.
#[derive(Clone)]
pub struct HubClient {
    config: Config,
    client: Client,
}

impl HubClient {
    /// Connect using a kubeconfig context, or the inferred config (in-cluster
    /// service account or current context) when none is given
    pub async fn connect(context: Option<&str>) -> Result<Self> {
        let mut config = match context {
            Some(context) => {
                let kubeconfig = Kubeconfig::read()
                    .map_err(|e| Error::config(format!("Failed to read kubeconfig: {}", e)))?;
                Config::from_custom_kubeconfig(
                    kubeconfig,
                    &KubeConfigOptions {
                        context: Some(context.to_string()),
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| {
                    Error::config(format!(
                        "Failed to load kubeconfig for context '{}': {}",
                        context, e
                    ))
                })?
            }
            None => Config::infer()
                .await
                .map_err(|e| Error::config(format!("Failed to infer kube config: {}", e)))?,
        };

        // Set timeouts for reliability
        config.connect_timeout = Some(CONNECT_TIMEOUT);
        config.read_timeout = Some(READ_TIMEOUT);

        let client = Client::try_from(config.clone())?;
        info!(cluster = %config.cluster_url, "Connected to hub cluster");

        Ok(Self { config, client })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Creates authorization clients that act as the requesting identity
pub struct KubeImpersonator {
    config: Config,
}

impl KubeImpersonator {
    pub fn new(hub: &HubClient) -> Self {
        Self {
            config: hub.config().clone(),
        }
    }
}

impl Impersonator for KubeImpersonator {
    fn impersonate(
        &self,
        credential: &ImpersonationCredential,
    ) -> Result<Arc<dyn AuthorizationProvider>> {
        if credential.username.is_empty() {
            return Err(Error::impersonation("empty username"));
        }
        let config = impersonated_config(&self.config, credential);
        let client = Client::try_from(config).map_err(|e| {
            Error::impersonation(format!(
                "Failed to create client for {}: {}",
                credential.username, e
            ))
        })?;
        debug!(user = %credential.username, groups = ?credential.groups, "Created impersonation client");
        Ok(Arc::new(KubeAuthorizationProvider::new(client)))
    }
}

/// Copy of `base` that authenticates as the hub's own identity and
/// impersonates the credential's user and groups
fn impersonated_config(base: &Config, credential: &ImpersonationCredential) -> Config {
    let mut config = base.clone();
    config.auth_info.impersonate = Some(credential.username.clone());
    config.auth_info.impersonate_groups =
        (!credential.groups.is_empty()).then(|| credential.groups.clone());
    config.connect_timeout = Some(CONNECT_TIMEOUT);
    config.read_timeout = Some(READ_TIMEOUT);
    config
}

/// Run an API call, retrying transient failures with exponential backoff
pub(crate) async fn with_retry<T, F, Fut>(what: &str, mut call: F) -> std::result::Result<T, kube::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, kube::Error>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable_error(&e) && attempt + 1 < MAX_RETRIES => {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                warn!(
                    call = %what,
                    attempt = attempt + 1,
                    max_attempts = MAX_RETRIES,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "Retryable error, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                debug!(call = %what, error = %e, "Giving up on API call");
                return Err(e);
            }
        }
    }
}

/// Check if an error is retryable (transient failures)
fn is_retryable_error(err: &kube::Error) -> bool {
    match err {
        // Network/connection errors are retryable
        kube::Error::HyperError(_) => true,
        // API errors: retry on 429 (rate limit), 503 (unavailable), 504 (timeout)
        kube::Error::Api(api_err) => matches!(api_err.code, 429 | 503 | 504),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: format!("status {}", code),
            reason: "Test".to_string(),
            code,
        })
    }

    fn credential(groups: &[&str]) -> ImpersonationCredential {
        ImpersonationCredential {
            username: "alice".to_string(),
            uid: "uid-alice".to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_retryable_codes() {
        for code in [429, 503, 504] {
            assert!(is_retryable_error(&api_error(code)), "{}", code);
        }
        for code in [400, 401, 403, 404, 500] {
            assert!(!is_retryable_error(&api_error(code)), "{}", code);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = with_retry("test", move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 { Err(api_error(503)) } else { Ok(n) }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: std::result::Result<(), _> = with_retry("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(api_error(429))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_RETRIES);
    }

    #[tokio::test]
    async fn test_no_retry_on_forbidden() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: std::result::Result<(), _> = with_retry("test", move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(api_error(403))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_impersonated_config() {
        let base = Config::new("https://hub.example.com:6443".parse().unwrap());

        let config = impersonated_config(&base, &credential(&["devs", "system:authenticated"]));
        assert_eq!(config.auth_info.impersonate.as_deref(), Some("alice"));
        assert_eq!(
            config.auth_info.impersonate_groups,
            Some(vec!["devs".to_string(), "system:authenticated".to_string()])
        );
        assert_eq!(config.read_timeout, Some(READ_TIMEOUT));
        assert_eq!(config.cluster_url, base.cluster_url);
        assert!(base.auth_info.impersonate.is_none());

        let config = impersonated_config(&base, &credential(&[]));
        assert!(config.auth_info.impersonate_groups.is_none());
    }
}
