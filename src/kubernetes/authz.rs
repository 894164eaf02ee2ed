// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Authorization reviews through an impersonating client

use async_trait::async_trait;
use k8s_openapi::api::authorization::v1 as authz;
use kube::api::PostParams;
use kube::{Api, Client};
use tracing::{debug, warn};

use super::client::with_retry;
use crate::error::{Error, Result};
use crate::rbac::provider::LIST_VERB;
use crate::rbac::{AuthorizationProvider, ResourceRule};

/// Answers "may I list" questions for the identity the client impersonates
pub struct KubeAuthorizationProvider {
    client: Client,
}

impl KubeAuthorizationProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthorizationProvider for KubeAuthorizationProvider {
    async fn can_list(&self, apigroup: &str, kind: &str) -> Result<bool> {
        let api: Api<authz::SelfSubjectAccessReview> = Api::all(self.client.clone());
        let review = access_review(apigroup, kind);
        let params = PostParams::default();

        let (api, params, review) = (&api, &params, &review);
        let result = with_retry("SelfSubjectAccessReview", move || api.create(params, review))
            .await
            .map_err(|e| {
                Error::authorization(format!("access review for {}/{}: {}", apigroup, kind, e))
            })?;

        let allowed = result.status.is_some_and(|status| status.allowed);
        debug!(apigroup = %apigroup, kind = %kind, allowed = allowed, "SelfSubjectAccessReview");
        Ok(allowed)
    }

    async fn list_rules(&self, namespace: &str) -> Result<Vec<ResourceRule>> {
        let api: Api<authz::SelfSubjectRulesReview> = Api::all(self.client.clone());
        let review = rules_review(namespace);
        let params = PostParams::default();

        let (api, params, review) = (&api, &params, &review);
        let result = with_retry("SelfSubjectRulesReview", move || api.create(params, review))
            .await
            .map_err(|e| {
                Error::authorization(format!("rules review for namespace {}: {}", namespace, e))
            })?;

        let Some(status) = result.status else {
            return Ok(Vec::new());
        };
        if status.incomplete {
            // The rules returned are still a subset of what is granted
            warn!(
                namespace = %namespace,
                evaluation_error = ?status.evaluation_error,
                "Incomplete rules review"
            );
        }

        Ok(status.resource_rules.into_iter().map(to_rule).collect())
    }
}

fn access_review(apigroup: &str, kind: &str) -> authz::SelfSubjectAccessReview {
    authz::SelfSubjectAccessReview {
        spec: authz::SelfSubjectAccessReviewSpec {
            resource_attributes: Some(authz::ResourceAttributes {
                verb: Some(LIST_VERB.to_string()),
                group: Some(apigroup.to_string()),
                resource: Some(kind.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn rules_review(namespace: &str) -> authz::SelfSubjectRulesReview {
    authz::SelfSubjectRulesReview {
        spec: authz::SelfSubjectRulesReviewSpec {
            namespace: Some(namespace.to_string()),
        },
        ..Default::default()
    }
}

fn to_rule(rule: authz::ResourceRule) -> ResourceRule {
    ResourceRule {
        verbs: rule.verbs,
        api_groups: rule.api_groups.unwrap_or_default(),
        resources: rule.resources.unwrap_or_default(),
        resource_names: rule.resource_names.unwrap_or_default(),
    }
}
