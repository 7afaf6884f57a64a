//! `reqwest` implementation of the OCM `clusters_mgmt/v1` API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::client::ClusterManagementClient;
use super::types::{
    Cluster, ClusterTarget, ClusterTopology, GateAgreement, NewUpgradePolicy, Page,
    UpgradePolicy, UpgradePolicyState, Version, VersionQuery,
};
use crate::error::OcmError;

const API_PREFIX: &str = "/api/clusters_mgmt/v1";

/// OCM API client authenticated with a bearer access token.
#[derive(Clone)]
pub struct OcmClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
}

#[derive(Serialize)]
struct GateAgreementRequest<'a> {
    version_gate: GateRef<'a>,
}

#[derive(Serialize)]
struct GateRef<'a> {
    id: &'a str,
}

#[derive(Deserialize, Default)]
struct GateAgreementResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    agreed_timestamp: Option<DateTime<Utc>>,
}

impl OcmClient {
    /// Create a client for the given API root (e.g. `https://api.openshift.com`).
    pub fn new(
        base_url: impl Into<String>,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, OcmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ouo/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OcmError::Transport("ocm::client".to_string(), e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(self.token.expose_secret())
    }

    fn policies_path(cluster: &ClusterTarget) -> String {
        format!(
            "/clusters/{}/{}",
            cluster.id,
            cluster.topology.policies_path()
        )
    }

    /// Send a request and return the body of a successful response.
    /// Empty bodies (204, or a 201 without content) come back as `None`.
    async fn execute(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<Option<String>, OcmError> {
        let response = request
            .send()
            .await
            .map_err(|e| OcmError::Transport(operation.to_string(), e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OcmError::Transport(operation.to_string(), e.to_string()))?;

        debug!("[{}] OCM responded {}", operation, status);

        if !status.is_success() {
            return Err(OcmError::from_response(operation, status.as_u16(), &body));
        }

        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(body))
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: RequestBuilder,
    ) -> Result<T, OcmError> {
        let body = self
            .execute(operation, request)
            .await?
            .ok_or_else(|| OcmError::Decode(operation.to_string(), "empty body".to_string()))?;
        decode(operation, &body)
    }
}

fn decode<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T, OcmError> {
    serde_json::from_str(body).map_err(|e| OcmError::Decode(operation.to_string(), e.to_string()))
}

#[async_trait]
impl ClusterManagementClient for OcmClient {
    async fn list_versions(&self, query: &VersionQuery) -> Result<Page<Version>, OcmError> {
        let page = query.page.to_string();
        let size = query.size.to_string();
        let request = self.request(Method::GET, "/versions").query(&[
            ("search", query.search.as_str()),
            ("order", query.order.as_str()),
            ("page", page.as_str()),
            ("size", size.as_str()),
        ]);
        self.fetch("versions::list", request).await
    }

    async fn get_version(&self, version_id: &str) -> Result<Version, OcmError> {
        let request = self.request(Method::GET, &format!("/versions/{version_id}"));
        self.fetch("versions::get", request).await
    }

    async fn get_cluster(&self, cluster_id: &str) -> Result<Cluster, OcmError> {
        let request = self.request(Method::GET, &format!("/clusters/{cluster_id}"));
        self.fetch("clusters::get", request).await
    }

    async fn list_upgrade_policies(
        &self,
        cluster: &ClusterTarget,
        page: u32,
        size: u32,
    ) -> Result<Page<UpgradePolicy>, OcmError> {
        let request = self
            .request(Method::GET, &Self::policies_path(cluster))
            .query(&[("page", page), ("size", size)]);
        self.fetch("upgrade_policies::list", request).await
    }

    async fn get_upgrade_policy_state(
        &self,
        cluster: &ClusterTarget,
        policy_id: &str,
    ) -> Result<UpgradePolicyState, OcmError> {
        let operation = "upgrade_policies::state";
        let policy_path = format!("{}/{}", Self::policies_path(cluster), policy_id);
        match cluster.topology {
            ClusterTopology::Classic => {
                let request = self.request(Method::GET, &format!("{policy_path}/state"));
                self.fetch(operation, request).await
            }
            ClusterTopology::Hcp => {
                let request = self.request(Method::GET, &policy_path);
                let policy: UpgradePolicy = self.fetch(operation, request).await?;
                policy.state.ok_or_else(|| {
                    OcmError::Decode(operation.to_string(), "policy has no state".to_string())
                })
            }
        }
    }

    async fn create_upgrade_policy(
        &self,
        cluster: &ClusterTarget,
        policy: &NewUpgradePolicy,
        dry_run: bool,
    ) -> Result<Option<UpgradePolicy>, OcmError> {
        let operation = if dry_run {
            "upgrade_policies::dry_run"
        } else {
            "upgrade_policies::create"
        };
        let mut request = self
            .request(Method::POST, &Self::policies_path(cluster))
            .json(policy);
        if dry_run {
            request = request.query(&[("dryRun", "true")]);
        }

        match self.execute(operation, request).await? {
            Some(body) => decode(operation, &body).map(Some),
            None => Ok(None),
        }
    }

    async fn delete_upgrade_policy(
        &self,
        cluster: &ClusterTarget,
        policy_id: &str,
    ) -> Result<(), OcmError> {
        let path = format!("{}/{}", Self::policies_path(cluster), policy_id);
        self.execute("upgrade_policies::delete", self.request(Method::DELETE, &path))
            .await?;
        Ok(())
    }

    async fn create_gate_agreement(
        &self,
        cluster: &ClusterTarget,
        gate_id: &str,
    ) -> Result<GateAgreement, OcmError> {
        let operation = "gate_agreements::create";
        let request = self
            .request(
                Method::POST,
                &format!("/clusters/{}/gate_agreements", cluster.id),
            )
            .json(&GateAgreementRequest {
                version_gate: GateRef { id: gate_id },
            });

        let response = match self.execute(operation, request).await? {
            Some(body) => decode::<GateAgreementResponse>(operation, &body)?,
            None => GateAgreementResponse::default(),
        };

        Ok(GateAgreement {
            id: response.id,
            gate_id: gate_id.to_string(),
            cluster_id: cluster.id.clone(),
            created_at: response.agreed_timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocm::types::PolicyStateValue;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> OcmClient {
        OcmClient::new(
            server.uri(),
            SecretString::from("test-token".to_string()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_list_versions_sends_query_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/versions"))
            .and(bearer_token("test-token"))
            .and(query_param("search", "enabled = 'true'"))
            .and(query_param("page", "2"))
            .and(query_param("size", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "VersionList",
                "page": 2,
                "size": 1,
                "total": 101,
                "items": [{"id": "openshift-v4.14.1", "raw_id": "4.14.1", "enabled": true, "rosa_enabled": true}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client
            .list_versions(&VersionQuery {
                search: "enabled = 'true'".to_string(),
                order: "id desc".to_string(),
                page: 2,
                size: 100,
            })
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].raw_id, "4.14.1");
    }

    #[tokio::test]
    async fn test_dry_run_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(
                "/api/clusters_mgmt/v1/clusters/c1/control_plane/upgrade_policies",
            ))
            .and(query_param("dryRun", "true"))
            .and(body_json(json!({
                "schedule_type": "manual",
                "upgrade_type": "ControlPlane",
                "version": "4.14.1"
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cluster = ClusterTarget::new("c1", ClusterTopology::Hcp);
        let result = client
            .create_upgrade_policy(
                &cluster,
                &NewUpgradePolicy::manual(ClusterTopology::Hcp, "4.14.1", None),
                true,
            )
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_dry_run_missing_gates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/clusters_mgmt/v1/clusters/c1/upgrade_policies"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "kind": "Error",
                "id": "400",
                "code": "CLUSTERS-MGMT-400",
                "reason": "There are missing version gate agreements",
                "details": [{
                    "kind": "VersionGate",
                    "id": "gate-iam",
                    "version_raw_id_prefix": "4.14",
                    "label": "api.openshift.com/gate-sts",
                    "description": "New IAM permissions required",
                    "documentation_url": "https://access.redhat.com/articles/1",
                    "sts_only": false
                }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cluster = ClusterTarget::new("c1", ClusterTopology::Classic);
        let err = client
            .create_upgrade_policy(
                &cluster,
                &NewUpgradePolicy::manual(ClusterTopology::Classic, "4.14.1", None),
                true,
            )
            .await
            .unwrap_err();

        match err {
            OcmError::GateAgreementsRequired { gates, .. } => {
                assert_eq!(gates.len(), 1);
                assert_eq!(gates[0].id, "gate-iam");
                assert_eq!(gates[0].description, "New IAM permissions required");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_classic_policy_state_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/api/clusters_mgmt/v1/clusters/c1/upgrade_policies/p1/state",
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"description": "Upgrade scheduled", "value": "scheduled"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cluster = ClusterTarget::new("c1", ClusterTopology::Classic);
        let state = client
            .get_upgrade_policy_state(&cluster, "p1")
            .await
            .unwrap();
        assert_eq!(state.value, PolicyStateValue::Scheduled);
    }

    #[tokio::test]
    async fn test_hcp_policy_state_is_read_inline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(
                "/api/clusters_mgmt/v1/clusters/c1/control_plane/upgrade_policies/p1",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "p1",
                "version": "4.14.1",
                "upgrade_type": "ControlPlane",
                "state": {"description": "", "value": "started"}
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cluster = ClusterTarget::new("c1", ClusterTopology::Hcp);
        let state = client
            .get_upgrade_policy_state(&cluster, "p1")
            .await
            .unwrap();
        assert_eq!(state.value, PolicyStateValue::Started);
    }

    #[tokio::test]
    async fn test_delete_missing_policy_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(
                "/api/clusters_mgmt/v1/clusters/c1/upgrade_policies/gone",
            ))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "kind": "Error",
                "id": "404",
                "reason": "Upgrade policy 'gone' not found"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cluster = ClusterTarget::new("c1", ClusterTopology::Classic);
        let err = client
            .delete_upgrade_policy(&cluster, "gone")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_gate_agreement() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/clusters_mgmt/v1/clusters/c1/gate_agreements"))
            .and(body_json(json!({"version_gate": {"id": "gate-iam"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "kind": "VersionGateAgreement",
                "id": "agr-1",
                "version_gate": {"id": "gate-iam"},
                "agreed_timestamp": "2026-10-19T09:00:00Z"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let cluster = ClusterTarget::new("c1", ClusterTopology::Hcp);
        let agreement = client
            .create_gate_agreement(&cluster, "gate-iam")
            .await
            .unwrap();
        assert_eq!(agreement.id, "agr-1");
        assert_eq!(agreement.gate_id, "gate-iam");
        assert_eq!(agreement.cluster_id, "c1");
        assert!(agreement.created_at.is_some());
    }

    #[tokio::test]
    async fn test_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clusters_mgmt/v1/clusters/c1"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.get_cluster("c1").await.unwrap_err();
        assert!(err.is_transient());
    }
}
