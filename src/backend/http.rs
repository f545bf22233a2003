//! HTTP implementation of the security engine contract.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::config::BackendConfig;

use super::{
    AccountInfo, BackendError, Credential, SamlAuthToken, SamlAuthorizeDescriptor, SecurityBackend,
};

/// Talks to the engine's REST plugin over HTTP(S).
pub struct HttpSecurityBackend {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct AuthTokenRequest<'a> {
    #[serde(rename = "SAMLResponse")]
    saml_response: &'a str,
    #[serde(rename = "RequestId", skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
    #[serde(rename = "acsEndpoint", skip_serializing_if = "Option::is_none")]
    acs_endpoint: Option<&'a str>,
}

impl HttpSecurityBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.insecure)
            .build()?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Translate a non-success engine response into a `BackendError`.
    async fn error_for(response: reqwest::Response) -> BackendError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => BackendError::Unauthorized,
            403 => BackendError::Forbidden(body),
            _ => BackendError::UnexpectedStatus {
                status: status.as_u16(),
                body,
            },
        }
    }

    async fn fetch_account_info(
        &self,
        credential: &Credential,
    ) -> Result<AccountInfo, BackendError> {
        let response = self
            .client
            .get(self.url("/_plugins/_security/authinfo"))
            .header(http::header::AUTHORIZATION, credential.authorization_header())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        // The engine reports tenants and roles in its own field names;
        // normalize here so the rest of the crate sees one shape.
        let raw: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let user_name = raw
            .get("user_name")
            .and_then(Value::as_str)
            .ok_or_else(|| BackendError::Decode("authinfo missing user_name".into()))?
            .to_string();

        let tenants = raw
            .get("tenants")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .map(|(name, writable)| {
                        (name.clone(), writable.as_bool().unwrap_or(false))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let roles = string_list(raw.get("roles"));
        let backend_roles = string_list(raw.get("backend_roles"));
        let sso_logout_url = raw
            .get("sso_logout_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Ok(AccountInfo {
            user_name,
            tenants,
            roles,
            backend_roles,
            sso_logout_url,
        })
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SecurityBackend for HttpSecurityBackend {
    async fn authenticate(&self, credential: &Credential) -> Result<AccountInfo, BackendError> {
        // The engine has no separate login endpoint; a successful authinfo
        // call proves the credential.
        self.fetch_account_info(credential).await
    }

    async fn auth_info(&self, credential: &Credential) -> Result<AccountInfo, BackendError> {
        self.fetch_account_info(credential).await
    }

    async fn saml_authorize(&self) -> Result<SamlAuthorizeDescriptor, BackendError> {
        let response = self
            .client
            .get(self.url("/_plugins/_security/saml/authorize"))
            .send()
            .await?;

        match response.status().as_u16() {
            200 => response
                .json()
                .await
                .map_err(|e| BackendError::Decode(e.to_string())),
            // 400/404 here means SAML is not set up on the engine.
            400 | 404 | 501 => {
                let body = response.text().await.unwrap_or_default();
                Err(BackendError::SamlConfig(body))
            }
            _ => Err(Self::error_for(response).await),
        }
    }

    async fn saml_authtoken(
        &self,
        saml_response: &str,
        request_id: Option<&str>,
        acs_endpoint: Option<&str>,
    ) -> Result<SamlAuthToken, BackendError> {
        let body = AuthTokenRequest {
            saml_response,
            request_id,
            acs_endpoint,
        };

        let response = self
            .client
            .post(self.url("/_plugins/_security/saml/authtoken"))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    async fn ensure_workspace(
        &self,
        credential: &Credential,
        tenant: &str,
    ) -> Result<(), BackendError> {
        let response = self
            .client
            .post(self.url("/_plugins/_workspaces/_default"))
            .header(http::header::AUTHORIZATION, credential.authorization_header())
            .header("securitytenant", tenant)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn backend_for(server: &MockServer) -> HttpSecurityBackend {
        let config = BackendConfig {
            url: server.uri(),
            timeout_secs: 5,
            insecure: false,
        };
        HttpSecurityBackend::new(&config).unwrap()
    }

    fn basic() -> Credential {
        Credential::Basic {
            username: "alice".into(),
            password: "pw".into(),
        }
    }

    #[tokio::test]
    async fn test_auth_info_normalizes_engine_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_plugins/_security/authinfo"))
            .and(header("authorization", "Basic YWxpY2U6cHc="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "user_name": "alice",
                "tenants": {"global_tenant": true, "alice": true, "audit": false},
                "roles": ["kibanauser"],
                "backend_roles": [],
                "sso_logout_url": "https://idp.example.com/logout"
            })))
            .mount(&server)
            .await;

        let info = backend_for(&server).auth_info(&basic()).await.unwrap();
        assert_eq!(info.user_name, "alice");
        assert_eq!(info.tenants.get("audit"), Some(&false));
        assert_eq!(info.roles, vec!["kibanauser"]);
        assert_eq!(
            info.sso_logout_url.as_deref(),
            Some("https://idp.example.com/logout")
        );
    }

    #[tokio::test]
    async fn test_authenticate_maps_401() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_plugins/_security/authinfo"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = backend_for(&server).authenticate(&basic()).await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthorized));
        assert!(err.is_credential_failure());
    }

    #[tokio::test]
    async fn test_saml_authorize_config_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_plugins/_security/saml/authorize"))
            .respond_with(ResponseTemplate::new(400).set_body_string("saml not enabled"))
            .mount(&server)
            .await;

        let err = backend_for(&server).saml_authorize().await.unwrap_err();
        assert!(matches!(err, BackendError::SamlConfig(msg) if msg.contains("not enabled")));
    }

    #[tokio::test]
    async fn test_saml_authtoken_omits_absent_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_plugins/_security/saml/authtoken"))
            .and(body_json_string(r#"{"SAMLResponse":"resp"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "authorization": "Bearer minted"
            })))
            .mount(&server)
            .await;

        let token = backend_for(&server)
            .saml_authtoken("resp", None, None)
            .await
            .unwrap();
        assert_eq!(token.authorization, "Bearer minted");
    }

    #[tokio::test]
    async fn test_saml_authtoken_sends_acs_endpoint_when_given() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_plugins/_security/saml/authtoken"))
            .and(body_json_string(
                r#"{"SAMLResponse":"resp","acsEndpoint":"/auth/saml/acs/idpinitiated"}"#,
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "authorization": "Bearer minted"
            })))
            .mount(&server)
            .await;

        let token = backend_for(&server)
            .saml_authtoken("resp", None, Some("/auth/saml/acs/idpinitiated"))
            .await
            .unwrap();
        assert_eq!(token.authorization, "Bearer minted");
    }

    #[tokio::test]
    async fn test_ensure_workspace_sends_tenant_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_plugins/_workspaces/_default"))
            .and(header("securitytenant", "alice"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        backend_for(&server)
            .ensure_workspace(&basic(), "alice")
            .await
            .unwrap();
    }
}
