use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{validate_object_key, ObjectStore, ObjectStoreError};

const API_BASE: &str = "https://storage.googleapis.com";

/// Google Cloud Storage object store backend.
pub struct GcsStore {
    bucket: String,
    client: Client,
    access_token: tokio::sync::RwLock<String>,
    credentials_file: Option<String>,
}

#[derive(Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    token_uri: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListItem>,
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ListItem {
    name: String,
}

impl GcsStore {
    pub async fn new(bucket: &str, credentials_file: Option<&str>) -> Result<Self, anyhow::Error> {
        let client = Client::builder().build()?;

        let store = Self {
            bucket: bucket.to_string(),
            client,
            access_token: tokio::sync::RwLock::new(String::new()),
            credentials_file: credentials_file.map(|s| s.to_string()),
        };

        store.refresh_token().await?;
        Ok(store)
    }

    async fn refresh_token(&self) -> Result<(), anyhow::Error> {
        let token = if let Some(ref creds_path) = self.credentials_file {
            self.token_from_service_account(creds_path).await?
        } else {
            self.token_from_metadata_server().await?
        };

        let mut lock = self.access_token.write().await;
        *lock = token;
        Ok(())
    }

    async fn token_from_service_account(&self, path: &str) -> Result<String, anyhow::Error> {
        let key_json = tokio::fs::read_to_string(path).await?;
        let key: ServiceAccountKey = serde_json::from_str(&key_json)?;

        let now = chrono::Utc::now().timestamp();
        let claims = serde_json::json!({
            "iss": key.client_email,
            "scope": "https://www.googleapis.com/auth/devstorage.read_write",
            "aud": key.token_uri,
            "iat": now,
            "exp": now + 3600,
        });

        let header = base64_url_encode(&serde_json::to_vec(&serde_json::json!({
            "alg": "RS256",
            "typ": "JWT"
        }))?);
        let payload = base64_url_encode(&serde_json::to_vec(&claims)?);
        let unsigned = format!("{header}.{payload}");

        let signature = sign_rs256(unsigned.as_bytes(), &key.private_key)?;
        let jwt = format!("{unsigned}.{}", base64_url_encode(&signature));

        let resp: TokenResponse = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &jwt),
            ])
            .send()
            .await?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    async fn token_from_metadata_server(&self) -> Result<String, anyhow::Error> {
        let resp: TokenResponse = self
            .client
            .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
            .header("Metadata-Flavor", "Google")
            .send()
            .await?
            .json()
            .await?;

        Ok(resp.access_token)
    }

    /// Send an authorized request, refreshing the access token once if it expired.
    async fn send_authorized<F>(&self, build: F) -> Result<Response, ObjectStoreError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.access_token.read().await.clone();
        let resp = build(&self.client)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        tracing::debug!(bucket = %self.bucket, "GCS access token rejected, refreshing");
        self.refresh_token()
            .await
            .map_err(|e| ObjectStoreError::Backend(format!("GCS token refresh failed: {e}")))?;

        let token = self.access_token.read().await.clone();
        build(&self.client)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    fn upload_url(&self, key: &str) -> String {
        format!(
            "{API_BASE}/upload/storage/v1/b/{}/o?uploadType=media&name={}",
            self.bucket,
            encode_object_name(key)
        )
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{API_BASE}/storage/v1/b/{}/o/{}",
            self.bucket,
            encode_object_name(key)
        )
    }

    fn list_url(&self) -> String {
        format!("{API_BASE}/storage/v1/b/{}/o", self.bucket)
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<(), ObjectStoreError> {
        validate_object_key(key)?;
        let content_type = mime_guess::from_path(key)
            .first_or_octet_stream()
            .to_string();

        let resp = self
            .send_authorized(|client| {
                client
                    .post(self.upload_url(key))
                    .header("Content-Type", content_type.as_str())
                    .body(data.clone())
            })
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS upload failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        validate_object_key(key)?;
        let url = format!("{}?alt=media", self.object_url(key));
        let resp = self.send_authorized(|client| client.get(&url)).await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(ObjectStoreError::NotFound(key.to_string()));
        }

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS download failed ({status}): {body}"
            )));
        }

        resp.bytes()
            .await
            .map_err(|e| ObjectStoreError::Backend(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        validate_object_key(key)?;
        let url = self.object_url(key);
        let resp = self.send_authorized(|client| client.delete(&url)).await?;

        // 404 is fine -- object already gone
        if !resp.status().is_success() && resp.status() != StatusCode::NOT_FOUND {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ObjectStoreError::Backend(format!(
                "GCS delete failed ({status}): {body}"
            )));
        }

        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, ObjectStoreError> {
        validate_object_key(key)?;
        let url = self.object_url(key);
        let resp = self.send_authorized(|client| client.get(&url)).await?;

        Ok(resp.status().is_success())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let mut keys = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let url = self.list_url();
            let token = page_token.clone();
            let resp = self
                .send_authorized(|client| {
                    let mut req = client.get(&url).query(&[("prefix", prefix)]);
                    if let Some(ref t) = token {
                        req = req.query(&[("pageToken", t.as_str())]);
                    }
                    req
                })
                .await?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(ObjectStoreError::Backend(format!(
                    "GCS list failed ({status}): {body}"
                )));
            }

            let page: ListResponse = resp
                .json()
                .await
                .map_err(|e| ObjectStoreError::Backend(e.to_string()))?;
            keys.extend(page.items.into_iter().map(|item| item.name));

            match page.next_page_token {
                Some(t) => page_token = Some(t),
                None => break,
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn public_url(&self, key: &str) -> String {
        format!("{API_BASE}/{}/{key}", self.bucket)
    }
}

/// Object names go into a single path segment, so `/` must be escaped.
/// Keys are already restricted to `[A-Za-z0-9/._-]` by `validate_object_key`.
fn encode_object_name(key: &str) -> String {
    key.replace('/', "%2F")
}

fn base64_url_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(data)
}

fn sign_rs256(data: &[u8], private_key_pem: &str) -> Result<Vec<u8>, anyhow::Error> {
    // Strip PEM headers and decode base64
    let der_b64: String = private_key_pem
        .lines()
        .filter(|line| !line.starts_with("-----"))
        .collect();
    let der = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, &der_b64)?;

    let key_pair = ring::signature::RsaKeyPair::from_pkcs8(&der)
        .map_err(|e| anyhow::anyhow!("Failed to parse RSA key: {e}"))?;

    let mut signature = vec![0u8; key_pair.public().modulus_len()];
    key_pair
        .sign(
            &ring::signature::RSA_PKCS1_SHA256,
            &ring::rand::SystemRandom::new(),
            data,
            &mut signature,
        )
        .map_err(|e| anyhow::anyhow!("Failed to sign: {e}"))?;

    Ok(signature)
}
