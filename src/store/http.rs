use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::{AppConfig, Credentials};
use crate::model::{Id, Location, NewRelation, Relation, RelationKind, RelationUpdate, ResourceError};
use crate::store::traits::{LocationStore, RelationStore};

/// Client for the Flora IM REST endpoints.
///
/// Every request carries the consumer credentials, a `_t` cache-busting
/// parameter and `no-store` cache headers; admin data must never be served
/// stale by an intermediary.
#[derive(Debug, Clone)]
pub struct HttpRelationStore {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl HttpRelationStore {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self, ResourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, no-cache, must-revalidate"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| ResourceError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let credentials = config.credentials()?;
        Ok(Self::new(&config.remote.base_url, credentials, config.request_timeout())?)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let cache_buster = chrono::Utc::now().timestamp_millis().to_string();
        self.client.request(method, self.url(path)).query(&[
            ("consumer_key", self.credentials.consumer_key.as_str()),
            ("consumer_secret", self.credentials.consumer_secret.as_str()),
            ("_t", cache_buster.as_str()),
        ])
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ResourceError> {
        let response = request
            .send()
            .await
            .map_err(|e| ResourceError::transport(format!("Request failed: {}", e)))?;

        let status = response.status();
        debug!("{} {}", status.as_u16(), response.url().path());
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(ResourceError::from_response_body(status.as_u16(), &body))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ResourceError> {
        let response = self.send(request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ResourceError::transport(format!("Failed to read response: {}", e)))?;
        serde_json::from_str(&body).map_err(|e| ResourceError::decode(format!("Unexpected response body: {}", e)))
    }
}

#[async_trait::async_trait]
impl RelationStore for HttpRelationStore {
    async fn list_relations(&self, kind: RelationKind, owner_id: &Id) -> Result<Vec<Relation>, ResourceError> {
        let request = self
            .request(Method::GET, kind.segment())
            .query(&[("owner_id", owner_id.as_str())]);
        self.send_json(request).await
    }

    async fn create_relation(&self, kind: RelationKind, relation: &NewRelation) -> Result<Relation, ResourceError> {
        let request = self.request(Method::POST, kind.segment()).json(relation);
        self.send_json(request).await
    }

    async fn update_relation(
        &self,
        kind: RelationKind,
        owner_id: &Id,
        right_id: &Id,
        update: &RelationUpdate,
    ) -> Result<Relation, ResourceError> {
        let request = self
            .request(Method::PUT, &format!("{}/{}", kind.segment(), right_id))
            .query(&[("owner_id", owner_id.as_str())])
            .json(update);
        self.send_json(request).await
    }

    async fn delete_relation(&self, kind: RelationKind, owner_id: &Id, right_id: &Id) -> Result<(), ResourceError> {
        let request = self
            .request(Method::DELETE, &format!("{}/{}", kind.segment(), right_id))
            .query(&[("owner_id", owner_id.as_str())]);
        self.send(request).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LocationStore for HttpRelationStore {
    async fn list_locations(&self) -> Result<Vec<Location>, ResourceError> {
        self.send_json(self.request(Method::GET, "locations")).await
    }

    async fn delete_location(&self, id: &Id) -> Result<(), ResourceError> {
        self.send(self.request(Method::DELETE, &format!("locations/{}", id)))
            .await?;
        Ok(())
    }
}
