//! Project store backed by the hosted PostgREST data API (`/rest/v1`).
//!
//! Requests use the service key, so row level security does not apply; every
//! query carries an explicit `user_id` filter instead.

use super::{normalize_name, Project, ProjectStore, StoreError};
use crate::APP_USER_AGENT;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;
use uuid::Uuid;

const PROJECT_COLUMNS: &str = "id,name,created_at";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    message: Option<String>,
    hint: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PostgrestProjectStore {
    client: Client,
    table_url: Url,
    service_key: SecretString,
}

impl PostgrestProjectStore {
    /// `base_url` is the service root, the same one the auth API lives under.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str, service_key: SecretString) -> Result<Self> {
        let mut base =
            Url::parse(base_url).with_context(|| format!("Invalid data API URL: {base_url}"))?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let table_url = base
            .join("rest/v1/projects")
            .context("Failed to build projects endpoint")?;

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build data API HTTP client")?;

        Ok(Self {
            client,
            table_url,
            service_key,
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let key = self.service_key.expose_secret();
        self.client
            .request(method, url)
            .header("apikey", key)
            .bearer_auth(key)
    }

    fn owned_by(&self, owner: Uuid) -> Url {
        let mut url = self.table_url.clone();
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{owner}"));
        url
    }

    async fn send(builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = builder
            .send()
            .await
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let payload = response
            .json::<ErrorPayload>()
            .await
            .unwrap_or_default();
        let message = match (payload.message, payload.hint) {
            (Some(message), Some(hint)) => format!("{message} ({hint})"),
            (Some(message), None) => message,
            _ => status.to_string(),
        };
        Err(StoreError::Backend(message))
    }

    async fn rows(response: Response) -> Result<Vec<Project>, StoreError> {
        response
            .json::<Vec<Project>>()
            .await
            .map_err(|err| StoreError::Backend(format!("invalid projects payload: {err}")))
    }
}

#[async_trait]
impl ProjectStore for PostgrestProjectStore {
    #[instrument(skip(self))]
    async fn list(&self, owner: Uuid) -> Result<Vec<Project>, StoreError> {
        let mut url = self.owned_by(owner);
        url.query_pairs_mut()
            .append_pair("select", PROJECT_COLUMNS)
            .append_pair("order", "created_at.desc");

        let response = Self::send(self.request(Method::GET, url)).await?;
        let projects = Self::rows(response).await?;
        debug!(count = projects.len(), "Listed projects");
        Ok(projects)
    }

    #[instrument(skip(self))]
    async fn insert(&self, owner: Uuid, name: &str) -> Result<Project, StoreError> {
        let name = normalize_name(name)?;
        let mut url = self.table_url.clone();
        url.query_pairs_mut().append_pair("select", PROJECT_COLUMNS);

        let builder = self
            .request(Method::POST, url)
            .header("Prefer", "return=representation")
            .json(&json!({ "user_id": owner, "name": name }));
        let response = Self::send(builder).await?;

        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("insert returned no rows".to_string()))
    }

    #[instrument(skip(self))]
    async fn delete(&self, owner: Uuid, id: &str) -> Result<(), StoreError> {
        let mut url = self.owned_by(owner);
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{id}"))
            .append_pair("select", "id");

        let builder = self
            .request(Method::DELETE, url)
            .header("Prefer", "return=representation");
        let response = Self::send(builder).await?;

        let deleted = response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|err| StoreError::Backend(format!("invalid delete payload: {err}")))?;
        if deleted.is_empty() {
            Err(StoreError::NotFound)
        } else {
            Ok(())
        }
    }
}
