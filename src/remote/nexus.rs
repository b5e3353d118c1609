//! Nexus REST API client for raw repositories.

use std::io;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;

use super::{select_listed, Asset, ByteStream, RemoteError, Repository, UploadComponent};
use crate::config::Config;

const SEARCH_ASSETS: &str = "/service/rest/v1/search/assets";
const COMPONENTS: &str = "/service/rest/v1/components";

/// One page of `search/assets` results.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchPage {
    #[serde(default)]
    items: Vec<Asset>,
    #[serde(default)]
    continuation_token: Option<String>,
}

/// Nexus repository client using HTTP basic authentication.
#[derive(Debug, Clone)]
pub struct NexusClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl NexusClient {
    pub fn new(config: &Config) -> Result<Self, RemoteError> {
        let base_url = config.url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(RemoteError::InvalidUrl {
                url: config.url.clone(),
                message: "expected an http:// or https:// URL".to_string(),
            });
        }

        let http = Client::builder()
            .user_agent(concat!("nexus-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.username, Some(&self.password))
    }

    /// Run an asset search, following continuation tokens until exhausted.
    async fn search(&self, repository: &str, q: Option<String>) -> Result<Vec<Asset>, RemoteError> {
        let url = format!("{}{}", self.base_url, SEARCH_ASSETS);
        let mut assets = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("repository", repository.to_string()),
                ("format", "raw".to_string()),
                ("direction", "asc".to_string()),
                ("sort", "name".to_string()),
            ];
            if let Some(q) = &q {
                query.push(("q", q.clone()));
            }
            if let Some(t) = &token {
                query.push(("continuationToken", t.clone()));
            }

            let response = self.authed(self.http.get(&url).query(&query)).send().await?;
            let response = check_status(response, "listing assets", repository).await?;
            let page: SearchPage = response.json().await?;

            tracing::debug!(repository, items = page.items.len(), "received asset page");
            assets.extend(page.items);

            match page.continuation_token {
                Some(t) if !t.is_empty() => token = Some(t),
                _ => break,
            }
        }

        Ok(assets)
    }
}

/// Map error statuses to [`RemoteError`]s, passing successful responses through.
async fn check_status(response: Response, operation: &'static str, repository: &str) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(RemoteError::RepositoryNotFound(repository.to_string()));
    }
    let message = response.text().await.unwrap_or_default();
    Err(RemoteError::Status {
        operation,
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Repository for NexusClient {
    async fn list_assets(&self, repository: &str, path: &str, recursive: bool) -> Result<Vec<Asset>, RemoteError> {
        let base = path.trim_matches('/');
        let q = (!base.is_empty()).then(|| format!("/{}/*", base));

        let mut assets = select_listed(self.search(repository, q).await?, base, recursive);

        // `path` may name a single file rather than a folder
        if assets.is_empty() && !base.is_empty() {
            let exact = self.search(repository, Some(format!("/{}", base))).await?;
            assets = exact.into_iter().filter(|a| a.normalized_path() == base).collect();
        }

        Ok(assets)
    }

    async fn download(&self, asset: &Asset) -> Result<ByteStream, RemoteError> {
        let response = self.authed(self.http.get(&asset.download_url)).send().await?;
        if response.status() != StatusCode::OK {
            return Err(RemoteError::Status {
                operation: "downloading asset",
                status: response.status().as_u16(),
                message: asset.path.clone(),
            });
        }

        let stream = response.bytes_stream().map_err(io::Error::other);
        Ok(Box::pin(stream))
    }

    async fn upload_component(&self, component: UploadComponent) -> Result<(), RemoteError> {
        let url = format!("{}{}", self.base_url, COMPONENTS);
        let mut form = Form::new();

        for (i, asset) in component.assets.into_iter().enumerate() {
            let n = i + 1;
            let file_name = asset.file_name().to_string();
            let part = Part::stream(Body::wrap_stream(asset.body)).file_name(file_name);
            form = form
                .part(format!("raw.asset{}", n), part)
                .text(format!("raw.asset{}.filename", n), asset.path);
        }
        if !component.directory.is_empty() {
            form = form.text("raw.directory", component.directory.clone());
        }

        let request = self
            .http
            .post(&url)
            .query(&[("repository", component.repository.as_str())])
            .multipart(form);
        let response = self.authed(request).send().await?;
        check_status(response, "uploading component", &component.repository).await?;
        Ok(())
    }
}
