//! GitHub REST client
//!
//! Minimal v3 API surface for the scout: the user's repositories, commits
//! since a watermark, and per-commit detail. List endpoints follow
//! Link-header pagination to the end; a page that fails to fetch ends the
//! walk with whatever was collected so far.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

const API_BASE: &str = "https://api.github.com";

#[derive(Debug, Clone, Deserialize)]
pub struct Repo {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitDetail {
    pub sha: String,
    pub commit: CommitMeta,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitMeta {
    pub author: CommitAuthor,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitAuthor {
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitFile {
    pub filename: String,
    #[serde(default)]
    pub additions: i64,
}

pub struct GithubClient {
    http: reqwest::Client,
}

impl GithubClient {
    pub fn new(token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("token {}", token))
                .context("access token is not a valid header value")?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static("tempo-scout"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http })
    }

    pub async fn list_repos(&self, username: &str) -> Result<Vec<Repo>> {
        let url = format!("{}/users/{}/repos?per_page=100", API_BASE, username);
        self.fetch_all_pages(&url).await
    }

    /// Commits authored by `username` in one repo, optionally bounded below
    /// by the last scout watermark
    pub async fn list_commits(
        &self,
        full_name: &str,
        username: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<CommitRef>> {
        let mut url = format!(
            "{}/repos/{}/commits?author={}&per_page=100",
            API_BASE, full_name, username
        );
        if let Some(since) = since {
            url.push_str(&format!("&since={}", since.to_rfc3339()));
        }
        self.fetch_all_pages(&url).await
    }

    pub async fn commit_detail(&self, url: &str) -> Result<CommitDetail> {
        let detail = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(detail)
    }

    /// Collect every page of a list endpoint by chasing `rel="next"` links
    async fn fetch_all_pages<T: DeserializeOwned>(&self, url: &str) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut next_url = Some(url.to_string());

        while let Some(url) = next_url.take() {
            debug!(%url, "fetching page");
            let response = match self.http.get(&url).send().await {
                Ok(response) => response,
                Err(err) => {
                    warn!(%url, error = %err, "page fetch failed, keeping partial results");
                    break;
                }
            };
            let response = match response.error_for_status() {
                Ok(response) => response,
                Err(err) => {
                    warn!(%url, error = %err, "page fetch failed, keeping partial results");
                    break;
                }
            };

            next_url = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .and_then(next_link);

            let mut page: Vec<T> = response.json().await?;
            results.append(&mut page);
        }
        Ok(results)
    }
}

/// Pull the `rel="next"` target out of a Link header, if present
fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (target, rel) = part.split_once(';')?;
        if !rel.contains("rel=\"next\"") {
            return None;
        }
        Some(target.trim().trim_start_matches('<').trim_end_matches('>').to_string())
    })
}
