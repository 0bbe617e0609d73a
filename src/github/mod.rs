//! Hosting-platform client.
//!
//! `GitHost` is the seam the publisher and pipeline go through; the
//! production implementation `GithubClient` speaks the GitHub REST API with
//! a per-request access token.

mod types;

pub use types::{Account, GitObject, GitRef, PullRequest, TreeEntry};

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::http::send_checked;
use types::{
    CreateBlobRequest, CreateCommitRequest, CreatePullRequest, CreateRefRequest,
    CreateTreeRequest, ShaResponse, UpdateRefRequest,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Everything the pipeline needs from a Git hosting platform: snapshot
/// download, ref manipulation, and the object-graph creation calls.
pub trait GitHost {
    fn authenticated_user(&self) -> impl Future<Output = Result<Account>>;

    fn fetch_tarball(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> impl Future<Output = Result<Vec<u8>>>;

    fn get_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> impl Future<Output = Result<GitRef>>;

    fn create_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> impl Future<Output = Result<()>>;

    fn update_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> impl Future<Output = Result<()>>;

    fn delete_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> impl Future<Output = Result<()>>;

    /// Create a content blob; `content` is base64-encoded.
    fn create_blob(
        &self,
        owner: &str,
        repo: &str,
        content: &str,
    ) -> impl Future<Output = Result<String>>;

    /// Create a tree layering `entries` over `base_tree`.
    fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: &str,
        entries: Vec<TreeEntry>,
    ) -> impl Future<Output = Result<String>>;

    fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree: &str,
        parents: Vec<String>,
    ) -> impl Future<Output = Result<String>>;

    fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> impl Future<Output = Result<PullRequest>>;
}

/// GitHub REST client authenticated by a per-request access token.
pub struct GithubClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
    user_agent: String,
}

impl GithubClient {
    pub fn new(base_url: String, token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url,
            token,
            user_agent: format!("pullsmith/{}", env!("CARGO_PKG_VERSION")),
        })
    }

    fn build_url(&self, endpoint: &str) -> Result<Url> {
        let base = Url::parse(&self.base_url)
            .with_context(|| format!("invalid API base URL: {}", self.base_url))?;
        base.join(endpoint)
            .with_context(|| format!("failed to build URL for endpoint: {}", endpoint))
    }

    fn request(&self, method: reqwest::Method, url: &Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url.clone())
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("User-Agent", &self.user_agent)
            .header("x-request-id", Uuid::new_v4().to_string())
    }

    async fn get_json<R: DeserializeOwned>(&self, endpoint: &str) -> Result<R> {
        let url = self.build_url(endpoint)?;
        debug!("GET {}", url);
        let response = send_checked(|| self.request(reqwest::Method::GET, &url), endpoint).await?;
        response
            .json()
            .await
            .with_context(|| format!("failed to parse response from {}", endpoint))
    }

    async fn send_json<T, R>(&self, method: reqwest::Method, endpoint: &str, body: &T) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let url = self.build_url(endpoint)?;
        debug!("{} {}", method, url);
        let response = send_checked(
            || self.request(method.clone(), &url).json(body),
            endpoint,
        )
        .await?;
        response
            .json()
            .await
            .with_context(|| format!("failed to parse response from {}", endpoint))
    }
}

impl GitHost for GithubClient {
    async fn authenticated_user(&self) -> Result<Account> {
        self.get_json("user").await
    }

    async fn fetch_tarball(&self, owner: &str, repo: &str, branch: &str) -> Result<Vec<u8>> {
        let endpoint = format!("repos/{}/{}/tarball/{}", owner, repo, branch);
        let url = self.build_url(&endpoint)?;
        debug!("GET {}", url);

        let response =
            send_checked(|| self.request(reqwest::Method::GET, &url), &endpoint).await?;
        let bytes = response
            .bytes()
            .await
            .with_context(|| format!("failed to download tarball for {}/{}", owner, repo))?;
        Ok(bytes.to_vec())
    }

    async fn get_ref(&self, owner: &str, repo: &str, branch: &str) -> Result<GitRef> {
        self.get_json(&format!("repos/{}/{}/git/ref/heads/{}", owner, repo, branch))
            .await
    }

    async fn create_ref(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()> {
        let body = CreateRefRequest {
            name: format!("refs/heads/{}", branch),
            sha: sha.to_string(),
        };
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::POST,
                &format!("repos/{}/{}/git/refs", owner, repo),
                &body,
            )
            .await?;
        Ok(())
    }

    async fn update_ref(&self, owner: &str, repo: &str, branch: &str, sha: &str) -> Result<()> {
        let body = UpdateRefRequest {
            sha: sha.to_string(),
            force: false,
        };
        let _: serde_json::Value = self
            .send_json(
                reqwest::Method::PATCH,
                &format!("repos/{}/{}/git/refs/heads/{}", owner, repo, branch),
                &body,
            )
            .await?;
        Ok(())
    }

    async fn delete_ref(&self, owner: &str, repo: &str, branch: &str) -> Result<()> {
        let endpoint = format!("repos/{}/{}/git/refs/heads/{}", owner, repo, branch);
        let url = self.build_url(&endpoint)?;
        debug!("DELETE {}", url);
        send_checked(|| self.request(reqwest::Method::DELETE, &url), &endpoint).await?;
        Ok(())
    }

    async fn create_blob(&self, owner: &str, repo: &str, content: &str) -> Result<String> {
        let body = CreateBlobRequest {
            content: content.to_string(),
            encoding: "base64".to_string(),
        };
        let response: ShaResponse = self
            .send_json(
                reqwest::Method::POST,
                &format!("repos/{}/{}/git/blobs", owner, repo),
                &body,
            )
            .await?;
        Ok(response.sha)
    }

    async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: &str,
        entries: Vec<TreeEntry>,
    ) -> Result<String> {
        let body = CreateTreeRequest {
            base_tree: base_tree.to_string(),
            tree: entries,
        };
        let response: ShaResponse = self
            .send_json(
                reqwest::Method::POST,
                &format!("repos/{}/{}/git/trees", owner, repo),
                &body,
            )
            .await?;
        Ok(response.sha)
    }

    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree: &str,
        parents: Vec<String>,
    ) -> Result<String> {
        let body = CreateCommitRequest {
            message: message.to_string(),
            tree: tree.to_string(),
            parents,
        };
        let response: ShaResponse = self
            .send_json(
                reqwest::Method::POST,
                &format!("repos/{}/{}/git/commits", owner, repo),
                &body,
            )
            .await?;
        Ok(response.sha)
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head: &str,
        base: &str,
    ) -> Result<PullRequest> {
        let request = CreatePullRequest {
            title: title.to_string(),
            head: head.to_string(),
            base: base.to_string(),
            body: body.to_string(),
        };
        self.send_json(
            reqwest::Method::POST,
            &format!("repos/{}/{}/pulls", owner, repo),
            &request,
        )
        .await
    }
}
