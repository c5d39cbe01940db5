//! GitHub REST client: repository reading and pull-request publishing.

use std::fmt::Write as _;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::model::FileRecord;
use crate::ports::publisher::{PublishOutcome, PublishStatus, PullRequestPublisher};
use crate::ports::repository::{RepoRef, RepoTree, RepositoryReader, TreeEntry, TreeEntryKind};
use crate::ports::{PortError, PortFuture};

/// Branch every publish call writes to.
pub const WORK_BRANCH: &str = "revive-modernization";

const USER_AGENT: &str = concat!("revive/", env!("CARGO_PKG_VERSION"));
const FETCH_TRIES: u32 = 3;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const PR_FILE_LIST: usize = 20;

/// GitHub client for both the repository reader and the publisher ports.
pub struct GitHubClient {
    client: Client,
    api_url: String,
    raw_url: String,
    token: Option<String>,
    /// Unit of the rate-limit backoff (403 waits 2 units per try, 429 waits 5).
    backoff_unit: Duration,
}

impl GitHubClient {
    /// A client for the given API and raw-content hosts.
    #[must_use]
    pub fn new(
        api_url: impl Into<String>,
        raw_url: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            raw_url: raw_url.into().trim_end_matches('/').to_string(),
            token,
            backoff_unit: Duration::from_secs(1),
        }
    }

    /// Replaces the rate-limit backoff unit.
    #[must_use]
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json")
            .timeout(REQUEST_TIMEOUT);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn repo_url(&self, repo: &RepoRef, rest: &str) -> String {
        format!("{}/repos/{}/{}{rest}", self.api_url, repo.owner, repo.name)
    }

    async fn call(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<(StatusCode, Value), PortError> {
        let mut builder = self.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok((status, value))
    }

    async fn expect_ok(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, PortError> {
        let (status, value) = self.call(method, url, body).await?;
        if status.is_success() {
            Ok(value)
        } else {
            Err(format!("GitHub {status} for {url}: {}", message_of(&value)).into())
        }
    }

    /// GET with the rate-limit retry policy; `Ok(None)` on 404.
    async fn get_with_retry(&self, url: &str) -> Result<Option<String>, PortError> {
        let mut last = String::new();
        for attempt in 0..FETCH_TRIES {
            let response = self.request(Method::GET, url).send().await?;
            let status = response.status();
            match status {
                StatusCode::NOT_FOUND => return Ok(None),
                StatusCode::FORBIDDEN => {
                    tokio::time::sleep(self.backoff_unit * 2 * (attempt + 1)).await;
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    tokio::time::sleep(self.backoff_unit * 5 * (attempt + 1)).await;
                }
                s if s.is_success() => return Ok(Some(response.text().await?)),
                _ => {}
            }
            last = format!("GitHub {status} for {url}");
            debug!(attempt, %status, url, "github fetch retry");
        }
        Err(last.into())
    }

    async fn via_contents(
        &self,
        repo: &RepoRef,
        branch: &str,
        path: &str,
    ) -> Result<Option<String>, PortError> {
        let url = self.repo_url(repo, &format!("/contents/{path}?ref={branch}"));
        let Some(body) = self.get_with_retry(&url).await? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&body)?;
        Ok(value.get("content").and_then(Value::as_str).and_then(decode_base64))
    }

    async fn via_raw(
        &self,
        repo: &RepoRef,
        branch: &str,
        path: &str,
    ) -> Result<Option<String>, PortError> {
        let url = format!("{}/{}/{}/{branch}/{path}", self.raw_url, repo.owner, repo.name);
        self.get_with_retry(&url).await
    }

    async fn via_blob(&self, repo: &RepoRef, sha: &str) -> Result<Option<String>, PortError> {
        let url = self.repo_url(repo, &format!("/git/blobs/{sha}"));
        let Some(body) = self.get_with_retry(&url).await? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&body)?;
        Ok(value.get("content").and_then(Value::as_str).and_then(decode_base64))
    }

    async fn default_branch_name(&self, repo: &RepoRef) -> Result<String, PortError> {
        let value = self.expect_ok(Method::GET, &self.repo_url(repo, ""), None).await?;
        Ok(value.get("default_branch").and_then(Value::as_str).unwrap_or("main").to_string())
    }

    /// Makes sure [`WORK_BRANCH`] exists and returns `(base branch, head sha)`.
    async fn ensure_work_branch(&self, repo: &RepoRef) -> Result<(String, String), PortError> {
        let base = self.default_branch_name(repo).await?;
        let work_ref = self.repo_url(repo, &format!("/git/ref/heads/{WORK_BRANCH}"));
        let (status, value) = self.call(Method::GET, &work_ref, None).await?;
        if status.is_success() {
            return Ok((base, ref_sha(&value)?));
        }

        let base_url = self.repo_url(repo, &format!("/git/ref/heads/{base}"));
        let base_ref = self.expect_ok(Method::GET, &base_url, None).await?;
        let sha = ref_sha(&base_ref)?;
        let body = json!({ "ref": format!("refs/heads/{WORK_BRANCH}"), "sha": sha });
        self.expect_ok(Method::POST, &self.repo_url(repo, "/git/refs"), Some(&body)).await?;
        info!(%repo, branch = WORK_BRANCH, "work branch created");
        Ok((base, sha))
    }

    /// Reuses an open pull request or opens one; falls back to a compare URL on 422.
    async fn ensure_pull_request(
        &self,
        repo: &RepoRef,
        base: &str,
        paths: &[&str],
    ) -> Result<String, PortError> {
        let list =
            self.repo_url(repo, &format!("/pulls?head={}:{WORK_BRANCH}&state=open", repo.owner));
        let open = self.expect_ok(Method::GET, &list, None).await?;
        if let Some(url) = open.get(0).and_then(|pr| pr.get("html_url")).and_then(Value::as_str) {
            return Ok(url.to_string());
        }

        let mut body_text =
            String::from("Automated modernization generated by revive.\n\nFiles:\n");
        for path in paths.iter().take(PR_FILE_LIST) {
            let _ = writeln!(body_text, "- `{path}`");
        }
        if paths.len() > PR_FILE_LIST {
            let _ = writeln!(body_text, "- ... and {} more", paths.len() - PR_FILE_LIST);
        }
        let body = json!({
            "title": "Modernized codebase",
            "head": WORK_BRANCH,
            "base": base,
            "body": body_text,
        });
        let (status, value) =
            self.call(Method::POST, &self.repo_url(repo, "/pulls"), Some(&body)).await?;
        if status.is_success() {
            return value
                .get("html_url")
                .and_then(Value::as_str)
                .map(ToString::to_string)
                .ok_or_else(|| "pull request response had no html_url".into());
        }
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            warn!(
                %repo,
                message = %message_of(&value),
                "pull request not created; using compare url"
            );
            return Ok(format!(
                "https://github.com/{}/{}/compare/{base}...{WORK_BRANCH}",
                repo.owner, repo.name
            ));
        }
        Err(format!("GitHub {status} creating pull request: {}", message_of(&value)).into())
    }

    async fn commit_one(
        &self,
        repo: &RepoRef,
        path: &str,
        content: &str,
    ) -> Result<PublishOutcome, PortError> {
        if self.token.is_none() {
            return Ok(PublishOutcome::error("GITHUB_TOKEN is not configured"));
        }
        let (base, _) = self.ensure_work_branch(repo).await?;
        let url = self.repo_url(repo, &format!("/contents/{path}"));
        let (status, existing) =
            self.call(Method::GET, &format!("{url}?ref={WORK_BRANCH}"), None).await?;
        let mut body = json!({
            "message": format!("Modernize {path}"),
            "content": STANDARD.encode(content),
            "branch": WORK_BRANCH,
        });
        if status.is_success() {
            if let Some(sha) = existing.get("sha").cloned() {
                body["sha"] = sha;
            }
        }
        let (status, value) = self.call(Method::PUT, &url, Some(&body)).await?;
        if !status.is_success() {
            return Ok(PublishOutcome::error(format!("GitHub {status}: {}", message_of(&value))));
        }
        let pr = self.ensure_pull_request(repo, &base, &[path]).await?;
        Ok(PublishOutcome {
            status: PublishStatus::Success,
            url: Some(pr),
            message: format!("Committed {path} to {WORK_BRANCH}"),
        })
    }

    async fn commit_many(
        &self,
        repo: &RepoRef,
        files: &[FileRecord],
    ) -> Result<PublishOutcome, PortError> {
        if self.token.is_none() {
            return Ok(PublishOutcome::error("GITHUB_TOKEN is not configured"));
        }
        if files.is_empty() {
            return Ok(PublishOutcome::error("No files to publish"));
        }
        let (base, head) = self.ensure_work_branch(repo).await?;
        let commit_url = self.repo_url(repo, &format!("/git/commits/{head}"));
        let commit = self.expect_ok(Method::GET, &commit_url, None).await?;
        let base_tree =
            commit.pointer("/tree/sha").and_then(Value::as_str).ok_or("commit has no tree")?;

        let mut tree = Vec::with_capacity(files.len());
        for file in files {
            let body = json!({ "content": file.content, "encoding": "utf-8" });
            let blob_url = self.repo_url(repo, "/git/blobs");
            let blob = self.expect_ok(Method::POST, &blob_url, Some(&body)).await?;
            let sha = blob.get("sha").and_then(Value::as_str).ok_or("blob has no sha")?;
            tree.push(json!({ "path": file.path, "mode": "100644", "type": "blob", "sha": sha }));
        }
        let body = json!({ "base_tree": base_tree, "tree": tree });
        let new_tree =
            self.expect_ok(Method::POST, &self.repo_url(repo, "/git/trees"), Some(&body)).await?;
        let tree_sha = new_tree.get("sha").and_then(Value::as_str).ok_or("tree has no sha")?;

        let body = json!({
            "message": format!("Modernize {} files", files.len()),
            "tree": tree_sha,
            "parents": [head],
        });
        let new_commit =
            self.expect_ok(Method::POST, &self.repo_url(repo, "/git/commits"), Some(&body)).await?;
        let commit_sha = new_commit.get("sha").and_then(Value::as_str).ok_or("commit has no sha")?;
        let body = json!({ "sha": commit_sha, "force": false });
        let ref_url = self.repo_url(repo, &format!("/git/refs/heads/{WORK_BRANCH}"));
        self.expect_ok(Method::PATCH, &ref_url, Some(&body)).await?;

        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        let pr = self.ensure_pull_request(repo, &base, &paths).await?;
        Ok(PublishOutcome {
            status: PublishStatus::Success,
            url: Some(pr),
            message: format!("Published {} files to {WORK_BRANCH}", files.len()),
        })
    }
}

#[derive(Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<RawEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Deserialize)]
struct RawEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: u64,
    sha: Option<String>,
}

fn decode_base64(encoded: &str) -> Option<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).ok()?;
    String::from_utf8(bytes).ok()
}

fn ref_sha(value: &Value) -> Result<String, PortError> {
    value
        .pointer("/object/sha")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| "ref has no object sha".into())
}

fn message_of(value: &Value) -> String {
    value
        .get("message")
        .and_then(Value::as_str)
        .map_or_else(|| value.to_string(), ToString::to_string)
}

impl RepositoryReader for GitHubClient {
    fn default_branch<'a>(&'a self, repo: &'a RepoRef) -> PortFuture<'a, String> {
        Box::pin(self.default_branch_name(repo))
    }

    fn tree<'a>(&'a self, repo: &'a RepoRef, branch: &'a str) -> PortFuture<'a, RepoTree> {
        Box::pin(async move {
            let url = self.repo_url(repo, &format!("/git/trees/{branch}?recursive=1"));
            let value = self.expect_ok(Method::GET, &url, None).await?;
            let parsed: TreeResponse = serde_json::from_value(value)?;
            let entries = parsed
                .tree
                .into_iter()
                .filter_map(|raw| {
                    let kind = match raw.kind.as_str() {
                        "blob" => TreeEntryKind::Blob,
                        "tree" => TreeEntryKind::Tree,
                        "commit" => TreeEntryKind::Commit,
                        _ => return None,
                    };
                    Some(TreeEntry { path: raw.path, kind, size: raw.size, sha: raw.sha })
                })
                .collect();
            Ok(RepoTree { entries, truncated: parsed.truncated })
        })
    }

    fn fetch_file<'a>(
        &'a self,
        repo: &'a RepoRef,
        branch: &'a str,
        entry: &'a TreeEntry,
    ) -> PortFuture<'a, Option<String>> {
        Box::pin(async move {
            let mut tally = FetchTally::default();
            let via_contents = self.via_contents(repo, branch, &entry.path).await;
            if let Some(content) = tally.settle(via_contents) {
                return Ok(Some(content));
            }
            if let Some(content) = tally.settle(self.via_raw(repo, branch, &entry.path).await) {
                return Ok(Some(content));
            }
            if let Some(sha) = &entry.sha {
                if let Some(content) = tally.settle(self.via_blob(repo, sha).await) {
                    return Ok(Some(content));
                }
            }
            debug!(path = %entry.path, "no fetch strategy produced content");
            tally.finish()
        })
    }
}

/// Outcome of the fetch strategies tried so far.
#[derive(Default)]
struct FetchTally {
    not_found: bool,
    last_error: Option<PortError>,
}

impl FetchTally {
    fn settle(&mut self, result: Result<Option<String>, PortError>) -> Option<String> {
        match result {
            Ok(Some(content)) => return Some(content),
            Ok(None) => self.not_found = true,
            Err(e) => self.last_error = Some(e),
        }
        None
    }

    /// A 404 from any strategy means the file is gone; otherwise the last error stands.
    fn finish(self) -> Result<Option<String>, PortError> {
        match self.last_error {
            Some(e) if !self.not_found => Err(e),
            _ => Ok(None),
        }
    }
}

impl PullRequestPublisher for GitHubClient {
    fn commit_file<'a>(
        &'a self,
        repo: &'a RepoRef,
        path: &'a str,
        content: &'a str,
    ) -> PortFuture<'a, PublishOutcome> {
        Box::pin(self.commit_one(repo, path, content))
    }

    fn publish_files<'a>(
        &'a self,
        repo: &'a RepoRef,
        files: &'a [FileRecord],
    ) -> PortFuture<'a, PublishOutcome> {
        Box::pin(self.commit_many(repo, files))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn repo() -> RepoRef {
        RepoRef { owner: "acme".into(), name: "legacy".into() }
    }

    fn client(server: &MockServer, token: Option<&str>) -> GitHubClient {
        let token = token.map(ToString::to_string);
        GitHubClient::new(server.uri(), format!("{}/raw", server.uri()), token)
            .with_backoff_unit(Duration::ZERO)
    }

    fn blob(path: &str, sha: Option<&str>) -> TreeEntry {
        TreeEntry {
            path: path.into(),
            kind: TreeEntryKind::Blob,
            size: 10,
            sha: sha.map(Into::into),
        }
    }

    #[tokio::test]
    async fn tree_lists_entries_and_truncation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/legacy/git/trees/main"))
            .and(query_param("recursive", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tree": [
                    {"path": "app.py", "type": "blob", "size": 12, "sha": "s1"},
                    {"path": "static", "type": "tree", "sha": "s2"}
                ],
                "truncated": true
            })))
            .mount(&server)
            .await;

        let tree = client(&server, None).tree(&repo(), "main").await.unwrap();
        assert!(tree.truncated);
        assert_eq!(tree.entries.len(), 2);
        assert_eq!(tree.entries[0].kind, TreeEntryKind::Blob);
        assert_eq!(tree.entries[1].kind, TreeEntryKind::Tree);
    }

    #[tokio::test]
    async fn fetch_decodes_contents_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/legacy/contents/app.py"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": "cHJpbnQo\nJ2hpJyk=\n", "encoding": "base64"
            })))
            .mount(&server)
            .await;

        let content =
            client(&server, None).fetch_file(&repo(), "main", &blob("app.py", None)).await.unwrap();
        assert_eq!(content.as_deref(), Some("print('hi')"));
    }

    #[tokio::test]
    async fn rate_limited_contents_fall_back_to_raw_host() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/legacy/contents/app.py"))
            .respond_with(ResponseTemplate::new(403))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/raw/acme/legacy/main/app.py"))
            .respond_with(ResponseTemplate::new(200).set_body_string("print(1)"))
            .mount(&server)
            .await;

        let content =
            client(&server, None).fetch_file(&repo(), "main", &blob("app.py", None)).await.unwrap();
        assert_eq!(content.as_deref(), Some("print(1)"));
    }

    #[tokio::test]
    async fn missing_everywhere_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let entry = blob("gone.py", Some("s9"));
        let content = client(&server, None).fetch_file(&repo(), "main", &entry).await.unwrap();
        assert_eq!(content, None);
    }

    #[tokio::test]
    async fn publishing_without_token_is_an_error_outcome() {
        let server = MockServer::start().await;
        let outcome = client(&server, None).commit_file(&repo(), "a.py", "x").await.unwrap();
        assert_eq!(outcome.status, PublishStatus::Error);
        assert!(outcome.message.contains("GITHUB_TOKEN"));
    }

    #[tokio::test]
    async fn commit_file_creates_branch_and_reuses_open_pr() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/legacy"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"default_branch": "main"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/repos/acme/legacy/git/ref/heads/{WORK_BRANCH}")))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/legacy/git/ref/heads/main"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"object": {"sha": "base"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/repos/acme/legacy/git/refs"))
            .and(body_partial_json(json!({"sha": "base"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/legacy/contents/app.py"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "Not Found"})))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/repos/acme/legacy/contents/app.py"))
            .and(body_partial_json(json!({"branch": WORK_BRANCH, "content": "eA=="})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/legacy/pulls"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"html_url": "https://github.com/acme/legacy/pull/7"}])),
            )
            .mount(&server)
            .await;

        let outcome = client(&server, Some("t")).commit_file(&repo(), "app.py", "x").await.unwrap();
        assert_eq!(outcome.status, PublishStatus::Success);
        assert_eq!(outcome.url.as_deref(), Some("https://github.com/acme/legacy/pull/7"));
    }
}
