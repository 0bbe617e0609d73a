//! End-to-end orchestration of one change request.
//!
//! One invocation handles exactly one request, synchronously: snapshot →
//! selection → generation → patch → publish → record. Each stage fails fast
//! and aborts the run; only the conversation record is allowed to fail
//! without failing the run.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::error::Error;
use crate::gateway::ModelGateway;
use crate::github::GitHost;
use crate::patch::apply_changes;
use crate::publish::publish;
use crate::recorder::record_outcome;
use crate::request::ChangeRequest;
use crate::snapshot::Snapshot;
use crate::stage::{generate_changes, select_files};
use crate::store::RecordStore;

/// What a completed run reports back.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub pull_request_url: String,
    pub branch: String,
    pub commit_sha: String,
    pub changed_files: usize,
}

/// The pipeline with its three external collaborators injected.
pub struct Pipeline<G, H, S> {
    gateway: G,
    host: H,
    store: S,
    work_dir: PathBuf,
}

impl<G: ModelGateway, H: GitHost, S: RecordStore> Pipeline<G, H, S> {
    pub fn new(gateway: G, host: H, store: S, work_dir: PathBuf) -> Self {
        Self {
            gateway,
            host,
            store,
            work_dir,
        }
    }

    /// Run the whole pipeline for one request.
    pub async fn run(&self, request: &ChangeRequest) -> Result<RunOutcome, Error> {
        // Reject incomplete requests before any I/O happens.
        request.validate()?;
        let started_at = Utc::now();

        info!(
            "handling change request for {}@{}",
            request.repository_name, request.repository_branch
        );

        // The token must resolve to a user; the user is the repository owner.
        let account = self
            .host
            .authenticated_user()
            .await
            .map_err(|e| Error::Auth(format!("{:#}", e)))?;
        let owner = account.login;

        // Snapshot: fetch and extract the branch tip into a private workdir.
        let tarball = self
            .host
            .fetch_tarball(&owner, &request.repository_name, &request.repository_branch)
            .await
            .map_err(Error::Snapshot)?;
        let work_dir = self.work_dir.join(&request.repository_name);
        let snapshot = Snapshot::from_tarball(&work_dir, &tarball).map_err(Error::Snapshot)?;

        // Stage one and two, then write the results into the checkout.
        let selected = select_files(&self.gateway, &request.user_prompt, &snapshot).await?;
        let changes =
            generate_changes(&self.gateway, &request.user_prompt, &snapshot, &selected).await?;
        apply_changes(&changes).await?;

        // Publish the checkout as a new branch and pull request.
        let outcome = publish(
            &self.host,
            &owner,
            &request.repository_name,
            &request.repository_branch,
            &request.user_prompt,
            &changes,
            started_at,
        )
        .await?;

        // The PR is the deliverable; a failed record append is only logged.
        if let Err(err) = record_outcome(
            &self.store,
            &owner,
            &request.repository_name,
            &request.user_prompt,
            &outcome.pull_request.html_url,
            Utc::now(),
        )
        .await
        {
            warn!("failed to append conversation entry: {}", err);
        }

        info!("pull request ready: {}", outcome.pull_request.html_url);

        Ok(RunOutcome {
            pull_request_url: outcome.pull_request.html_url,
            branch: outcome.branch,
            commit_sha: outcome.commit_sha,
            changed_files: changes.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::github::{Account, GitRef, PullRequest, TreeEntry};
    use crate::snapshot::tests::fake_tarball;
    use crate::store::RepositoryRecord;
    use anyhow::Result;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    // ------------------------------------------------------------------
    // Mock collaborators
    // ------------------------------------------------------------------

    /// Gateway that replays a fixed list of responses.
    pub(crate) struct ScriptedGateway {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedGateway {
        pub(crate) fn new(responses: Vec<String>) -> Self {
            let mut reversed = responses;
            reversed.reverse();
            Self {
                responses: Mutex::new(reversed),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ModelGateway for ScriptedGateway {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("no scripted response left"))
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Step {
        AuthenticatedUser,
        FetchTarball,
        GetRef,
        CreateRef,
        UpdateRef,
        DeleteRef,
        CreateBlob,
        CreateTree,
        CreateCommit,
        CreatePull,
    }

    /// In-memory hosting platform that records every call.
    pub(crate) struct MockHost {
        calls: Mutex<Vec<Step>>,
        refs: Mutex<HashMap<String, String>>,
        blobs: Mutex<Vec<String>>,
        tree_entries: Mutex<usize>,
        tarball: Mutex<Vec<u8>>,
        fail_at: Mutex<Option<Step>>,
        next_sha: AtomicUsize,
    }

    impl MockHost {
        pub(crate) fn new() -> Self {
            let mut refs = HashMap::new();
            refs.insert("main".to_string(), "base0000".to_string());
            Self {
                calls: Mutex::new(Vec::new()),
                refs: Mutex::new(refs),
                blobs: Mutex::new(Vec::new()),
                tree_entries: Mutex::new(0),
                tarball: Mutex::new(fake_tarball(&[("README.md", "# demo\n")])),
                fail_at: Mutex::new(None),
                next_sha: AtomicUsize::new(1),
            }
        }

        pub(crate) fn with_tarball(files: &[(&str, &str)]) -> Self {
            let host = Self::new();
            *host.tarball.lock().unwrap() = fake_tarball(files);
            host
        }

        pub(crate) fn fail_at(&self, step: Step) {
            *self.fail_at.lock().unwrap() = Some(step);
        }

        pub(crate) fn count(&self, step: Step) -> usize {
            self.calls.lock().unwrap().iter().filter(|s| **s == step).count()
        }

        pub(crate) fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub(crate) fn ref_target(&self, branch: &str) -> Option<String> {
            self.refs.lock().unwrap().get(branch).cloned()
        }

        pub(crate) fn last_blob(&self) -> Option<String> {
            self.blobs.lock().unwrap().last().cloned()
        }

        pub(crate) fn tree_entries(&self) -> usize {
            *self.tree_entries.lock().unwrap()
        }

        fn enter(&self, step: Step) -> Result<()> {
            self.calls.lock().unwrap().push(step);
            if *self.fail_at.lock().unwrap() == Some(step) {
                anyhow::bail!("injected failure at {:?}", step);
            }
            Ok(())
        }

        fn sha(&self, prefix: &str) -> String {
            format!("{}{:04}", prefix, self.next_sha.fetch_add(1, Ordering::SeqCst))
        }
    }

    impl GitHost for MockHost {
        async fn authenticated_user(&self) -> Result<Account> {
            self.enter(Step::AuthenticatedUser)?;
            Ok(Account {
                login: "octocat".to_string(),
            })
        }

        async fn fetch_tarball(&self, _owner: &str, _repo: &str, _branch: &str) -> Result<Vec<u8>> {
            self.enter(Step::FetchTarball)?;
            Ok(self.tarball.lock().unwrap().clone())
        }

        async fn get_ref(&self, _owner: &str, _repo: &str, branch: &str) -> Result<GitRef> {
            self.enter(Step::GetRef)?;
            let sha = self
                .refs
                .lock()
                .unwrap()
                .get(branch)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("unknown ref {}", branch))?;
            Ok(GitRef {
                name: format!("refs/heads/{}", branch),
                object: crate::github::GitObject {
                    sha,
                    kind: "commit".to_string(),
                },
            })
        }

        async fn create_ref(&self, _o: &str, _r: &str, branch: &str, sha: &str) -> Result<()> {
            self.enter(Step::CreateRef)?;
            let mut refs = self.refs.lock().unwrap();
            if refs.contains_key(branch) {
                anyhow::bail!("ref {} already exists", branch);
            }
            refs.insert(branch.to_string(), sha.to_string());
            Ok(())
        }

        async fn update_ref(&self, _o: &str, _r: &str, branch: &str, sha: &str) -> Result<()> {
            self.enter(Step::UpdateRef)?;
            let mut refs = self.refs.lock().unwrap();
            if !refs.contains_key(branch) {
                anyhow::bail!("ref {} does not exist", branch);
            }
            refs.insert(branch.to_string(), sha.to_string());
            Ok(())
        }

        async fn delete_ref(&self, _o: &str, _r: &str, branch: &str) -> Result<()> {
            self.enter(Step::DeleteRef)?;
            self.refs.lock().unwrap().remove(branch);
            Ok(())
        }

        async fn create_blob(&self, _o: &str, _r: &str, content: &str) -> Result<String> {
            self.enter(Step::CreateBlob)?;
            self.blobs.lock().unwrap().push(content.to_string());
            Ok(self.sha("blob"))
        }

        async fn create_tree(
            &self,
            _o: &str,
            _r: &str,
            _base_tree: &str,
            entries: Vec<TreeEntry>,
        ) -> Result<String> {
            self.enter(Step::CreateTree)?;
            *self.tree_entries.lock().unwrap() = entries.len();
            Ok(self.sha("tree"))
        }

        async fn create_commit(
            &self,
            _o: &str,
            _r: &str,
            _message: &str,
            _tree: &str,
            parents: Vec<String>,
        ) -> Result<String> {
            self.enter(Step::CreateCommit)?;
            if parents.len() != 1 {
                anyhow::bail!("expected a single parent, got {}", parents.len());
            }
            Ok(self.sha("commit"))
        }

        async fn create_pull_request(
            &self,
            owner: &str,
            repo: &str,
            _title: &str,
            _body: &str,
            _head: &str,
            _base: &str,
        ) -> Result<PullRequest> {
            self.enter(Step::CreatePull)?;
            Ok(PullRequest {
                number: 1,
                html_url: format!("https://github.com/{}/{}/pull/1", owner, repo),
            })
        }
    }

    /// In-memory record store with a call counter.
    pub(crate) struct MemoryStore {
        records: Mutex<HashMap<(String, String), RepositoryRecord>>,
        calls: AtomicUsize,
    }

    impl MemoryStore {
        pub(crate) fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn record(&self, owner: &str, name: &str) -> Option<RepositoryRecord> {
            self.records
                .lock()
                .unwrap()
                .get(&(owner.to_string(), name.to_string()))
                .cloned()
        }
    }

    impl RecordStore for MemoryStore {
        async fn get_repository(
            &self,
            owner_id: &str,
            name: &str,
        ) -> Result<Option<RepositoryRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.record(owner_id, name))
        }

        async fn put_repository(
            &self,
            record: &RepositoryRecord,
            expected_version: u64,
        ) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut records = self.records.lock().unwrap();
            let key = (record.owner_id.clone(), record.name.clone());
            let current = records.get(&key).map(|r| r.version).unwrap_or(0);
            if current != expected_version {
                anyhow::bail!("version conflict");
            }
            let mut stored = record.clone();
            stored.version = expected_version + 1;
            records.insert(key, stored);
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Pipeline tests
    // ------------------------------------------------------------------

    fn request() -> ChangeRequest {
        ChangeRequest {
            access_token: "token".to_string(),
            repository_name: "demo".to_string(),
            repository_branch: "main".to_string(),
            user_prompt: "add a health endpoint".to_string(),
        }
    }

    fn selection_response(paths: &[&str]) -> String {
        format!("```json\n{}\n```", serde_json::to_string(paths).unwrap())
    }

    fn generation_response(changes: &[(&str, &str, bool)]) -> String {
        let entries: Vec<serde_json::Value> = changes
            .iter()
            .map(|(path, content, is_new)| {
                serde_json::json!({"filePath": path, "content": content, "isNewFile": is_new})
            })
            .collect();
        format!(
            "```json\n{}\n```",
            serde_json::to_string(&entries).unwrap()
        )
    }

    #[tokio::test]
    async fn test_end_to_end_scenario() {
        let tmp = TempDir::new().unwrap();
        let host = MockHost::with_tarball(&[
            ("src/server.ts", "export const app = 1;\n"),
            ("README.md", "# demo\n"),
        ]);
        let gateway = ScriptedGateway::new(vec![
            selection_response(&["src/server.ts"]),
            generation_response(&[("src/server.ts", "export const app = 2;\n", false)]),
        ]);
        let store = MemoryStore::new();

        let pipeline = Pipeline::new(gateway, host, store, tmp.path().to_path_buf());
        let outcome = pipeline.run(&request()).await.unwrap();

        // Both stages ran exactly once.
        assert_eq!(pipeline.gateway.calls(), 2);

        // One blob, one tree entry, one commit, one ref update, one PR.
        assert_eq!(pipeline.host.count(Step::CreateBlob), 1);
        assert_eq!(pipeline.host.tree_entries(), 1);
        assert_eq!(pipeline.host.count(Step::CreateCommit), 1);
        assert_eq!(pipeline.host.count(Step::UpdateRef), 1);
        assert_eq!(pipeline.host.count(Step::CreatePull), 1);
        assert_eq!(
            pipeline.host.ref_target(&outcome.branch).unwrap(),
            outcome.commit_sha
        );

        // The generated content landed in the working copy verbatim.
        let written = std::fs::read_to_string(
            tmp.path().join("demo").join("source").join("src/server.ts"),
        )
        .unwrap();
        assert_eq!(written, "export const app = 2;\n");

        // The conversation log holds one entry with the PR URL.
        let record = pipeline.store.record("octocat", "demo").unwrap();
        assert_eq!(record.chat_log.len(), 1);
        assert!(record.chat_log[0].message.contains(&outcome.pull_request_url));

        assert_eq!(outcome.changed_files, 1);
        assert_eq!(
            outcome.pull_request_url,
            "https://github.com/octocat/demo/pull/1"
        );
    }

    #[tokio::test]
    async fn test_missing_field_makes_no_calls() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            ScriptedGateway::new(vec![]),
            MockHost::new(),
            MemoryStore::new(),
            tmp.path().to_path_buf(),
        );

        let mut req = request();
        req.user_prompt = String::new();
        let err = pipeline.run(&req).await.unwrap_err();

        assert!(matches!(err, Error::Input(_)));
        assert_eq!(pipeline.gateway.calls(), 0);
        assert_eq!(pipeline.host.total_calls(), 0);
        assert_eq!(pipeline.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_auth_failure_stops_before_snapshot() {
        let tmp = TempDir::new().unwrap();
        let host = MockHost::new();
        host.fail_at(Step::AuthenticatedUser);
        let pipeline = Pipeline::new(
            ScriptedGateway::new(vec![]),
            host,
            MemoryStore::new(),
            tmp.path().to_path_buf(),
        );

        let err = pipeline.run(&request()).await.unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(pipeline.host.count(Step::FetchTarball), 0);
        assert_eq!(pipeline.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_failure_aborts_before_model_call() {
        let tmp = TempDir::new().unwrap();
        let host = MockHost::new();
        host.fail_at(Step::FetchTarball);
        let pipeline = Pipeline::new(
            ScriptedGateway::new(vec![]),
            host,
            MemoryStore::new(),
            tmp.path().to_path_buf(),
        );

        let err = pipeline.run(&request()).await.unwrap_err();

        assert!(matches!(err, Error::Snapshot(_)));
        assert_eq!(pipeline.gateway.calls(), 0);
    }

    #[tokio::test]
    async fn test_undecodable_selection_stops_before_publish() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(
            ScriptedGateway::new(vec!["no JSON here, sorry".to_string()]),
            MockHost::new(),
            MemoryStore::new(),
            tmp.path().to_path_buf(),
        );

        let err = pipeline.run(&request()).await.unwrap_err();

        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(pipeline.host.count(Step::CreateBlob), 0);
        assert_eq!(pipeline.host.count(Step::CreatePull), 0);
        assert_eq!(pipeline.store.calls(), 0);
    }

    #[tokio::test]
    async fn test_record_failure_does_not_fail_the_run() {
        struct FailingStore;
        impl RecordStore for FailingStore {
            async fn get_repository(
                &self,
                _owner_id: &str,
                _name: &str,
            ) -> Result<Option<RepositoryRecord>> {
                anyhow::bail!("store is down")
            }
            async fn put_repository(
                &self,
                _record: &RepositoryRecord,
                _expected_version: u64,
            ) -> Result<()> {
                anyhow::bail!("store is down")
            }
        }

        let tmp = TempDir::new().unwrap();
        let host = MockHost::with_tarball(&[("README.md", "# demo\n")]);
        let gateway = ScriptedGateway::new(vec![
            selection_response(&["README.md"]),
            generation_response(&[("README.md", "# demo\n\nupdated\n", false)]),
        ]);

        let pipeline = Pipeline::new(gateway, host, FailingStore, tmp.path().to_path_buf());
        let outcome = pipeline.run(&request()).await.unwrap();

        assert_eq!(pipeline.host.count(Step::CreatePull), 1);
        assert!(!outcome.pull_request_url.is_empty());
    }
}
