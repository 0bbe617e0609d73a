//! Invocation boundary: the single request object driving one run.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// One change request, end to end. All four fields are mandatory; a run with
/// any of them missing is rejected before any network traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequest {
    pub access_token: String,
    pub repository_name: String,
    pub repository_branch: String,
    pub user_prompt: String,
}

impl ChangeRequest {
    /// Check that every mandatory field carries a non-blank value.
    pub fn validate(&self) -> Result<(), Error> {
        let fields = [
            ("accessToken", &self.access_token),
            ("repositoryName", &self.repository_name),
            ("repositoryBranch", &self.repository_branch),
            ("userPrompt", &self.user_prompt),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(Error::Input(format!("missing required field: {}", name)));
            }
        }

        Ok(())
    }
}
