//! The two fixed prompt templates driving file selection and content
//! generation.

use serde::Serialize;

use crate::stage::FileSnapshot;

/// Stage-one prompt: pick the files that matter for the request.
///
/// Selection is deliberately greedy — a file omitted here can never be fixed
/// in stage two, while a false positive only costs prompt space.
pub fn selection_prompt(user_prompt: &str, inventory: &[String]) -> String {
    let file_list = to_pretty_json(&inventory);

    format!(
        "You are a highly skilled coding assistant. Analyze the user's request and the \
repository's file list, then decide which files must be reviewed or modified to implement \
the change.\n\
\n\
### User's request\n\
{user_prompt}\n\
\n\
### Repository files\n\
```json\n\
{file_list}\n\
```\n\
\n\
### Instructions\n\
1. Identify every file that is relevant to the request, whether for context or for \
modification.\n\
2. Be greedy: include files whose relevance is only plausible. Omitting a needed file is \
much worse than including an unneeded one.\n\
3. Judge relevance from paths and application structure only; do not assume file contents.\n\
4. Echo paths exactly as they appear in the list above.\n\
\n\
### Response format\n\
Respond with only a JSON array of file paths wrapped in a fenced code block, for example:\n\
```json\n\
[\n\
  \"cmd/main.go\",\n\
  \"internal/models/customer.go\"\n\
]\n\
```\n\
Do not include any other text."
    )
}

#[derive(Serialize)]
struct SnapshotView<'a> {
    #[serde(rename = "filePath")]
    file_path: &'a str,
    content: &'a str,
}

/// Stage-two prompt: produce the new contents of every file that changes.
pub fn generation_prompt(
    user_prompt: &str,
    inventory: &[String],
    snapshots: &[FileSnapshot],
) -> String {
    let file_list = to_pretty_json(&inventory);
    let views: Vec<SnapshotView<'_>> = snapshots
        .iter()
        .map(|s| SnapshotView {
            file_path: &s.path,
            content: &s.content,
        })
        .collect();
    let file_contents = to_pretty_json(&views);

    format!(
        "You are a highly skilled coding assistant. Modify or create files so that the \
user's request is satisfied.\n\
\n\
### User's request\n\
{user_prompt}\n\
\n\
### Repository files\n\
```json\n\
{file_list}\n\
```\n\
\n\
### Contents of the relevant files\n\
```json\n\
{file_contents}\n\
```\n\
\n\
### Instructions\n\
1. Return the complete new content for every file you modify or create; partial diffs are \
not accepted.\n\
2. Set \"isNewFile\" to true only for files that do not exist yet.\n\
3. Only include files that actually change; leave untouched files out of the response.\n\
4. For modified files, \"filePath\" must match the path given above exactly.\n\
5. Follow the conventions and best practices of each file's language.\n\
\n\
### Response format\n\
Respond with only a JSON array wrapped in a fenced code block, for example:\n\
```json\n\
[\n\
  {{\n\
    \"filePath\": \"cmd/main.go\",\n\
    \"content\": \"package main\\n\",\n\
    \"isNewFile\": false\n\
  }}\n\
]\n\
```\n\
Do not include any other text."
    )
}

fn to_pretty_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
}
