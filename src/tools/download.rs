//! Download tool - save remote files into the workspace

use std::path::{Path, PathBuf};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;
use crate::Result;
use crate::error::Error;
use super::{required_str, Tool};

const FALLBACK_FILENAME: &str = "download.bin";

/// Download a file into `<workspace>/downloads`
pub struct DownloadFileTool {
    client: Client,
    workspace: PathBuf,
}

impl DownloadFileTool {
    pub fn new(client: Client, workspace: PathBuf) -> Self {
        Self { client, workspace }
    }

    fn downloads_dir(&self) -> PathBuf {
        self.workspace.join("downloads")
    }
}

/// Pick a safe file name: the requested one, else the last URL path segment.
/// Directory components are stripped so files stay inside the downloads dir.
fn file_name_for(url: &str, requested: Option<&str>) -> String {
    let from_url = || {
        Url::parse(url).ok().and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
                .filter(|s| !s.is_empty())
        })
    };

    requested
        .map(str::to_string)
        .or_else(from_url)
        .and_then(|name| Path::new(&name).file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| FALLBACK_FILENAME.to_string())
}

#[async_trait]
impl Tool for DownloadFileTool {
    fn name(&self) -> &str { "download_file" }
    fn description(&self) -> &str {
        "Download a file from a URL into the workspace downloads folder and return its local path"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Direct URL of the file"
                },
                "filename": {
                    "type": "string",
                    "description": "Name to save as (optional, defaults to the URL's file name)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let url = required_str(&params, "url")?;
        let filename = file_name_for(url, params.get("filename").and_then(|v| v.as_str()));

        let response = self.client.get(url).send().await
            .map_err(|e| Error::Tool(format!("Failed to download {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("HTTP error: {}", status)));
        }

        let bytes = response.bytes().await
            .map_err(|e| Error::Tool(format!("Failed to read {}: {}", url, e)))?;

        let dir = self.downloads_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(&filename);
        tokio::fs::write(&path, &bytes).await?;

        Ok(format!("Saved {} bytes to {}", bytes.len(), path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_for() {
        assert_eq!(file_name_for("http://quiz.test/files/data.csv?x=1", None), "data.csv");
        assert_eq!(file_name_for("http://quiz.test/", None), FALLBACK_FILENAME);
        assert_eq!(file_name_for("not a url", None), FALLBACK_FILENAME);
        assert_eq!(file_name_for("http://quiz.test/a.csv", Some("../../etc/passwd")), "passwd");
        assert_eq!(file_name_for("http://quiz.test/a.csv", Some("b.csv")), "b.csv");
    }

    #[tokio::test]
    async fn test_download_writes_into_workspace() {
        let mut server = mockito::Server::new_async().await;
        server.mock("GET", "/files/data.csv")
            .with_status(200)
            .with_body("a,b\n1,2\n")
            .create_async()
            .await;
        let workspace = tempfile::tempdir().unwrap();

        let tool = DownloadFileTool::new(Client::new(), workspace.path().to_path_buf());
        let result = tool.execute(json!({"url": format!("{}/files/data.csv", server.url())})).await.unwrap();

        let saved = workspace.path().join("downloads").join("data.csv");
        assert!(result.contains("Saved 8 bytes"));
        assert_eq!(std::fs::read_to_string(saved).unwrap(), "a,b\n1,2\n");
    }
}
