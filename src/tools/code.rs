//! Python tools - run generated code and install packages

use std::path::{Path, PathBuf};
use std::time::Duration;
use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::info;
use uuid::Uuid;
use crate::Result;
use crate::error::Error;
use super::{required_str, Tool};

/// Run `command` (program followed by fixed args) plus `extra` in `cwd`.
async fn run_command(command: &[String], extra: &[String], cwd: &Path, timeout: Duration) -> Result<String> {
    let (program, args) = command.split_first()
        .ok_or_else(|| Error::Config("Empty command".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .args(extra)
        .current_dir(cwd)
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, cmd.output()).await
        .map_err(|_| Error::Tool(format!("Command timed out after {:?}", timeout)))?
        .map_err(|e| Error::Tool(format!("Failed to execute {}: {}", program, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        if stderr.is_empty() {
            Ok(stdout.to_string())
        } else {
            Ok(format!("{}\n\n[stderr]\n{}", stdout, stderr))
        }
    } else {
        Err(Error::Tool(format!(
            "Command failed with exit code {}\nstdout: {}\nstderr: {}",
            output.status.code().unwrap_or(-1),
            stdout,
            stderr
        )))
    }
}

/// Execute Python code in the workspace
pub struct RunCodeTool {
    workspace: PathBuf,
    command: Vec<String>,
    timeout: Duration,
}

impl RunCodeTool {
    pub fn new(workspace: PathBuf, command: Vec<String>, timeout: Duration) -> Self {
        Self { workspace, command, timeout }
    }
}

#[async_trait]
impl Tool for RunCodeTool {
    fn name(&self) -> &str { "run_code" }
    fn description(&self) -> &str {
        "Run Python code in the workspace and return its stdout/stderr. Save plots and outputs to files."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Complete Python source to execute"
                }
            },
            "required": ["code"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let code = required_str(&params, "code")?;

        let scripts = self.workspace.join("scripts");
        tokio::fs::create_dir_all(&scripts).await?;
        let script = scripts.join(format!("run_{}.py", Uuid::new_v4().simple()));
        tokio::fs::write(&script, code).await?;
        info!("Running {}", script.display());

        run_command(
            &self.command,
            &[script.to_string_lossy().into_owned()],
            &self.workspace,
            self.timeout,
        ).await
    }
}

/// Install Python packages into the workspace environment
pub struct AddDependenciesTool {
    workspace: PathBuf,
    command: Vec<String>,
    timeout: Duration,
}

impl AddDependenciesTool {
    pub fn new(workspace: PathBuf, command: Vec<String>, timeout: Duration) -> Self {
        Self { workspace, command, timeout }
    }
}

#[async_trait]
impl Tool for AddDependenciesTool {
    fn name(&self) -> &str { "add_dependencies" }
    fn description(&self) -> &str {
        "Install Python packages (e.g. pandas, networkx) before using them in run_code"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "packages": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "Package names to install"
                }
            },
            "required": ["packages"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let packages: Vec<String> = params.get("packages")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|p| p.as_str()).map(str::to_string).collect())
            .unwrap_or_default();

        if packages.is_empty() {
            return Err(Error::Tool("Missing 'packages' parameter".to_string()));
        }

        info!("Installing {}", packages.join(" "));
        tokio::fs::create_dir_all(&self.workspace).await?;
        let output = run_command(&self.command, &packages, &self.workspace, self.timeout).await?;
        Ok(format!("Installed {}\n{}", packages.join(", "), output))
    }
}
