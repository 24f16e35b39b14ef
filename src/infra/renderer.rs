//! External-process renderer.

use std::{
    io::ErrorKind,
    path::PathBuf,
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::process::Command;
use tracing::{info, warn};

use crate::application::render::{RenderError, RenderRequest, Renderer};
use crate::config::RenderSettings;

const SOURCE: &str = "infra::renderer";

/// Runs `<program> [args...] --site-title <brand> --title <title> --description <description>`
/// and reads the encoded image from stdout.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_settings(settings: &RenderSettings) -> Self {
        Self::new(
            settings.program.clone(),
            settings.args.clone(),
            settings.timeout,
        )
    }

    fn command(&self, request: &RenderRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg("--site-title")
            .arg(&request.site_title)
            .arg("--title")
            .arg(&request.title)
            .arg("--description")
            .arg(&request.description)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<Bytes, RenderError> {
        let started_at = Instant::now();

        let child = self.command(request).spawn().map_err(|err| {
            warn!(
                target = SOURCE,
                op = "renderer::render",
                result = "error",
                error_code = "spawn",
                program = %self.program.display(),
                error = %err,
                "Failed to spawn renderer"
            );
            if err.kind() == ErrorKind::NotFound {
                RenderError::Unavailable(format!("`{}` not found", self.program.display()))
            } else {
                RenderError::Unavailable(err.to_string())
            }
        })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(
                    target = SOURCE,
                    op = "renderer::render",
                    result = "error",
                    error_code = "wait",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "Failed to collect renderer output"
                );
                return Err(RenderError::Unavailable(err.to_string()));
            }
            Err(_) => {
                warn!(
                    target = SOURCE,
                    op = "renderer::render",
                    result = "error",
                    error_code = "timeout",
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Renderer exceeded its time limit"
                );
                return Err(RenderError::TimedOut(self.timeout));
            }
        };

        if !output.status.success() {
            let exit_code = output.status.code();
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(
                target = SOURCE,
                op = "renderer::render",
                result = "error",
                error_code = "exit_status",
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                stderr = %stderr,
                "Renderer exited unsuccessfully"
            );
            return Err(RenderError::Failed { exit_code, stderr });
        }

        if output.stdout.is_empty() {
            return Err(RenderError::EmptyOutput);
        }

        info!(
            target = SOURCE,
            op = "renderer::render",
            result = "ok",
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            image_bytes = output.stdout.len(),
            "Renderer produced image"
        );

        Ok(Bytes::from(output.stdout))
    }
}
