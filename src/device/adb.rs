use super::{CommandOutput, LineStream, RemoteChannel};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tracing::debug;

/// `RemoteChannel` backed by the `adb` executable.
#[derive(Debug, Clone)]
pub struct AdbChannel {
    program: String,
    serial: Option<String>,
}

impl AdbChannel {
    pub fn new(serial: Option<&str>) -> Self {
        Self {
            program: "adb".to_string(),
            serial: serial
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        if let Some(serial) = &self.serial {
            cmd.arg("-s").arg(serial);
        }
        cmd.args(args);
        cmd
    }

    fn describe(&self, args: &[String]) -> String {
        let mut parts = vec![self.program.clone()];
        if let Some(serial) = &self.serial {
            parts.push("-s".to_string());
            parts.push(serial.clone());
        }
        parts.extend(args.iter().cloned());
        parts.join(" ")
    }
}

#[async_trait]
impl RemoteChannel for AdbChannel {
    async fn execute(&self, args: &[String]) -> SyncResult<CommandOutput> {
        let description = self.describe(args);
        debug!("exec: {}", description);
        let output = self
            .command(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(SyncError::remote_failed(
                description,
                output.status.to_string(),
                &stderr,
            ));
        }
        Ok(CommandOutput { stdout, stderr })
    }

    async fn push(&self, local: &Path, remote: &str) -> SyncResult<()> {
        let args = vec![
            "push".to_string(),
            local.to_string_lossy().to_string(),
            remote.to_string(),
        ];
        self.execute(&args).await.map(|_| ())
    }

    async fn start_stream(&self, args: &[String]) -> SyncResult<Box<dyn LineStream>> {
        debug!("stream: {}", self.describe(args));
        let mut child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            SyncError::remote_failed(self.describe(args), "spawn", "stdout was not captured")
        })?;

        Ok(Box::new(ProcessLineStream {
            child,
            lines: BufReader::new(stdout).lines(),
        }))
    }
}

struct ProcessLineStream {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
}

#[async_trait]
impl LineStream for ProcessLineStream {
    async fn next_line(&mut self) -> SyncResult<Option<String>> {
        Ok(self.lines.next_line().await?)
    }

    async fn terminate(&mut self) -> SyncResult<()> {
        // start_kill fails only if the child already exited; wait still reaps it
        let _ = self.child.start_kill();
        self.child.wait().await?;
        Ok(())
    }

    fn kill(&mut self) {
        let _ = self.child.start_kill();
    }
}
