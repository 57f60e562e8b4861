//! Digest conversion
//!
//! Turns a raw flow log digest into the stored graph. The conversion itself
//! is pluggable: by default the digest is stored as is, or an external
//! command can be configured that reads the digest on stdin and writes the
//! graph to stdout.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

#[async_trait]
pub trait Converter: Send + Sync {
    async fn convert(&self, digest: Bytes) -> Result<Bytes>;
}

/// Stores the digest unchanged
pub struct PassthroughConverter;

#[async_trait]
impl Converter for PassthroughConverter {
    async fn convert(&self, digest: Bytes) -> Result<Bytes> {
        Ok(digest)
    }
}

/// Runs an external program per conversion
///
/// The digest is written to the program's stdin and the graph is read from
/// its stdout. A non-zero exit fails the conversion with the program's
/// stderr as the reason.
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    /// `command` is the program followed by its arguments
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .context("converter command cannot be empty")?;

        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl Converter for CommandConverter {
    async fn convert(&self, digest: Bytes) -> Result<Bytes> {
        debug!("Running converter {} on {} bytes", self.program, digest.len());

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start converter '{}'", self.program))?;

        let mut stdin = child
            .stdin
            .take()
            .context("converter stdin is not available")?;

        // stdin is fed while output is drained, large digests would fill the pipes otherwise
        let feed = async move {
            stdin.write_all(&digest).await?;
            stdin.shutdown().await
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.context("converter did not run to completion")?;
        if !output.status.success() {
            anyhow::bail!(
                "converter exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        fed.context("Failed to write digest to converter")?;

        Ok(Bytes::from(output.stdout))
    }
}
