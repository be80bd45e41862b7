use std::process::Stdio;

use async_trait::async_trait;

use crate::error::ToolError;

/// Abstraction over the signing tool for testability.
///
/// Production code uses [`RealExecutor`], tests use mockall-generated mocks.
#[async_trait]
pub trait SignerExecutor: Send + Sync {
    /// Run the tool with `stdin_data` piped in and `envs` set, returning raw
    /// stdout.
    async fn exec_with_stdin(
        &self,
        args: &[String],
        envs: &[(String, String)],
        stdin_data: &[u8],
    ) -> Result<Vec<u8>, ToolError>;
}

/// Runs a real program, `openssl` by default.
#[derive(Debug, Clone)]
pub struct RealExecutor {
    program: String,
}

impl RealExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for RealExecutor {
    fn default() -> Self {
        Self::new("openssl")
    }
}

#[async_trait]
impl SignerExecutor for RealExecutor {
    async fn exec_with_stdin(
        &self,
        args: &[String],
        envs: &[(String, String)],
        stdin_data: &[u8],
    ) -> Result<Vec<u8>, ToolError> {
        use tokio::io::AsyncWriteExt;

        let mut child = tokio::process::Command::new(&self.program)
            .args(args)
            .envs(envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ToolError::NotFound {
                program: self.program.clone(),
                source: e,
            })?;

        let stdin_err = |e| ToolError::StdinWrite {
            program: self.program.clone(),
            source: e,
        };
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(stdin_data).await.map_err(stdin_err)?;
            stdin.shutdown().await.map_err(stdin_err)?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ToolError::Wait {
                program: self.program.clone(),
                source: e,
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(ToolError::CommandFailed {
                program: self.program.clone(),
                args: args.to_vec(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}
