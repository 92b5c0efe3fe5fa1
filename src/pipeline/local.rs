//! Local rendering engine: shell out to the Mermaid command-line renderer.
//!
//! ## Command resolution
//!
//! 1. `RenderConfig::local_command` when set
//! 2. `mmdc` found on `PATH`
//! 3. `npx -y @mermaid-js/mermaid-cli` (downloads on first use)
//!
//! ## Limits
//!
//! The child runs under a wall-clock timeout and its stdout/stderr are
//! captured up to `max_output_bytes` each. Exceeding either kills the child
//! and fails the block. Paths are handed over as separate argv elements, so
//! spaces and non-ASCII characters never need shell quoting.

use crate::config::RenderConfig;
use crate::error::BlockError;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

/// Output format requested from the local renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalFormat {
    Svg,
    Png,
}

impl LocalFormat {
    fn as_arg(self) -> &'static str {
        match self {
            LocalFormat::Svg => "svg",
            LocalFormat::Png => "png",
        }
    }
}

/// A resolved renderer invocation: program plus leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl fmt::Display for LocalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for a in &self.args {
            write!(f, " {}", a.to_string_lossy())?;
        }
        Ok(())
    }
}

/// Pick the renderer command for this run.
pub fn resolve_command(config: &RenderConfig) -> LocalCommand {
    if let Some(cmd) = &config.local_command {
        return LocalCommand {
            program: cmd.clone(),
            args: Vec::new(),
        };
    }
    if let Some(mmdc) = find_on_path("mmdc") {
        return LocalCommand {
            program: mmdc,
            args: Vec::new(),
        };
    }
    LocalCommand {
        program: PathBuf::from("npx"),
        args: vec!["-y".into(), "@mermaid-js/mermaid-cli".into()],
    }
}

/// First executable file called `name` in a `PATH` directory.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Render `source` to `output` with the local engine.
pub async fn render_local(
    source: &str,
    output: &Path,
    format: LocalFormat,
    config: &RenderConfig,
    index: usize,
) -> Result<(), BlockError> {
    let failed = |detail: String| BlockError::EngineFailed { index, detail };

    let work = tempfile::tempdir().map_err(|e| failed(format!("temp dir: {e}")))?;
    let input = work.path().join("diagram.mmd");
    tokio::fs::write(&input, source)
        .await
        .map_err(|e| failed(format!("writing diagram source: {e}")))?;

    // A stale file from an earlier run must not pass for fresh output.
    let _ = tokio::fs::remove_file(output).await;

    let cmd = resolve_command(config);
    debug!("Block {index}: running {cmd} ({})", format.as_arg());

    let mut child = tokio::process::Command::new(&cmd.program)
        .args(&cmd.args)
        .arg("-i")
        .arg(&input)
        .arg("-o")
        .arg(output)
        .arg("-e")
        .arg(format.as_arg())
        .arg("-s")
        .arg(config.scale.to_string())
        .arg("-b")
        .arg(&config.background)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BlockError::EngineUnavailable {
            index,
            detail: format!("{cmd}: {e}"),
        })?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let limit = config.max_output_bytes;
    let secs = config.render_timeout_secs;

    let outcome = tokio::time::timeout(Duration::from_secs(secs), async {
        tokio::try_join!(
            read_capped(stdout, limit, index),
            read_capped(stderr, limit, index),
            async {
                child
                    .wait()
                    .await
                    .map_err(|e| failed(format!("waiting for renderer: {e}")))
            },
        )
    })
    .await;

    let (_, stderr, status): (Vec<u8>, Vec<u8>, ExitStatus) = match outcome {
        Err(_) => {
            let _ = child.kill().await;
            return Err(BlockError::EngineTimeout { index, secs });
        }
        Ok(Err(e)) => {
            let _ = child.kill().await;
            return Err(e);
        }
        Ok(Ok(done)) => done,
    };

    if !status.success() {
        return Err(failed(format!("{status}: {}", stderr_tail(&stderr))));
    }

    match tokio::fs::metadata(output).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(failed(format!(
            "renderer exited cleanly but wrote no output to {}",
            output.display()
        ))),
    }
}

async fn read_capped<R: AsyncRead + Unpin>(
    pipe: Option<R>,
    limit: usize,
    index: usize,
) -> Result<Vec<u8>, BlockError> {
    let Some(mut pipe) = pipe else {
        return Ok(Vec::new());
    };
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let n = pipe
            .read(&mut chunk)
            .await
            .map_err(|e| BlockError::EngineFailed {
                index,
                detail: format!("reading renderer output: {e}"),
            })?;
        if n == 0 {
            return Ok(buf);
        }
        if buf.len() + n > limit {
            return Err(BlockError::OutputTooLarge { index, limit });
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Last non-empty stderr line, which is where mmdc puts the parse error.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("no diagnostic output")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_command_wins() {
        let config = RenderConfig::builder()
            .local_command("/opt/tools/my mmdc")
            .build()
            .unwrap();
        let cmd = resolve_command(&config);
        assert_eq!(cmd.program, PathBuf::from("/opt/tools/my mmdc"));
        assert!(cmd.args.is_empty());
    }

    #[test]
    fn npx_fallback_display() {
        let cmd = LocalCommand {
            program: PathBuf::from("npx"),
            args: vec!["-y".into(), "@mermaid-js/mermaid-cli".into()],
        };
        assert_eq!(cmd.to_string(), "npx -y @mermaid-js/mermaid-cli");
    }

    #[test]
    fn stderr_tail_picks_last_line() {
        assert_eq!(stderr_tail(b"warn\nParse error on line 2\n\n"), "Parse error on line 2");
        assert_eq!(stderr_tail(b""), "no diagnostic output");
    }

    #[tokio::test]
    async fn capped_reader_rejects_overflow() {
        let data: &[u8] = &[0u8; 100];
        let err = read_capped(Some(data), 10, 3).await.unwrap_err();
        assert_eq!(err, BlockError::OutputTooLarge { index: 3, limit: 10 });
        let ok = read_capped(Some(data), 100, 3).await.unwrap();
        assert_eq!(ok.len(), 100);
    }

    #[tokio::test]
    async fn missing_program_is_engine_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = RenderConfig::builder()
            .local_command(dir.path().join("no-such-renderer"))
            .build()
            .unwrap();
        let err = render_local("graph TD\nA-->B", &dir.path().join("o.svg"), LocalFormat::Svg, &config, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, BlockError::EngineUnavailable { index: 0, .. }));
    }
}
