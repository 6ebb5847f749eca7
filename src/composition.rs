use crate::config::CompositionConfig;
use crate::error::CompositionError;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a composition ended when the tool did run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositionOutcome {
    /// Tool exited on its own with this code
    Finished { code: i32 },
    /// Tool was killed on request
    Cancelled,
}

/// Merges captured shots into HDR and LDR images
#[async_trait]
pub trait Composer: Send + Sync {
    async fn compose(
        &self,
        inputs: &[PathBuf],
        hdr_output: &Path,
        ldr_output: &Path,
        cancel: CancellationToken,
    ) -> Result<CompositionOutcome, CompositionError>;
}

/// Runs an external merge tool taking
/// `--save <hdr> --output <ldr> <inputs...>`, luminance-hdr-cli style.
#[derive(Debug, Clone)]
pub struct CompositionInvoker {
    program: String,
}

impl CompositionInvoker {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn from_config(config: &CompositionConfig) -> Self {
        Self::new(config.program.as_str())
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn build_args(inputs: &[PathBuf], hdr_output: &Path, ldr_output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--save".into(),
            hdr_output.as_os_str().to_owned(),
            "--output".into(),
            ldr_output.as_os_str().to_owned(),
        ];
        args.extend(inputs.iter().map(|p| p.as_os_str().to_owned()));
        args
    }
}

#[async_trait]
impl Composer for CompositionInvoker {
    async fn compose(
        &self,
        inputs: &[PathBuf],
        hdr_output: &Path,
        ldr_output: &Path,
        cancel: CancellationToken,
    ) -> Result<CompositionOutcome, CompositionError> {
        if inputs.is_empty() {
            return Err(CompositionError::NoInputs);
        }

        let args = Self::build_args(inputs, hdr_output, ldr_output);
        info!(
            "Starting HDR composition: {} {}",
            self.program,
            args.iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CompositionError::FailedToStart {
                program: self.program.clone(),
                source,
            })?;

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                warn!("Aborting HDR composition");
                if let Err(e) = child.kill().await {
                    warn!("Could not kill {}: {}", self.program, e);
                }
                return Ok(CompositionOutcome::Cancelled);
            }
            status = child.wait() => status,
        };

        let status = status.map_err(|e| {
            debug!("Waiting for {} failed: {}", self.program, e);
            CompositionError::Crashed {
                program: self.program.clone(),
            }
        })?;

        match status.code() {
            Some(code) => {
                info!("HDR composition ended with code {}", code);
                Ok(CompositionOutcome::Finished { code })
            }
            // Terminated by a signal
            None => Err(CompositionError::Crashed {
                program: self.program.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> Vec<PathBuf> {
        vec![PathBuf::from("/tmp/Image_0.jpg"), PathBuf::from("/tmp/Image_1.jpg")]
    }

    #[test]
    fn test_build_args() {
        let args = CompositionInvoker::build_args(
            &inputs(),
            Path::new("/out/hdr_result.tif"),
            Path::new("/out/ldr_result.tif"),
        );
        let args: Vec<String> = args
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "--save",
                "/out/hdr_result.tif",
                "--output",
                "/out/ldr_result.tif",
                "/tmp/Image_0.jpg",
                "/tmp/Image_1.jpg",
            ]
        );
    }

    #[tokio::test]
    async fn test_no_inputs() {
        let invoker = CompositionInvoker::new("true");
        let result = invoker
            .compose(&[], Path::new("h"), Path::new("l"), CancellationToken::new())
            .await;
        assert!(matches!(result, Err(CompositionError::NoInputs)));
    }

    #[tokio::test]
    async fn test_missing_program_fails_to_start() {
        let invoker = CompositionInvoker::new("/nonexistent/luminance-hdr-cli");
        let result = invoker
            .compose(
                &inputs(),
                Path::new("h"),
                Path::new("l"),
                CancellationToken::new(),
            )
            .await;
        assert!(matches!(result, Err(CompositionError::FailedToStart { .. })));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> String {
            let path = dir.join("compose.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path.to_string_lossy().into_owned()
        }

        async fn run(program: &str, cancel: CancellationToken) -> Result<CompositionOutcome, CompositionError> {
            CompositionInvoker::new(program)
                .compose(&inputs(), Path::new("h"), Path::new("l"), cancel)
                .await
        }

        #[tokio::test]
        async fn test_exit_codes_are_reported() {
            assert_eq!(
                run("true", CancellationToken::new()).await.unwrap(),
                CompositionOutcome::Finished { code: 0 }
            );
            assert_eq!(
                run("false", CancellationToken::new()).await.unwrap(),
                CompositionOutcome::Finished { code: 1 }
            );
        }

        #[tokio::test]
        async fn test_signal_is_a_crash() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), "kill -9 $$");
            let result = run(&program, CancellationToken::new()).await;
            assert!(matches!(result, Err(CompositionError::Crashed { .. })));
        }

        #[tokio::test]
        async fn test_cancel_kills_tool() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), "exec sleep 30");
            let cancel = CancellationToken::new();
            let trigger = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                trigger.cancel();
            });

            let started = std::time::Instant::now();
            assert_eq!(
                run(&program, cancel).await.unwrap(),
                CompositionOutcome::Cancelled
            );
            assert!(started.elapsed() < std::time::Duration::from_secs(10));
        }

        #[tokio::test]
        async fn test_arguments_reach_the_tool() {
            let dir = tempfile::tempdir().unwrap();
            let record = dir.path().join("args.txt");
            let program = script(
                dir.path(),
                &format!("printf '%s\\n' \"$@\" > '{}'", record.display()),
            );

            assert_eq!(
                run(&program, CancellationToken::new()).await.unwrap(),
                CompositionOutcome::Finished { code: 0 }
            );
            let recorded = std::fs::read_to_string(&record).unwrap();
            assert_eq!(
                recorded.lines().collect::<Vec<_>>(),
                vec!["--save", "h", "--output", "l", "/tmp/Image_0.jpg", "/tmp/Image_1.jpg"]
            );
        }
    }
}
