use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

use super::FFmpegInput;
use crate::error::{BrokerError, Result};

/// A transcoding engine invocation.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

/// What the engine printed, truncated to the capture window.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl EngineCommand {
    /// Create a new engine command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Suppress the engine's startup banner
    pub fn hide_banner(self) -> Self {
        self.arg("-hide_banner")
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Limit the number of video frames written
    pub fn video_frames(self, frames: u32) -> Self {
        self.arg("-vframes").arg(frames.to_string())
    }

    /// Force the output container format
    pub fn format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-f").arg(format)
    }

    /// Run the command to completion.
    ///
    /// Nothing is written to the engine's stdin. Only the first `log_window`
    /// bytes of each output stream are kept; the rest is drained and dropped.
    /// The child is killed if the returned future is dropped early.
    pub async fn execute(&self, log_window: usize) -> Result<EngineOutput> {
        debug!("Executing engine command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut child = Command::new(&self.binary_path)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrokerError::Engine(format!("Failed to execute engine: {}", e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, stdout, stderr) = tokio::join!(
            child.wait(),
            capture_window(stdout, log_window),
            capture_window(stderr, log_window),
        );
        let output = EngineOutput { stdout, stderr };

        let status = status
            .map_err(|e| BrokerError::Engine(format!("Failed to wait for engine: {}", e)))?;

        if !output.stderr.is_empty() {
            debug!(
                "{} diagnostics:\n{}",
                self.description,
                String::from_utf8_lossy(&output.stderr)
            );
        }

        if !status.success() {
            warn!(
                "{} failed ({}): {}",
                self.description,
                status,
                String::from_utf8_lossy(&output.stderr).lines().last().unwrap_or_default()
            );
            return Err(BrokerError::Engine(format!(
                "{} exited abnormally: {}",
                self.description, status
            )));
        }

        Ok(output)
    }
}

async fn capture_window<R: AsyncRead + Unpin>(reader: Option<R>, limit: usize) -> Vec<u8> {
    let mut window = Vec::new();
    let Some(mut reader) = reader else {
        return window;
    };

    if let Err(e) = (&mut reader).take(limit as u64).read_to_end(&mut window).await {
        debug!("Engine output stream closed early: {}", e);
        return window;
    }
    // Keep draining so the engine never blocks on a full pipe.
    let _ = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await;
    window
}

/// Builder for the engine invocations the broker needs
#[derive(Debug, Clone)]
pub struct EngineCommandBuilder {
    binary_path: String,
}

impl EngineCommandBuilder {
    /// Create a new command builder
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// Grab a single JPEG frame from the described input
    pub fn snapshot<P: AsRef<Path>>(&self, input: &FFmpegInput, output_path: P) -> EngineCommand {
        EngineCommand::new(&self.binary_path, "Snapshot")
            .hide_banner()
            .args(input.input_arguments.iter().cloned())
            .overwrite()
            .video_frames(1)
            .format("image2")
            .output(output_path)
    }

    /// Print the engine's version banner
    pub fn version_check(&self) -> EngineCommand {
        EngineCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_arguments() {
        let builder = EngineCommandBuilder::new("ffmpeg");
        let input = FFmpegInput::from_url("rtsp://camera/stream");
        let command = builder.snapshot(&input, "/tmp/out.jpg");

        assert_eq!(command.binary_path, "ffmpeg");
        assert_eq!(
            command.args,
            vec![
                "-hide_banner", "-i", "rtsp://camera/stream", "-y", "-vframes", "1", "-f",
                "image2", "/tmp/out.jpg",
            ]
        );
    }

    #[test]
    fn test_version_check_arguments() {
        let command = EngineCommandBuilder::new("/opt/ffmpeg/bin/ffmpeg").version_check();
        assert_eq!(command.binary_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(command.args, vec!["-version"]);
    }

    #[tokio::test]
    async fn test_capture_window_truncates() {
        let data: &[u8] = b"0123456789abcdef";
        let window = capture_window(Some(data), 4).await;
        assert_eq!(window, b"0123");
    }

    #[tokio::test]
    async fn test_missing_binary_is_engine_error() {
        let command = EngineCommand::new("/nonexistent/mediabroker-engine", "Probe");
        let err = command.execute(1024).await.unwrap_err();
        assert!(matches!(err, BrokerError::Engine(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_engine_error() {
        let command = EngineCommand::new("false", "Probe");
        let err = command.execute(1024).await.unwrap_err();
        assert!(err.to_string().contains("exited abnormally"));
    }
}
