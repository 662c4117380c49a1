use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::{Converter, FnConverter};
use crate::config::EngineConfig;
use crate::engine::{EngineCommandBuilder, FFmpegInput};
use crate::error::{BrokerError, Result};
use crate::media::{MediaData, Representation};
use crate::mime::{self, MimeType};

/// Url;accept-url -> engine input descriptor that opens the URL
pub fn url_to_ffmpeg_input() -> FnConverter {
    FnConverter::new(
        "url-to-ffmpeg-input",
        MimeType::accept_url(),
        MimeType::from_static(mime::FFMPEG_INPUT),
        |data, _from| {
            let url = data.into_text();
            let input = FFmpegInput::from_url(url.trim());
            Ok(MediaData::Buffer(serde_json::to_vec(&input)?))
        },
    )
    .with_representation(Representation::Text)
}

/// Engine input descriptor -> single JPEG frame, produced by the engine
pub struct FFmpegSnapshotConverter {
    from_type: MimeType,
    to_type: MimeType,
    commands: EngineCommandBuilder,
    log_window_bytes: usize,
    temp_dir: Option<PathBuf>,
}

impl FFmpegSnapshotConverter {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            from_type: MimeType::from_static(mime::FFMPEG_INPUT),
            to_type: MimeType::from_static("image/jpeg"),
            commands: EngineCommandBuilder::new(&config.binary_path),
            log_window_bytes: config.log_window_bytes,
            temp_dir: config.temp_dir.clone(),
        }
    }

    fn output_file(&self) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("snapshot-").suffix(".jpg");
        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        };
        file.map_err(|e| BrokerError::Engine(format!("Failed to create temp file: {}", e)))
    }
}

#[async_trait]
impl Converter for FFmpegSnapshotConverter {
    fn name(&self) -> &str {
        "ffmpeg-snapshot"
    }

    fn from_type(&self) -> &MimeType {
        &self.from_type
    }

    fn to_type(&self) -> &MimeType {
        &self.to_type
    }

    fn input_representation(&self) -> Representation {
        Representation::Buffer
    }

    async fn convert(&self, data: MediaData, _from_type: &MimeType) -> Result<(MediaData, MimeType)> {
        let input: FFmpegInput = serde_json::from_slice(data.as_bytes())?;

        // Removed when dropped, whichever way this function is left.
        let output = self.output_file()?;
        debug!("Snapshot output file: {}", output.path().display());

        let command = self.commands.snapshot(&input, output.path());
        command.execute(self.log_window_bytes).await?;

        let bytes = tokio::fs::read(output.path())
            .await
            .map_err(|e| BrokerError::Engine(format!("Snapshot output unreadable: {}", e)))?;
        if bytes.is_empty() {
            return Err(BrokerError::Engine(
                "Snapshot completed without producing an image".to_string(),
            ));
        }

        info!("Snapshot captured ({} bytes)", bytes.len());
        Ok((MediaData::Buffer(bytes), self.to_type.clone()))
    }
}

/// The converters every broker starts with, in enumeration order.
pub fn builtin_converters(config: &EngineConfig) -> Vec<Arc<dyn Converter>> {
    let url: Arc<dyn Converter> = Arc::new(url_to_ffmpeg_input());
    let snapshot: Arc<dyn Converter> = Arc::new(FFmpegSnapshotConverter::new(config));
    vec![url, snapshot]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_url_to_ffmpeg_input() {
        let converter = url_to_ffmpeg_input();
        let (out, produced) = converter
            .convert(MediaData::from("https://example/stream\n"), &MimeType::accept_url())
            .await
            .unwrap();
        assert_eq!(produced.to_string(), mime::FFMPEG_INPUT);

        let input: FFmpegInput = serde_json::from_slice(out.as_bytes()).unwrap();
        assert_eq!(input.input_arguments, vec!["-i", "https://example/stream"]);
        assert_eq!(input.url.as_deref(), Some("https://example/stream"));
    }

    #[tokio::test]
    async fn test_snapshot_rejects_malformed_descriptor() {
        let converter = FFmpegSnapshotConverter::new(&EngineConfig::default());
        let err = converter
            .convert(MediaData::from("not json"), &MimeType::from_static(mime::FFMPEG_INPUT))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Json(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_engine_leaves_no_temp_files() {
        let temp = assert_fs::TempDir::new().unwrap();
        let config = EngineConfig {
            binary_path: "false".to_string(),
            temp_dir: Some(temp.path().to_path_buf()),
            ..EngineConfig::default()
        };
        let converter = FFmpegSnapshotConverter::new(&config);
        let input = serde_json::to_vec(&FFmpegInput::from_url("rtsp://cam")).unwrap();

        let err = converter
            .convert(MediaData::Buffer(input), &MimeType::from_static(mime::FFMPEG_INPUT))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Engine(_)));
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }
}
