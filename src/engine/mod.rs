// Transcoding engine plumbing
//
// - FFmpegInput: the JSON descriptor carried by x-scrypted/x-ffmpeg-input payloads
// - Commands: command builders and bounded-output execution
// - resolve_engine_path: one-time lookup of the engine binary

pub mod commands;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use commands::*;

/// Recipe for an engine input: the arguments that open the media source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FFmpegInput {
    pub input_arguments: Vec<String>,
    /// The source URL, when the input was derived from one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl FFmpegInput {
    pub fn from_url<S: Into<String>>(url: S) -> Self {
        let url = url.into();
        Self {
            input_arguments: vec!["-i".to_string(), url.clone()],
            url: Some(url),
        }
    }
}

#[cfg(windows)]
const DEFAULT_ENGINE: &str = "ffmpeg.exe";
#[cfg(not(windows))]
const DEFAULT_ENGINE: &str = "ffmpeg";

/// Locate the transcoding engine binary.
///
/// `indirection_var` may name another variable holding the path, as done in
/// container images that ship several engine builds. `path_var` holds the path
/// directly. Candidates that don't exist on disk are skipped; the platform
/// default executable name is the fallback.
pub fn resolve_engine_path<F>(indirection_var: &str, path_var: &str, lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    let existing = |candidate: Option<String>| {
        candidate
            .filter(|p| !p.is_empty() && Path::new(p).exists())
            .map(PathBuf::from)
    };

    if let Some(name) = lookup(indirection_var).filter(|n| !n.is_empty()) {
        if let Some(path) = existing(lookup(&name)) {
            return path;
        }
    }

    if let Some(path) = existing(lookup(path_var)) {
        return path;
    }

    PathBuf::from(DEFAULT_ENGINE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + use<> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_ffmpeg_input_json_shape() {
        let input = FFmpegInput::from_url("https://example/stream");
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json["inputArguments"][0], "-i");
        assert_eq!(json["inputArguments"][1], "https://example/stream");
    }

    #[test]
    fn test_indirection_wins() {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("ffmpeg-custom");
        std::fs::write(&engine, b"").unwrap();
        let engine_str = engine.to_string_lossy().to_string();

        let lookup = env(&[("INDIRECT", "ACTUAL"), ("ACTUAL", engine_str.as_str()), ("DIRECT", "/nope")]);
        assert_eq!(resolve_engine_path("INDIRECT", "DIRECT", lookup), engine);
    }

    #[test]
    fn test_missing_paths_fall_back_to_default() {
        let lookup = env(&[("INDIRECT", "ACTUAL"), ("ACTUAL", "/does/not/exist"), ("DIRECT", "")]);
        assert_eq!(
            resolve_engine_path("INDIRECT", "DIRECT", lookup),
            PathBuf::from(DEFAULT_ENGINE)
        );
    }

    #[test]
    fn test_direct_variable() {
        let dir = tempfile::tempdir().unwrap();
        let engine = dir.path().join("ffmpeg");
        std::fs::write(&engine, b"").unwrap();

        let engine_str = engine.to_string_lossy().to_string();
        let lookup = env(&[("DIRECT", engine_str.as_str())]);
        assert_eq!(resolve_engine_path("INDIRECT", "DIRECT", lookup), engine);
    }
}
