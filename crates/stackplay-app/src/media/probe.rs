//! Stacked-alpha clip metadata via ffprobe.

use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use super::MediaError;

/// Check if ffmpeg/ffprobe are available on the system. Cached per process.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("ffprobe")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

/// Metadata for a stacked-alpha clip. `height` is the full decoded
/// height; the visible content is the top `content_height` rows.
#[derive(Debug, Clone)]
pub struct StackedMeta {
    pub width: u32,
    pub height: u32,
    pub content_height: u32,
    pub fps: f64,
    pub duration_secs: f64,
}

/// Probe a stacked-alpha clip. The decoded height must be even: the
/// frame is color over mask, stacked vertically at equal heights.
pub fn probe_stacked(path: &Path) -> Result<StackedMeta, MediaError> {
    let output = Command::new("ffprobe")
        .args([
            "-v", "quiet",
            "-print_format", "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|e| MediaError::Probe(format!("ffprobe failed to execute: {e}")))?;

    if !output.status.success() {
        return Err(MediaError::Probe("ffprobe returned non-zero exit code".into()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| MediaError::Probe(format!("failed to parse ffprobe JSON: {e}")))?;

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| MediaError::Probe("no streams in ffprobe output".into()))?;

    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| MediaError::Probe("no video stream found".into()))?;

    let width = video_stream["width"]
        .as_u64()
        .ok_or_else(|| MediaError::Probe("missing width".into()))? as u32;
    let height = video_stream["height"]
        .as_u64()
        .ok_or_else(|| MediaError::Probe("missing height".into()))? as u32;

    let fps = parse_frame_rate(video_stream["r_frame_rate"].as_str().unwrap_or("30/1"));

    let duration_secs = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            video_stream["duration"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    stacked_meta(width, height, fps, duration_secs)
}

/// Validate dimensions and derive the content height.
pub fn stacked_meta(
    width: u32,
    height: u32,
    fps: f64,
    duration_secs: f64,
) -> Result<StackedMeta, MediaError> {
    if height < 2 || height % 2 != 0 {
        return Err(MediaError::UnsupportedLayout(format!(
            "decoded height {height} cannot split into color + mask halves"
        )));
    }
    Ok(StackedMeta {
        width,
        height,
        content_height: height / 2,
        fps,
        duration_secs,
    })
}

fn parse_frame_rate(rate: &str) -> f64 {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().unwrap_or(30.0);
        let d: f64 = den.parse().unwrap_or(1.0);
        if d > 0.0 { n / d } else { 30.0 }
    } else {
        rate.parse().unwrap_or(30.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_fraction() {
        assert!((parse_frame_rate("30000/1001") - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("24/1") - 24.0).abs() < 1e-9);
    }

    #[test]
    fn frame_rate_fallbacks() {
        assert!((parse_frame_rate("garbage") - 30.0).abs() < 1e-9);
        assert!((parse_frame_rate("25/0") - 30.0).abs() < 1e-9);
    }

    #[test]
    fn content_height_is_half() {
        let meta = stacked_meta(640, 720, 30.0, 5.0).unwrap();
        assert_eq!(meta.content_height, 360);
    }

    #[test]
    fn probe_of_non_media_file_errors() {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a video").unwrap();
        // Fails whether ffprobe is installed (no video stream) or not
        // (spawn failure).
        assert!(probe_stacked(file.path()).is_err());
    }

    #[test]
    fn odd_height_is_rejected() {
        assert!(matches!(
            stacked_meta(640, 719, 30.0, 5.0),
            Err(MediaError::UnsupportedLayout(_))
        ));
        assert!(matches!(
            stacked_meta(640, 0, 30.0, 5.0),
            Err(MediaError::UnsupportedLayout(_))
        ));
    }
}
