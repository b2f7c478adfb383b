//! WAV to MP3 transcoding through an external ffmpeg process.
//!
//! The intermediate WAV and the MP3 output live in a scoped temporary
//! directory that is removed when it goes out of scope, on success, on a
//! transcoder failure and on any I/O error alike.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::error::excerpt;

use super::wav::encode_wav;
use super::{EncodeError, Waveform};

/// Maximum number of stderr characters kept in a transcoder error.
pub const STDERR_EXCERPT_CHARS: usize = 200;

/// LAME VBR quality passed to ffmpeg (`-q:a`), 0 best .. 9 worst.
pub const DEFAULT_MP3_QUALITY: u8 = 2;

const SCRATCH_PREFIX: &str = "sonicforge-";

/// External MP3 transcoder invocation.
#[derive(Debug, Clone)]
pub struct Transcoder {
    program: PathBuf,
    quality: u8,
    scratch_root: Option<PathBuf>,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Transcoder {
    /// Creates a transcoder running `program` (usually `ffmpeg`).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            quality: DEFAULT_MP3_QUALITY,
            scratch_root: None,
        }
    }

    /// Creates scratch directories under `root` instead of the system temp dir.
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Sets the LAME VBR quality (clamped to 0-9).
    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.min(9);
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns true if the transcoder program can be started.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Transcodes a waveform into MP3 bytes.
    pub async fn wav_to_mp3(&self, waveform: &Waveform) -> Result<Vec<u8>, EncodeError> {
        let scratch = match &self.scratch_root {
            Some(root) => tempfile::Builder::new()
                .prefix(SCRATCH_PREFIX)
                .tempdir_in(root)?,
            None => tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?,
        };

        let wav_path = scratch.path().join("out.wav");
        let mp3_path = scratch.path().join("out.mp3");
        tokio::fs::write(&wav_path, encode_wav(waveform)?).await?;

        let output = Command::new(&self.program)
            .arg("-y")
            .args(["-hide_banner", "-loglevel", "error"])
            .arg("-i")
            .arg(&wav_path)
            .args(["-codec:a", "libmp3lame", "-q:a"])
            .arg(self.quality.to_string())
            .arg(&mp3_path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| EncodeError::TranscoderNotFound {
                program: self.program.display().to_string(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EncodeError::TranscoderFailed {
                exit_code: output.status.code(),
                stderr: excerpt(stderr.trim(), STDERR_EXCERPT_CHARS),
            });
        }

        let bytes = tokio::fs::read(&mp3_path).await?;
        tracing::debug!(
            frames = waveform.frames(),
            mp3_bytes = bytes.len(),
            "Transcoded waveform to mp3"
        );
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn scratch_is_empty(root: &Path) -> bool {
        std::fs::read_dir(root).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn missing_program_cleans_up_scratch() {
        let root = tempdir().unwrap();
        let transcoder =
            Transcoder::new("/nonexistent/ffmpeg-binary").with_scratch_root(root.path());

        let result = transcoder.wav_to_mp3(&Waveform::mono(32000, vec![0.1; 32])).await;
        assert!(matches!(result, Err(EncodeError::TranscoderNotFound { .. })));
        assert!(scratch_is_empty(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_transcoder_reports_truncated_stderr() {
        use std::os::unix::fs::PermissionsExt;

        let bin = tempdir().unwrap();
        let script = bin.path().join("fake-ffmpeg");
        std::fs::write(
            &script,
            "#!/bin/sh\nprintf '%0500d' 0 | tr 0 e >&2\nexit 3\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let root = tempdir().unwrap();
        let transcoder = Transcoder::new(&script).with_scratch_root(root.path());
        let err = transcoder
            .wav_to_mp3(&Waveform::mono(32000, vec![0.1; 32]))
            .await
            .unwrap_err();

        match err {
            EncodeError::TranscoderFailed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr.chars().count(), STDERR_EXCERPT_CHARS);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(scratch_is_empty(root.path()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn transcoder_receives_complete_intermediate_wav() {
        use std::os::unix::fs::PermissionsExt;

        // Copies the `-i` input to the last argument unchanged.
        let bin = tempdir().unwrap();
        let script = bin.path().join("copy-ffmpeg");
        std::fs::write(
            &script,
            "#!/bin/sh\nin=\"$6\"\nfor arg; do out=\"$arg\"; done\ncp \"$in\" \"$out\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let root = tempdir().unwrap();
        let transcoder = Transcoder::new(&script).with_scratch_root(root.path());
        let waveform = Waveform::mono(32000, vec![0.0, 0.25, -0.25, 1.0]);
        let bytes = transcoder.wav_to_mp3(&waveform).await.unwrap();

        assert_eq!(bytes, encode_wav(&waveform).unwrap());
        assert_eq!(crate::audio::decode_wav(&bytes).unwrap(), waveform);
        assert!(scratch_is_empty(root.path()));
    }

    #[tokio::test]
    async fn ffmpeg_encodes_single_sample_and_cleans_up() {
        let transcoder = Transcoder::default();
        if !transcoder.is_available().await {
            eprintln!("Skipping test: ffmpeg not found");
            return;
        }

        let root = tempdir().unwrap();
        let transcoder = transcoder.with_scratch_root(root.path());
        for samples in [vec![0.5f32], vec![0.0f32; 32000]] {
            let bytes = transcoder
                .wav_to_mp3(&Waveform::mono(32000, samples))
                .await
                .unwrap();
            assert!(!bytes.is_empty());
            assert!(scratch_is_empty(root.path()));
        }
    }

    #[test]
    fn quality_is_clamped() {
        let t = Transcoder::default().with_quality(42);
        assert_eq!(t.quality, 9);
        assert_eq!(t.program(), Path::new("ffmpeg"));
    }
}
