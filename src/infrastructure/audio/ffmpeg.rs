use super::{AudioNormalizer, NormalizeError};
use crate::domain::synthesis::mp3::StreamFormat;
use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Transcodes segments with the FFmpeg binary. FFmpeg must be installed.
#[derive(Debug, Clone)]
pub struct FfmpegNormalizer {
    ffmpeg_path: String,
}

impl FfmpegNormalizer {
    pub fn new(ffmpeg_path: String) -> Self {
        Self { ffmpeg_path }
    }

    /// Check that the binary can be executed
    pub async fn is_available(&self) -> bool {
        Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .is_ok_and(|status| status.success())
    }

    fn args(target: StreamFormat) -> Vec<String> {
        vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "mp3".to_string(),
            "-i".to_string(),
            "pipe:0".to_string(),
            "-map_metadata".to_string(),
            "-1".to_string(),
            "-ar".to_string(),
            target.sample_rate.to_string(),
            "-ac".to_string(),
            target.channels.to_string(),
            "-codec:a".to_string(),
            "libmp3lame".to_string(),
            "-b:a".to_string(),
            "128k".to_string(),
            // no Xing header and no ID3 tag: output is bare frames
            "-write_xing".to_string(),
            "0".to_string(),
            "-id3v2_version".to_string(),
            "0".to_string(),
            "-f".to_string(),
            "mp3".to_string(),
            "pipe:1".to_string(),
        ]
    }
}

#[async_trait]
impl AudioNormalizer for FfmpegNormalizer {
    async fn normalize(
        &self,
        audio: &[u8],
        target: StreamFormat,
    ) -> Result<Vec<u8>, NormalizeError> {
        tracing::debug!(
            input_size = audio.len(),
            sample_rate = target.sample_rate,
            channels = target.channels,
            "Normalizing audio segment with FFmpeg"
        );

        let mut child = Command::new(&self.ffmpeg_path)
            .args(Self::args(target))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| NormalizeError::Spawn {
                program: self.ffmpeg_path.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::BrokenPipe, "FFmpeg stdin unavailable")
            })?;
        let input = audio.to_vec();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = child.wait_with_output().await?;
        writer.await.map_err(io::Error::other)??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(status = %output.status, stderr = %stderr, "FFmpeg conversion failed");
            return Err(NormalizeError::Exited {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        tracing::debug!(output_size = output.stdout.len(), "FFmpeg conversion finished");
        Ok(output.stdout)
    }
}
