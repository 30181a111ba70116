use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Writes a session's outbound wire audio to a WAV file.
///
/// Optional debugging aid: one file per session, 16-bit mono at the wire
/// rate, finalized on `finish` or on drop so abrupt teardown still produces a
/// playable file.
pub struct SessionArchive {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    path: PathBuf,
    sample_rate: u32,
    samples_written: usize,
}

impl SessionArchive {
    pub fn create(dir: &Path, session_id: &str, sample_rate: u32) -> Result<Self> {
        fs::create_dir_all(dir).context("Failed to create archive directory")?;

        let path = dir.join(format!("{session_id}.wav"));

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let writer = hound::WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {path:?}"))?;

        info!("Archiving session audio to {:?}", path);

        Ok(Self {
            writer: Some(writer),
            path,
            sample_rate,
            samples_written: 0,
        })
    }

    /// Append a wire-format PCM16 frame.
    pub fn write_frame(&mut self, pcm: &[u8]) -> Result<()> {
        if let Some(writer) = &mut self.writer {
            for pair in pcm.chunks_exact(2) {
                let sample = i16::from_le_bytes([pair[0], pair[1]]);
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }
            self.samples_written += pcm.len() / 2;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<PathBuf> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize WAV file")?;
        }

        info!(
            "Session archive complete: {:?} ({:.1}s)",
            self.path,
            self.samples_written as f64 / self.sample_rate as f64
        );

        Ok(self.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SessionArchive {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.finalize() {
                warn!("Failed to finalize session archive on drop: {}", e);
            }
        }
    }
}
