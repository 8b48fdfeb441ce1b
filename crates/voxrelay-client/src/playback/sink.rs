//! Playback sinks.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use voxrelay_core::audio::{wav, AudioSpec, PcmBlock};
use voxrelay_core::error::{Result, VoxError};

/// RIFF chunk size field.
const RIFF_SIZE_OFFSET: u64 = 4;
/// `data` chunk size field.
const DATA_SIZE_OFFSET: u64 = 40;

/// Destination for decoded audio.
///
/// `play` may refuse a block (for instance a layout it cannot render); the
/// reassembler then tries the next decoder strategy.
#[async_trait]
pub trait PlaybackSink: Send {
    fn name(&self) -> &str;

    async fn play(&mut self, pcm: PcmBlock) -> Result<()>;

    /// Flush and release. Called once when the inbound stream ends.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<S: PlaybackSink + ?Sized> PlaybackSink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn play(&mut self, pcm: PcmBlock) -> Result<()> {
        (**self).play(pcm).await
    }

    async fn finish(&mut self) -> Result<()> {
        (**self).finish().await
    }
}

/// Accepts everything and keeps nothing. Used when no output is configured.
#[derive(Debug, Default)]
pub struct DiscardSink {
    played: u64,
}

impl DiscardSink {
    pub fn played(&self) -> u64 {
        self.played
    }
}

#[async_trait]
impl PlaybackSink for DiscardSink {
    fn name(&self) -> &str {
        "discard"
    }

    async fn play(&mut self, pcm: PcmBlock) -> Result<()> {
        self.played += 1;
        tracing::debug!(samples = pcm.samples.len(), "played (discarded)");
        Ok(())
    }
}

/// Appends played audio to a WAV file.
///
/// The file is created on the first accepted block, whose layout then fixes
/// the file's layout; later blocks with another layout are refused. The header
/// sizes are patched in `finish`. File I/O runs on the blocking pool.
pub struct WavFileSink {
    name: String,
    path: Arc<PathBuf>,
    state: Arc<Mutex<FileState>>,
}

struct FileState {
    writer: Option<BufWriter<File>>,
    spec: Option<AudioSpec>,
    samples_written: u64,
}

impl WavFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            name: format!("wav:{}", path.as_ref().display()),
            path: Arc::new(path.as_ref().to_path_buf()),
            state: Arc::new(Mutex::new(FileState {
                writer: None,
                spec: None,
                samples_written: 0,
            })),
        }
    }

    fn io_err(path: &Path, e: std::io::Error) -> VoxError {
        VoxError::Internal(format!("playback file {}: {e}", path.display()))
    }

    fn append_blocking(st: &mut FileState, path: &Path, pcm: &PcmBlock) -> Result<()> {
        if st.writer.is_none() {
            let file = File::create(path).map_err(|e| Self::io_err(path, e))?;
            let mut writer = BufWriter::new(file);
            // header with zero sizes, patched on finish
            writer
                .write_all(&wav::encode(&pcm.spec, &[]))
                .map_err(|e| Self::io_err(path, e))?;
            st.writer = Some(writer);
            st.spec = Some(pcm.spec);
        }
        if let Some(writer) = st.writer.as_mut() {
            for s in &pcm.samples {
                writer
                    .write_all(&s.to_le_bytes())
                    .map_err(|e| Self::io_err(path, e))?;
            }
            st.samples_written += pcm.samples.len() as u64;
        }
        Ok(())
    }

    fn finalize_blocking(st: &mut FileState, path: &Path) -> Result<()> {
        let Some(mut writer) = st.writer.take() else {
            return Ok(());
        };
        let data_len = (st.samples_written * 2) as u32;
        let riff_len = wav::HEADER_LEN as u32 - 8 + data_len;
        let patch = |w: &mut BufWriter<File>| -> std::io::Result<()> {
            w.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
            w.write_all(&riff_len.to_le_bytes())?;
            w.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
            w.write_all(&data_len.to_le_bytes())?;
            w.flush()
        };
        patch(&mut writer).map_err(|e| Self::io_err(path, e))
    }
}

#[async_trait]
impl PlaybackSink for WavFileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn play(&mut self, pcm: PcmBlock) -> Result<()> {
        {
            let st = self.state.lock().await;
            if let Some(expected) = st.spec {
                if expected != pcm.spec {
                    return Err(VoxError::DecodeFailed(format!(
                        "sink expects {} Hz x{}, got {} Hz x{}",
                        expected.sample_rate, expected.channels, pcm.spec.sample_rate, pcm.spec.channels
                    )));
                }
            }
        }

        let state = Arc::clone(&self.state);
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || {
            let mut st = state.blocking_lock();
            Self::append_blocking(&mut st, &path, &pcm)
        })
        .await
        .map_err(|e| VoxError::Internal(format!("playback write task failed: {e}")))?
    }

    async fn finish(&mut self) -> Result<()> {
        let state = Arc::clone(&self.state);
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || {
            let mut st = state.blocking_lock();
            Self::finalize_blocking(&mut st, &path)
        })
        .await
        .map_err(|e| VoxError::Internal(format!("playback finalize task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    fn tmp(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("voxrelay-{}-{name}.wav", std::process::id()))
    }

    fn block(spec: AudioSpec, samples: Vec<i16>) -> PcmBlock {
        PcmBlock { spec, samples }
    }

    #[tokio::test]
    async fn appended_blocks_form_one_valid_file() {
        let path = tmp("append");
        let spec = AudioSpec::new(16_000, 1);
        let mut sink = WavFileSink::new(&path);
        sink.play(block(spec, vec![1, 2, 3])).await.unwrap();
        sink.play(block(spec, vec![4, 5])).await.unwrap();
        sink.finish().await.unwrap();

        let raw = std::fs::read(&path).unwrap();
        let pcm = wav::decode(Bytes::from(raw)).unwrap();
        assert_eq!(pcm.spec, spec);
        assert_eq!(pcm.samples, vec![1, 2, 3, 4, 5]);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn layout_change_is_refused() {
        let path = tmp("layout");
        let mut sink = WavFileSink::new(&path);
        sink.play(block(AudioSpec::new(16_000, 1), vec![1, 2]))
            .await
            .unwrap();
        let err = sink
            .play(block(AudioSpec::new(8_000, 2), vec![1, 2]))
            .await
            .unwrap_err();
        assert_eq!(err.code(), voxrelay_core::ErrorCode::DecodeFailed);
        sink.finish().await.unwrap();
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn finish_without_audio_creates_nothing() {
        let path = tmp("empty");
        let mut sink = WavFileSink::new(&path);
        sink.finish().await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn unwritable_path_is_an_error() {
        let mut sink = WavFileSink::new("/nonexistent/dir/out.wav");
        let err = sink
            .play(block(AudioSpec::new(16_000, 1), vec![1]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent"));
    }
}
