//! Audio extraction and chunking.
//!
//! The extractor guarantees the transcriber receives audio-only input,
//! shelling out to ffmpeg to strip video containers down to mono 16 kHz PCM
//! WAV. The chunker partitions audio into bounded-length WAV buffers and
//! reports each chunk's actual duration, which drives offset stitching.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tempfile::TempPath;
use thiserror::Error;
use tokio::process::Command;

use crate::domain::MediaRecord;

/// Errors from audio extraction and chunking
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Transcoding failed: {0}")]
    Tool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("Audio file is empty: {0}")]
    Empty(PathBuf),
}

/// An audio-only path handed to the transcriber.
///
/// Holds the backing temp file alive when the source was transcoded.
pub struct AudioSource {
    pub path: PathBuf,
    _temp: Option<TempPath>,
}

/// A bounded-length slice of audio, re-encoded as a standalone WAV buffer.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// WAV-encoded chunk payload
    pub wav_bytes: Vec<u8>,

    /// Actual chunk duration in seconds (the last chunk is shorter)
    pub duration: f64,
}

/// Guarantee an audio-only input for the given record.
///
/// Audio MIME types pass through unchanged (no copy). Video containers are
/// transcoded into a fresh temporary WAV file.
pub async fn ensure_audio(record: &MediaRecord) -> Result<AudioSource, AudioError> {
    if record.is_audio() {
        return Ok(AudioSource {
            path: record.file_path.clone(),
            _temp: None,
        });
    }

    let temp = transcode_to_wav(&record.file_path).await?;
    Ok(AudioSource {
        path: temp.to_path_buf(),
        _temp: Some(temp),
    })
}

/// Transcode any ffmpeg-readable input to mono 16 kHz PCM WAV in a temp file.
pub async fn transcode_to_wav(input: &Path) -> Result<TempPath, AudioError> {
    let temp = tempfile::Builder::new()
        .prefix("earshot-")
        .suffix(".wav")
        .tempfile()
        .map_err(AudioError::Io)?
        .into_temp_path();

    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(input)
        .arg("-vn")
        .arg("-acodec")
        .arg("pcm_s16le")
        .arg("-ac")
        .arg("1")
        .arg("-ar")
        .arg("16000")
        .arg("-f")
        .arg("wav")
        .arg("-y")
        .arg(temp.as_os_str())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| AudioError::Tool(format!("failed to run ffmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AudioError::Tool(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(temp)
}

/// Read the duration of a WAV file from its header, if it is one.
/// Cheap metadata probe; anything unreadable is simply `None`.
pub fn wav_duration(path: &Path) -> Option<f64> {
    let reader = hound::WavReader::open(path).ok()?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return None;
    }
    Some(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Partition audio into fixed-length chunks (last one may be shorter).
///
/// Compressed audio the WAV reader cannot parse is transcoded first, so
/// pass-through mp3/ogg/flac/m4a inputs still chunk correctly.
pub async fn load_chunks(path: &Path, chunk_seconds: f64) -> Result<Vec<AudioChunk>, AudioError> {
    match chunk_wav_file(path, chunk_seconds) {
        Ok(chunks) => Ok(chunks),
        Err(AudioError::Wav(_)) => {
            let temp = transcode_to_wav(path).await?;
            chunk_wav_file(&temp, chunk_seconds)
        }
        Err(e) => Err(e),
    }
}

/// Split a WAV file into chunks of at most `chunk_seconds`.
pub fn chunk_wav_file(path: &Path, chunk_seconds: f64) -> Result<Vec<AudioChunk>, AudioError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    let samples: Vec<i16> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<Vec<_>, _>>()?,
    };

    if samples.is_empty() {
        return Err(AudioError::Empty(path.to_path_buf()));
    }

    let channels = spec.channels.max(1) as usize;
    let frames_per_chunk = (chunk_seconds * spec.sample_rate as f64) as usize;
    let samples_per_chunk = (frames_per_chunk * channels).max(1);

    let out_spec = hound::WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut chunks = Vec::new();
    for window in samples.chunks(samples_per_chunk) {
        let mut buffer = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut buffer, out_spec)?;
            for sample in window {
                writer.write_sample(*sample)?;
            }
            writer.finalize()?;
        }

        let frames = window.len() / channels;
        chunks.push(AudioChunk {
            wav_bytes: buffer.into_inner(),
            duration: frames as f64 / spec.sample_rate as f64,
        });
    }

    Ok(chunks)
}

/// Write a mono 16 kHz test-tone WAV of the given duration.
#[cfg(test)]
pub(crate) fn write_test_wav(path: &Path, seconds: f64) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (seconds * 16_000.0) as usize;
    for i in 0..frames {
        writer.write_sample(((i % 64) as i16) * 100).unwrap();
    }
    writer.finalize().unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_wav_duration_probe() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("probe.wav");
        write_test_wav(&path, 2.5);

        let duration = wav_duration(&path).unwrap();
        assert!((duration - 2.5).abs() < 0.01);

        assert!(wav_duration(&temp.path().join("missing.wav")).is_none());
    }

    #[test]
    fn test_chunking_respects_bound_and_durations() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("long.wav");
        // 72 seconds → chunks of 30, 30, 12
        write_test_wav(&path, 72.0);

        let chunks = chunk_wav_file(&path, 30.0).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!((chunks[0].duration - 30.0).abs() < 0.01);
        assert!((chunks[1].duration - 30.0).abs() < 0.01);
        assert!((chunks[2].duration - 12.0).abs() < 0.01);

        // Each chunk is itself a parseable WAV of the right length
        let reader =
            hound::WavReader::new(Cursor::new(chunks[2].wav_bytes.clone())).unwrap();
        let duration = reader.duration() as f64 / reader.spec().sample_rate as f64;
        assert!((duration - 12.0).abs() < 0.01);
    }

    #[test]
    fn test_short_file_is_single_chunk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("short.wav");
        write_test_wav(&path, 4.0);

        let chunks = chunk_wav_file(&path, 30.0).unwrap();
        assert_eq!(chunks.len(), 1);
        assert!((chunks[0].duration - 4.0).abs() < 0.01);
    }

    #[test]
    fn test_non_wav_is_a_wav_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fake.mp3");
        std::fs::write(&path, b"not really audio").unwrap();

        match chunk_wav_file(&path, 30.0) {
            Err(AudioError::Wav(_)) => {}
            other => panic!("expected WAV error, got {:?}", other.map(|c| c.len())),
        }
    }
}
