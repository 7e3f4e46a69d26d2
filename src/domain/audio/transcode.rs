use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm, Quality};
use serde::{Deserialize, Serialize};

use super::buffer::AudioBuffer;
use super::error::AudioError;

/// Container of a finished artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Wav,
    Mp3,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "audio/wav",
            OutputFormat::Mp3 => "audio/mpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Wav => "wav",
            OutputFormat::Mp3 => "mp3",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

/// Compressed re-encoding of an assembled buffer, run after the WAV is built.
pub trait AudioTranscoder: Send + Sync {
    fn format(&self) -> OutputFormat;

    fn transcode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>, AudioError>;
}

/// LAME encoder at a constant 128 kbps. Inputs wider than stereo keep their first two channels.
pub struct Mp3Transcoder;

fn lame_error(step: &str, err: impl std::fmt::Debug) -> AudioError {
    AudioError::Transcode(format!("{} failed: {:?}", step, err))
}

impl AudioTranscoder for Mp3Transcoder {
    fn format(&self) -> OutputFormat {
        OutputFormat::Mp3
    }

    fn transcode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>, AudioError> {
        let stereo = buffer.channel_count() >= 2;
        let mut builder =
            Builder::new().ok_or_else(|| AudioError::Transcode("encoder init failed".to_string()))?;
        builder
            .set_num_channels(if stereo { 2 } else { 1 })
            .map_err(|e| lame_error("set channels", e))?;
        builder
            .set_sample_rate(buffer.sample_rate)
            .map_err(|e| lame_error("set sample rate", e))?;
        builder
            .set_brate(Bitrate::Kbps128)
            .map_err(|e| lame_error("set bitrate", e))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|e| lame_error("set quality", e))?;
        let mut encoder = builder.build().map_err(|e| lame_error("build encoder", e))?;

        let to_i16 = |samples: &[f32]| -> Vec<i16> {
            samples
                .iter()
                .map(|s| super::buffer::f32_to_i16(*s))
                .collect()
        };
        let left = to_i16(buffer.channel_or_last(0));

        let mut out = Vec::new();
        out.reserve(mp3lame_encoder::max_required_buffer_size(left.len()));
        let encoded = (if stereo {
            let right = to_i16(buffer.channel_or_last(1));
            encoder.encode(
                DualPcm {
                    left: &left,
                    right: &right,
                },
                out.spare_capacity_mut(),
            )
        } else {
            encoder.encode(MonoPcm(&left), out.spare_capacity_mut())
        })
        .map_err(|e| lame_error("encode", e))?;
        // SAFETY: the encoder initialised exactly `encoded` bytes of spare capacity
        unsafe {
            out.set_len(out.len().wrapping_add(encoded));
        }

        out.reserve(7200);
        let flushed = encoder
            .flush::<FlushNoGap>(out.spare_capacity_mut())
            .map_err(|e| lame_error("flush", e))?;
        // SAFETY: as above, for the flushed tail
        unsafe {
            out.set_len(out.len().wrapping_add(flushed));
        }

        Ok(out)
    }
}
