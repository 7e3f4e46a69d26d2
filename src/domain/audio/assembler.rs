use super::buffer::AudioBuffer;
use super::error::AudioError;
use super::wav::{decode_wav, encode_wav};

/// Rescales every buffer towards the mean RMS of all buffers. Silent buffers are left alone.
pub fn normalize_loudness(buffers: &mut [AudioBuffer]) {
    if buffers.is_empty() {
        return;
    }
    let levels: Vec<f32> = buffers.iter().map(AudioBuffer::rms).collect();
    let target = levels.iter().sum::<f32>() / levels.len() as f32;

    for (buffer, level) in buffers.iter_mut().zip(levels) {
        if level > 0.0 {
            buffer.apply_gain(target / level);
        }
    }
}

/// Joins buffers in order. The output has as many channels as the widest input;
/// narrower inputs repeat their last channel.
pub fn concatenate(buffers: &[AudioBuffer]) -> Result<AudioBuffer, AudioError> {
    let first = buffers.first().ok_or(AudioError::Empty)?;
    let sample_rate = first.sample_rate;
    if let Some((index, mismatch)) = buffers
        .iter()
        .enumerate()
        .find(|(_, buffer)| buffer.sample_rate != sample_rate)
    {
        return Err(AudioError::SampleRateMismatch {
            index,
            expected: sample_rate,
            found: mismatch.sample_rate,
        });
    }

    let channel_count = buffers.iter().map(AudioBuffer::channel_count).max().unwrap_or(1).max(1);
    let total_frames: usize = buffers.iter().map(AudioBuffer::len).sum();

    let mut channels = vec![Vec::with_capacity(total_frames); channel_count];
    for buffer in buffers {
        let frames = buffer.len();
        for (channel, out) in channels.iter_mut().enumerate() {
            let source = buffer.channel_or_last(channel);
            out.extend_from_slice(&source[..frames.min(source.len())]);
            // Pad ragged channels so every output channel stays frame-aligned
            out.resize(out.len() + frames.saturating_sub(source.len()), 0.0);
        }
    }

    Ok(AudioBuffer::new(sample_rate, channels))
}

/// Turns ordered chunk outputs into one playable WAV.
#[derive(Debug, Clone, Copy)]
pub struct AudioAssembler {
    normalize: bool,
}

impl AudioAssembler {
    pub fn new(normalize: bool) -> Self {
        Self { normalize }
    }

    /// Decodes, optionally normalizes and concatenates chunk WAVs in index order.
    pub fn assemble(&self, chunks: &[Vec<u8>]) -> Result<AudioBuffer, AudioError> {
        if chunks.is_empty() {
            return Err(AudioError::Empty);
        }
        let mut buffers = chunks
            .iter()
            .enumerate()
            .map(|(index, bytes)| {
                decode_wav(bytes).map_err(|message| AudioError::Decode { index, message })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if self.normalize {
            normalize_loudness(&mut buffers);
        }
        let combined = concatenate(&buffers)?;

        tracing::debug!(
            chunks = chunks.len(),
            frames = combined.len(),
            channels = combined.channel_count(),
            sample_rate = combined.sample_rate,
            "Audio chunks assembled"
        );
        Ok(combined)
    }

    pub fn assemble_wav(&self, chunks: &[Vec<u8>]) -> Result<(AudioBuffer, Vec<u8>), AudioError> {
        let buffer = self.assemble(chunks)?;
        let wav = encode_wav(&buffer)?;
        Ok((buffer, wav))
    }
}
