/// Planar PCM audio with samples in [-1.0, 1.0].
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::new(sample_rate, vec![samples])
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.len() as f64 / self.sample_rate as f64
    }

    /// Root mean square over every sample of every channel.
    pub fn rms(&self) -> f32 {
        let count: usize = self.channels.iter().map(Vec::len).sum();
        if count == 0 {
            return 0.0;
        }
        let sum_squares: f64 = self
            .channels
            .iter()
            .flatten()
            .map(|s| (*s as f64) * (*s as f64))
            .sum();
        (sum_squares / count as f64).sqrt() as f32
    }

    /// Multiplies every sample by `gain`, clamping to the valid amplitude range.
    pub fn apply_gain(&mut self, gain: f32) {
        for sample in self.channels.iter_mut().flatten() {
            *sample = (*sample * gain).clamp(-1.0, 1.0);
        }
    }

    /// Samples of `channel`, reusing the last channel when this buffer has fewer.
    pub fn channel_or_last(&self, channel: usize) -> &[f32] {
        let last = self.channels.len().saturating_sub(1);
        self.channels
            .get(channel.min(last))
            .map_or(&[][..], Vec::as_slice)
    }

    pub fn interleaved_i16(&self) -> Vec<i16> {
        let channels = self.channel_count();
        let mut out = Vec::with_capacity(self.len() * channels);
        for frame in 0..self.len() {
            for channel in &self.channels {
                out.push(f32_to_i16(channel.get(frame).copied().unwrap_or(0.0)));
            }
        }
        out
    }
}

pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Exact inverse of [`i16_to_f32`] for values produced by it.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32768.0).round().clamp(-32768.0, 32767.0) as i16
}
