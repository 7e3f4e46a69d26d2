use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::io::Cursor;

use super::buffer::{i16_to_f32, AudioBuffer};
use super::error::AudioError;

pub const WAV_CONTENT_TYPE: &str = "audio/wav";

/// Writes a 16-bit PCM WAV container.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>, AudioError> {
    let channels = u16::try_from(buffer.channel_count())
        .ok()
        .filter(|c| *c > 0)
        .ok_or_else(|| {
            AudioError::Encode(format!("unsupported channel count {}", buffer.channel_count()))
        })?;
    let spec = WavSpec {
        channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let samples = buffer.interleaved_i16();
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Reads a WAV container (8/16/24/32-bit integer or 32-bit float) into planar samples.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, String> {
    let reader = WavReader::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let spec = reader.spec();
    let channel_count = spec.channels as usize;
    if channel_count == 0 {
        return Err("wav declares zero channels".to_string());
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .map(|s| s.map(i16_to_f32))
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        (SampleFormat::Int, bits) if bits <= 32 => {
            let scale = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?
        }
        (SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        (format, bits) => {
            return Err(format!("unsupported sample format {:?} at {} bits", format, bits))
        }
    };

    let mut channels = vec![Vec::with_capacity(interleaved.len() / channel_count); channel_count];
    for (index, sample) in interleaved.into_iter().enumerate() {
        channels[index % channel_count].push(sample);
    }
    Ok(AudioBuffer::new(spec.sample_rate, channels))
}

/// Wraps raw little-endian 16-bit PCM (as returned by speech APIs) in a WAV container.
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>, AudioError> {
    if channels == 0 {
        return Err(AudioError::Encode("zero channels".to_string()));
    }
    let samples: Vec<i16> = pcm
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    let channel_count = channels as usize;
    let mut planar = vec![Vec::with_capacity(samples.len() / channel_count); channel_count];
    for (index, sample) in samples.into_iter().enumerate() {
        planar[index % channel_count].push(i16_to_f32(sample));
    }
    encode_wav(&AudioBuffer::new(sample_rate, planar))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::audio::buffer::f32_to_i16;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wav_round_trip_is_bit_exact() {
        let left: Vec<f32> = [-32768i16, -1000, 0, 1, 32767]
            .iter()
            .map(|v| i16_to_f32(*v))
            .collect();
        let right: Vec<f32> = [5i16, 6, 7, 8, 9].iter().map(|v| i16_to_f32(*v)).collect();
        let buffer = AudioBuffer::new(22050, vec![left, right]);

        let decoded = decode_wav(&encode_wav(&buffer).unwrap()).unwrap();

        assert_eq!(decoded, buffer);
    }

    #[test]
    fn test_encoded_header_describes_pcm16() {
        let buffer = AudioBuffer::mono(24000, vec![0.0; 10]);
        let bytes = encode_wav(&buffer).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 10 * 2);
        let reader = WavReader::new(Cursor::new(&bytes)).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        assert_eq!(reader.spec().sample_rate, 24000);
        assert_eq!(reader.spec().channels, 1);
    }

    #[test]
    fn test_pcm16_to_wav() {
        let pcm: Vec<u8> = [100i16, -200, 300]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let wav = pcm16_to_wav(&pcm, 24000, 1).unwrap();
        let decoded = decode_wav(&wav).unwrap();

        let samples: Vec<i16> = decoded.channels[0].iter().map(|s| f32_to_i16(*s)).collect();
        assert_eq!(samples, vec![100, -200, 300]);
        assert_eq!(decoded.sample_rate, 24000);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_wav(b"definitely not a wav file").is_err());
    }
}
