//! WAV helpers for recorded input

use std::io::Cursor;
use std::time::Duration;

use crate::{Error, Result};

/// Format summary of a WAV recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub duration: Duration,
}

/// Read the header of a WAV buffer
///
/// # Errors
///
/// Returns error if the buffer is not a readable WAV stream
pub fn inspect_wav(bytes: &[u8]) -> Result<WavInfo> {
    let reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| Error::Audio(e.to_string()))?;
    let spec = reader.spec();

    // `duration()` counts frames, i.e. samples per channel
    let frames = u64::from(reader.duration());
    let duration = if spec.sample_rate == 0 {
        Duration::ZERO
    } else {
        Duration::from_micros(frames * 1_000_000 / u64::from(spec.sample_rate))
    };

    Ok(WavInfo {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: spec.bits_per_sample,
        duration,
    })
}

/// Encode mono f32 samples as 16-bit PCM WAV
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            #[allow(clippy::cast_possible_truncation)]
            let sample_i16 = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            writer
                .write_sample(sample_i16)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspects_generated_wav() {
        let samples = vec![0.0_f32; 8000];
        let wav = samples_to_wav(&samples, 16_000).unwrap();

        let info = inspect_wav(&wav).unwrap();
        assert_eq!(info.channels, 1);
        assert_eq!(info.sample_rate, 16_000);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.duration, Duration::from_millis(500));
    }

    #[test]
    fn rejects_non_wav_bytes() {
        let err = inspect_wav(b"definitely not a riff header").unwrap_err();
        assert!(matches!(err, Error::Audio(_)));
    }
}
