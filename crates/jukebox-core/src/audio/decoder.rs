//! Built-in pure-Rust decoders

use super::{container, resample_to_target, AudioData, AudioFormat, AudioSource, DecoderError};
use super::{ExcerptWindow, BUILTIN_DECODER};
use anyhow::{Context, Result};
use std::path::Path;

/// Decodes WAV, MP3, FLAC, Vorbis and Symphonia-supported containers in process
#[derive(Debug, Clone)]
pub struct BuiltinDecoder {
    sample_rate: u32,
}

impl BuiltinDecoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    fn check_path(&self, path: &Path) -> Result<(), DecoderError> {
        if !path.exists() {
            return Err(DecoderError::NotFound(path.to_path_buf()));
        }
        if AudioFormat::from_path(path) == AudioFormat::Unknown {
            return Err(DecoderError::Unsupported(path.to_path_buf()));
        }
        Ok(())
    }

    fn decode_mono(&self, path: &Path) -> Result<AudioData, DecoderError> {
        self.check_path(path)?;
        decode_audio(path, self.sample_rate)
            .map_err(|e| DecoderError::failed(path, format!("{:#}", e)))
    }
}

impl AudioSource for BuiltinDecoder {
    fn name(&self) -> &'static str {
        BUILTIN_DECODER
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn probe_duration(&self, path: &Path) -> Result<f32, DecoderError> {
        self.check_path(path)?;

        // WAV headers carry the length; everything else is decoded
        if AudioFormat::from_path(path) == AudioFormat::Wav {
            let reader = hound::WavReader::open(path)
                .map_err(|e| DecoderError::failed(path, e.to_string()))?;
            let spec = reader.spec();
            return Ok(reader.duration() as f32 / spec.sample_rate as f32);
        }

        Ok(self.decode_mono(path)?.duration_secs())
    }

    fn decode(&self, path: &Path, start: f32, length: f32) -> Result<Vec<f32>, DecoderError> {
        let audio = self.decode_mono(path)?;
        let window = ExcerptWindow::resolve(start, length, audio.duration_secs());

        log::debug!(
            "{}: decoding {:.2}s - {:.2}s of {:.2}s",
            path.display(),
            window.start,
            window.end(),
            audio.duration_secs()
        );

        let range = window.sample_range(self.sample_rate, audio.samples.len());
        let mut samples = audio.samples;
        samples.truncate(range.end);
        samples.drain(..range.start);
        Ok(samples)
    }
}

/// Decode audio file to mono at the target sample rate
pub fn decode_audio(path: &Path, target_sample_rate: u32) -> Result<AudioData> {
    let format = AudioFormat::from_path(path);

    let audio_data = match format {
        AudioFormat::Wav => decode_wav(path)?,
        AudioFormat::Mp3 => decode_mp3(path)?,
        AudioFormat::Flac => decode_flac(path)?,
        AudioFormat::Ogg => decode_ogg(path)?,
        f if f.is_container() => container::decode_container(path)?,
        _ => anyhow::bail!("Unsupported audio format: {}", path.display()),
    };

    if audio_data.sample_rate == 0 || audio_data.channels == 0 {
        anyhow::bail!("No audio frames in {}", path.display());
    }

    let mono = audio_data.to_mono();
    let samples = if audio_data.sample_rate != target_sample_rate {
        log::debug!(
            "Resampling {} from {}Hz to {}Hz",
            path.display(),
            audio_data.sample_rate,
            target_sample_rate
        );
        resample_to_target(&mono, audio_data.sample_rate, target_sample_rate)?
    } else {
        mono
    };

    Ok(AudioData::new(samples, target_sample_rate, 1))
}

/// Decode WAV file
fn decode_wav(path: &Path) -> Result<AudioData> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(AudioData::new(samples, spec.sample_rate, spec.channels))
}

/// Decode MP3 file
fn decode_mp3(path: &Path) -> Result<AudioData> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read MP3 file: {}", path.display()))?;

    let mut decoder = minimp3::Decoder::new(&data[..]);
    let mut samples = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 0;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = frame.sample_rate as u32;
                    channels = frame.channels as u16;
                }
                samples.extend(frame.data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => anyhow::bail!("MP3 decode error: {}", e),
        }
    }

    Ok(AudioData::new(samples, sample_rate, channels))
}

/// Decode FLAC file
fn decode_flac(path: &Path) -> Result<AudioData> {
    let mut reader = claxon::FlacReader::open(path)
        .with_context(|| format!("Failed to open FLAC file: {}", path.display()))?;

    let info = reader.streaminfo();
    let max_val = (1i64 << (info.bits_per_sample - 1)) as f32;
    let samples: Vec<f32> = reader
        .samples()
        .map(|s| s.map(|v| v as f32 / max_val))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AudioData::new(samples, info.sample_rate, info.channels as u16))
}

/// Decode OGG Vorbis file
fn decode_ogg(path: &Path) -> Result<AudioData> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open OGG file: {}", path.display()))?;

    let mut reader = lewton::inside_ogg::OggStreamReader::new(file)?;

    let sample_rate = reader.ident_hdr.audio_sample_rate;
    let channels = reader.ident_hdr.audio_channels as u16;

    let mut samples = Vec::new();
    while let Some(packet) = reader.read_dec_packet_itl()? {
        samples.extend(packet.iter().map(|&s| s as f32 / 32768.0));
    }

    Ok(AudioData::new(samples, sample_rate, channels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn write_test_wav(path: &Path, sample_rate: u32, seconds: f32) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (sample_rate as f32 * seconds) as usize;
        for i in 0..frames {
            let v = (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin();
            let s = (v * 0.5 * i16::MAX as f32) as i16;
            writer.write_sample(s).unwrap();
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_wav_window_decode() {
        let path = std::env::temp_dir().join(format!("jukebox-decoder-{}.wav", std::process::id()));
        write_test_wav(&path, 44100, 4.0);

        let decoder = BuiltinDecoder::new(22050);
        let duration = decoder.probe_duration(&path).unwrap();
        assert!((duration - 4.0).abs() < 1e-3);

        let whole = decoder.decode(&path, 0.0, 0.0).unwrap();
        assert!((whole.len() as i64 - 4 * 22050).abs() <= 1);

        // centered 2s window
        let window = decoder.decode(&path, -10.0, 2.0).unwrap();
        assert!((window.len() as i64 - 2 * 22050).abs() <= 1);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let decoder = BuiltinDecoder::new(22050);
        assert!(matches!(
            decoder.decode(Path::new("/nonexistent/track.wav"), 0.0, 0.0),
            Err(DecoderError::NotFound(_))
        ));

        let path = std::env::temp_dir().join(format!("jukebox-decoder-{}.txt", std::process::id()));
        std::fs::write(&path, b"not audio").unwrap();
        assert!(matches!(
            decoder.probe_duration(&path),
            Err(DecoderError::Unsupported(_))
        ));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_dispatch_by_format() {
        let dir = std::env::temp_dir();
        let id = std::process::id();

        let text = dir.join(format!("jukebox-dispatch-{}.txt", id));
        std::fs::write(&text, b"not audio").unwrap();
        let err = decode_audio(&text, 22050).unwrap_err().to_string();
        assert!(err.contains("Unsupported audio format"), "{}", err);

        // Containers go through the demuxer, which rejects the garbage itself
        let mkv = dir.join(format!("jukebox-dispatch-{}.mkv", id));
        std::fs::write(&mkv, b"not a matroska file").unwrap();
        let err = decode_audio(&mkv, 22050).unwrap_err().to_string();
        assert!(err.contains("Failed to probe media file"), "{}", err);

        std::fs::remove_file(&text).ok();
        std::fs::remove_file(&mkv).ok();
    }
}
