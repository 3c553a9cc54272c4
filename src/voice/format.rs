use crate::voice::VoiceError;
use std::io::Cursor;

/// 音声認識サービスに送るサンプリングレート
pub const SPEECH_SAMPLE_RATE: u32 = 16_000;
/// モノラルチャンネル
pub const MONO_CHANNELS: u16 = 1;
/// PCM 16-bit サンプルのビット数
pub const BITS_PER_SAMPLE: u16 = 16;

/// PCM f32 サンプルデータを WAV フォーマットのバイト列に変換する
///
/// 音声認識サービスは WAV (PCM 16-bit) の音声入力を受け付けるため、
/// 生の PCM データにヘッダーを付与して正しい WAV 形式に変換する。
///
/// # Arguments
/// * `pcm_data` - f32 形式の PCM サンプルデータ（-1.0 〜 1.0）
/// * `sample_rate` - サンプリングレート（Hz）
/// * `channels` - チャンネル数（1 = モノラル, 2 = ステレオ）
pub fn pcm_f32_to_wav(
    pcm_data: &[f32],
    sample_rate: u32,
    channels: u16,
) -> Result<Vec<u8>, VoiceError> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut buffer, spec)
        .map_err(|e| VoiceError::FormatError(format!("Failed to create WAV writer: {}", e)))?;

    for &sample in pcm_data {
        let clamped = sample.clamp(-1.0, 1.0);
        let int_sample = (clamped * i16::MAX as f32) as i16;
        writer
            .write_sample(int_sample)
            .map_err(|e| VoiceError::FormatError(format!("Failed to write sample: {}", e)))?;
    }

    writer
        .finalize()
        .map_err(|e| VoiceError::FormatError(format!("Failed to finalize WAV: {}", e)))?;

    Ok(buffer.into_inner())
}

/// デコード済みの WAV データ（f32、インターリーブ）
#[derive(Debug, Clone)]
pub struct DecodedWav {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

/// WAV バイト列を f32 サンプルにデコードする
///
/// 音声合成サービスが返す RIFF PCM を再生用に読み出す。
/// 16-bit 整数と 32-bit 浮動小数点に対応する。
pub fn decode_wav(wav_data: &[u8]) -> Result<DecodedWav, VoiceError> {
    let mut reader = hound::WavReader::new(Cursor::new(wav_data))
        .map_err(|e| VoiceError::FormatError(format!("Failed to read WAV header: {}", e)))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / 32768.0))
            .collect::<Result<Vec<f32>, _>>(),
        (hound::SampleFormat::Float, 32) => {
            reader.samples::<f32>().collect::<Result<Vec<f32>, _>>()
        }
        (format, bits) => {
            return Err(VoiceError::FormatError(format!(
                "Unsupported WAV format: {:?} {}-bit",
                format, bits
            )))
        }
    }
    .map_err(|e| VoiceError::FormatError(format!("Failed to read sample: {}", e)))?;

    Ok(DecodedWav {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        samples,
    })
}

/// インターリーブされたマルチチャンネルのサンプルをモノラルに平均化する
///
/// 端数フレーム（チャンネル数に満たない末尾）は捨てる。
pub fn downmix_to_mono(interleaved: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => interleaved.to_vec(),
        n => {
            let n = n as usize;
            interleaved
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_f32_to_wav_produces_valid_wav() {
        // 1秒分の無音データ
        let samples = vec![0.0f32; SPEECH_SAMPLE_RATE as usize];
        let result = pcm_f32_to_wav(&samples, SPEECH_SAMPLE_RATE, MONO_CHANNELS);
        assert!(result.is_ok());

        let wav_data = result.unwrap();
        // WAV ヘッダーは "RIFF" で始まる
        assert_eq!(&wav_data[0..4], b"RIFF");
        // フォーマットは "WAVE"
        assert_eq!(&wav_data[8..12], b"WAVE");
        // 44 バイトのヘッダー + 2 バイト × サンプル数
        assert_eq!(wav_data.len(), 44 + 2 * SPEECH_SAMPLE_RATE as usize);
    }

    #[test]
    fn test_pcm_f32_clamps_values() {
        let samples = vec![-2.0f32, 2.0, 0.5, -0.5];
        let wav = pcm_f32_to_wav(&samples, SPEECH_SAMPLE_RATE, MONO_CHANNELS).unwrap();
        let decoded = decode_wav(&wav).unwrap();
        assert!(decoded.samples[0] >= -1.0);
        assert!(decoded.samples[1] <= 1.0);
    }

    #[test]
    fn test_decode_wav_reads_spec() {
        let samples = vec![0.25f32; 480];
        let wav = pcm_f32_to_wav(&samples, 24_000, MONO_CHANNELS).unwrap();
        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.sample_rate, 24_000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), 480);
        assert!((decoded.samples[0] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn test_decode_wav_rejects_garbage() {
        let result = decode_wav(b"not a wav file");
        assert!(matches!(result, Err(VoiceError::FormatError(_))));
    }

    #[test]
    fn test_downmix_stereo() {
        let interleaved = vec![1.0f32, 0.0, 0.5, 0.5, -1.0, 1.0];
        assert_eq!(downmix_to_mono(&interleaved, 2), vec![0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_downmix_drops_partial_frame() {
        let interleaved = vec![0.2f32, 0.4, 0.6];
        assert_eq!(downmix_to_mono(&interleaved, 2).len(), 1);
        assert!(downmix_to_mono(&interleaved, 0).is_empty());
        assert_eq!(downmix_to_mono(&interleaved, 1), interleaved);
    }
}
