//! マイクのネイティブレートから認識用 16kHz への変換
//!
//! cpal はデバイス固有のレート（48kHz など）で録音するため、
//! rubato の `FastFixedIn` で固定比率のリサンプリングを行う。
//! 入出力レートが同じ場合はリサンプラを作らずそのまま返す。

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use crate::voice::VoiceError;

/// rubato に1回で渡す入力フレーム数
const DEFAULT_CHUNK_SIZE: usize = 1024;

/// モノラル f32 音声を固定比率で変換するコンバータ
pub struct RateConverter {
    /// 入出力レートが同じときは `None`（パススルー）
    resampler: Option<FastFixedIn<f32>>,
    /// チャンクに満たない入力の蓄積バッファ
    input_buf: Vec<f32>,
    chunk_size: usize,
    output_buf: Vec<Vec<f32>>,
}

impl RateConverter {
    pub fn new(
        capture_rate: u32,
        target_rate: u32,
        chunk_size: usize,
    ) -> Result<Self, VoiceError> {
        if capture_rate == target_rate {
            return Ok(Self {
                resampler: None,
                input_buf: Vec::new(),
                chunk_size,
                output_buf: Vec::new(),
            });
        }

        let ratio = target_rate as f64 / capture_rate as f64;
        let resampler =
            FastFixedIn::<f32>::new(ratio, 1.0, PolynomialDegree::Cubic, chunk_size, 1)
                .map_err(|e| VoiceError::ResampleError(format!("resampler init: {}", e)))?;

        let output_buf = vec![vec![0f32; resampler.output_frames_max()]; 1];
        debug!(capture_rate, target_rate, chunk_size, "resampling enabled");

        Ok(Self {
            resampler: Some(resampler),
            input_buf: Vec::new(),
            chunk_size,
            output_buf,
        })
    }

    /// 入力を蓄積し、チャンク単位で変換できた分を返す（空のこともある）
    pub fn process(&mut self, samples: &[f32]) -> Result<Vec<f32>, VoiceError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(samples.to_vec());
        };

        self.input_buf.extend_from_slice(samples);
        let mut result = Vec::new();

        while self.input_buf.len() >= self.chunk_size {
            let input_slice = &self.input_buf[..self.chunk_size];
            let (_consumed, produced) = resampler
                .process_into_buffer(&[input_slice], &mut self.output_buf, None)
                .map_err(|e| VoiceError::ResampleError(e.to_string()))?;
            result.extend_from_slice(&self.output_buf[0][..produced]);
            self.input_buf.drain(..self.chunk_size);
        }

        Ok(result)
    }

    /// 蓄積中の端数を吐き出し、リサンプラ内部の遅延分も含めて返す
    pub fn finish(&mut self) -> Result<Vec<f32>, VoiceError> {
        let Some(resampler) = self.resampler.as_mut() else {
            return Ok(std::mem::take(&mut self.input_buf));
        };

        let mut result = Vec::new();

        if !self.input_buf.is_empty() {
            let tail = std::mem::take(&mut self.input_buf);
            let input = [tail.as_slice()];
            let (_consumed, produced) = resampler
                .process_partial_into_buffer(Some(&input[..]), &mut self.output_buf, None)
                .map_err(|e| VoiceError::ResampleError(e.to_string()))?;
            result.extend_from_slice(&self.output_buf[0][..produced]);
        }

        let (_consumed, produced) = resampler
            .process_partial_into_buffer(None::<&[&[f32]]>, &mut self.output_buf, None)
            .map_err(|e| VoiceError::ResampleError(e.to_string()))?;
        result.extend_from_slice(&self.output_buf[0][..produced]);

        Ok(result)
    }
}

/// 1発話分のサンプルをまとめて変換する
pub fn resample_all(
    samples: &[f32],
    capture_rate: u32,
    target_rate: u32,
) -> Result<Vec<f32>, VoiceError> {
    let mut converter = RateConverter::new(capture_rate, target_rate, DEFAULT_CHUNK_SIZE)?;
    let mut out = converter.process(samples)?;
    out.extend(converter.finish()?);
    Ok(out)
}
