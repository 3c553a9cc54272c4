use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, warn};

use super::TtsError;
use crate::voice::format::{decode_wav, downmix_to_mono};
use crate::voice::resample::resample_all;

/// 再生バッファが空になったかを確認する間隔
const DRAIN_POLL: Duration = Duration::from_millis(50);
/// バッファが空になった後、デバイス側の再生を待つ猶予
const DRAIN_GRACE: Duration = Duration::from_millis(100);
/// 再生時間に足す待ち時間の上限の余裕
const DRAIN_TIMEOUT_MARGIN: Duration = Duration::from_secs(2);

/// 合成音声の出力先
///
/// ブロッキング呼び出し。再生が終わるまで戻らない。
pub trait AudioSink: Send + Sync {
    fn play_wav(&self, wav: &[u8]) -> Result<(), TtsError>;
}

/// デフォルト出力デバイスで再生する
#[derive(Debug, Default)]
pub struct CpalSink;

impl CpalSink {
    pub fn new() -> Self {
        Self
    }
}

/// モノラル音声を出力チャンネル数に複製してインターリーブする
fn spread_to_channels(mono: &[f32], channels: u16) -> VecDeque<f32> {
    let channels = channels.max(1) as usize;
    let mut out = VecDeque::with_capacity(mono.len() * channels);
    for &sample in mono {
        for _ in 0..channels {
            out.push_back(sample);
        }
    }
    out
}

fn fill_f32(buffer: &Mutex<VecDeque<f32>>, data: &mut [f32]) {
    match buffer.lock() {
        Ok(mut buf) => {
            for sample in data.iter_mut() {
                *sample = buf.pop_front().unwrap_or(0.0);
            }
        }
        Err(_) => data.fill(0.0),
    }
}

fn fill_i16(buffer: &Mutex<VecDeque<f32>>, data: &mut [i16]) {
    match buffer.lock() {
        Ok(mut buf) => {
            for sample in data.iter_mut() {
                let value = buf.pop_front().unwrap_or(0.0).clamp(-1.0, 1.0);
                *sample = (value * i16::MAX as f32) as i16;
            }
        }
        Err(_) => data.fill(0),
    }
}

/// 再生コールバックと待機側で共有する状態
#[derive(Debug)]
struct PlaybackState {
    buffer: Mutex<VecDeque<f32>>,
    /// ストリームのエラー（最初の1件）
    failure: Mutex<Option<String>>,
}

impl PlaybackState {
    fn new(samples: VecDeque<f32>) -> Self {
        Self {
            buffer: Mutex::new(samples),
            failure: Mutex::new(None),
        }
    }

    fn fail(&self, message: String) {
        if let Ok(mut failure) = self.failure.lock() {
            if failure.is_none() {
                *failure = Some(message);
            }
        }
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().ok().and_then(|f| f.clone())
    }

    fn remaining(&self) -> usize {
        self.buffer.lock().map(|b| b.len()).unwrap_or(0)
    }
}

/// インターリーブ済みサンプル数から再生にかかる時間を求める
fn playback_duration(interleaved_len: usize, sample_rate: u32, channels: u16) -> Duration {
    let per_second = sample_rate as u64 * channels.max(1) as u64;
    if per_second == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(interleaved_len as u64 * 1000 / per_second)
}

/// バッファが空になるまで待つ
///
/// ストリームのエラー、または `timeout` を過ぎても減らない場合は `PlaybackError`。
fn wait_for_drain(state: &PlaybackState, timeout: Duration) -> Result<(), TtsError> {
    let started = Instant::now();
    loop {
        if let Some(message) = state.failure() {
            return Err(TtsError::PlaybackError(format!(
                "Playback stream error: {}",
                message
            )));
        }
        if state.remaining() == 0 {
            return Ok(());
        }
        if started.elapsed() >= timeout {
            return Err(TtsError::PlaybackError(
                "Playback did not finish; the output device stopped".into(),
            ));
        }
        std::thread::sleep(DRAIN_POLL);
    }
}

impl AudioSink for CpalSink {
    /// WAV をデコードし、デバイスのレートとチャンネル数に合わせて再生する。
    /// f32 ストリームを作れないデバイスでは i16 で作り直す。
    fn play_wav(&self, wav: &[u8]) -> Result<(), TtsError> {
        let decoded = decode_wav(wav).map_err(|e| TtsError::PlaybackError(e.to_string()))?;
        let mono = downmix_to_mono(&decoded.samples, decoded.channels);

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| TtsError::PlaybackError("No output device available".into()))?;
        let default_config = device
            .default_output_config()
            .map_err(|e| TtsError::PlaybackError(format!("Failed to get output config: {}", e)))?;

        let device_rate = default_config.sample_rate().0;
        let channels = default_config.channels();
        let samples = resample_all(&mono, decoded.sample_rate, device_rate)
            .map_err(|e| TtsError::PlaybackError(e.to_string()))?;
        debug!(
            source_rate = decoded.sample_rate,
            device_rate, channels, "starting playback"
        );

        let interleaved = spread_to_channels(&samples, channels);
        let timeout =
            playback_duration(interleaved.len(), device_rate, channels) + DRAIN_TIMEOUT_MARGIN;
        let state = Arc::new(PlaybackState::new(interleaved));
        let config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(device_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let f32_state = Arc::clone(&state);
        let f32_errors = Arc::clone(&state);
        let stream = match device.build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| fill_f32(&f32_state.buffer, data),
            move |err| {
                error!("Playback stream error: {}", err);
                f32_errors.fail(err.to_string());
            },
            None,
        ) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("f32 output stream unavailable ({}), trying i16", e);
                let i16_state = Arc::clone(&state);
                let i16_errors = Arc::clone(&state);
                device
                    .build_output_stream(
                        &config,
                        move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                            fill_i16(&i16_state.buffer, data)
                        },
                        move |err| {
                            error!("Playback stream error: {}", err);
                            i16_errors.fail(err.to_string());
                        },
                        None,
                    )
                    .map_err(|e| {
                        TtsError::PlaybackError(format!("Failed to build output stream: {}", e))
                    })?
            }
        };

        stream
            .play()
            .map_err(|e| TtsError::PlaybackError(format!("Failed to start playback: {}", e)))?;

        let drained = wait_for_drain(&state, timeout);
        if drained.is_ok() {
            std::thread::sleep(DRAIN_GRACE);
        }
        drop(stream);
        drained?;

        debug!("playback finished");
        Ok(())
    }
}
