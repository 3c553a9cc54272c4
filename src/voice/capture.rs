use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error};

use crate::voice::endpoint::{EndpointConfig, EndpointStatus, Endpointer};
use crate::voice::format::downmix_to_mono;
use crate::voice::VoiceError;

/// 停止フラグを確認する間隔
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// 録音スレッドの準備完了を待つ時間
const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// 切り出した1発話分の音声（モノラル f32）
#[derive(Debug, Clone)]
pub struct CapturedUtterance {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl CapturedUtterance {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }
}

/// 1回の録音の結果
#[derive(Debug)]
pub enum CaptureResult {
    Utterance(CapturedUtterance),
    /// 発話が始まらなかった
    InitialSilenceTimeout,
    /// 停止フラグにより中断された
    Aborted,
}

/// 1発話分の音声を取得する入力源
///
/// ブロッキング呼び出し。`running` が false になったら速やかに `Aborted` を返す。
pub trait UtteranceSource: Send + Sync {
    fn capture(&self, running: &AtomicBool) -> Result<CaptureResult, VoiceError>;
}

/// 録音コールバックから届くメッセージ
#[derive(Debug)]
enum StreamEvent {
    Samples(Vec<f32>),
    /// ストリームのエラー（デバイスの切断など）
    Failed(String),
}

/// デフォルトマイクから1発話を録音する入力源
pub struct MicrophoneSource {
    endpoint: EndpointConfig,
}

impl MicrophoneSource {
    pub fn new() -> Self {
        Self {
            endpoint: EndpointConfig::new(0),
        }
    }
}

impl Default for MicrophoneSource {
    fn default() -> Self {
        Self::new()
    }
}

/// サンプル型ごとの入力ストリームを作る（エラーもチャンネルで通知する）
fn build_stream<T, F>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    tx: mpsc::Sender<StreamEvent>,
    convert: F,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: cpal::SizedSample,
    F: Fn(T) -> f32 + Send + 'static,
{
    let err_tx = tx.clone();
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let _ = tx.send(StreamEvent::Samples(data.iter().map(|&s| convert(s)).collect()));
        },
        move |err| {
            error!("Audio stream error: {}", err);
            let _ = err_tx.send(StreamEvent::Failed(err.to_string()));
        },
        None,
    )
}

/// 受信したサンプルをエンドポイント検出に流し、1発話の区切りまで待つ
///
/// ストリームのエラーと `deadline` 超過（音声が届かない）は `DeviceError`。
fn collect_utterance(
    rx: &mpsc::Receiver<StreamEvent>,
    channels: u16,
    config: EndpointConfig,
    running: &AtomicBool,
    deadline: Duration,
) -> Result<CaptureResult, VoiceError> {
    let sample_rate = config.sample_rate;
    let mut endpointer = Endpointer::new(config);
    let started = Instant::now();

    loop {
        if !running.load(Ordering::SeqCst) {
            return Ok(CaptureResult::Aborted);
        }
        if started.elapsed() >= deadline {
            return Err(VoiceError::DeviceError(
                "No audio received from the microphone".into(),
            ));
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(StreamEvent::Samples(chunk)) => {
                let mono = downmix_to_mono(&chunk, channels);
                match endpointer.push(&mono) {
                    EndpointStatus::Complete => {
                        return Ok(CaptureResult::Utterance(CapturedUtterance {
                            samples: endpointer.take_utterance(),
                            sample_rate,
                        }));
                    }
                    EndpointStatus::InitialSilenceTimeout => {
                        return Ok(CaptureResult::InitialSilenceTimeout);
                    }
                    EndpointStatus::Waiting | EndpointStatus::Speaking => {}
                }
            }
            Ok(StreamEvent::Failed(message)) => {
                return Err(VoiceError::DeviceError(format!(
                    "Audio stream error: {}",
                    message
                )));
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(VoiceError::DeviceError(
                    "Audio stream closed unexpectedly".into(),
                ));
            }
        }
    }
}

impl UtteranceSource for MicrophoneSource {
    /// cpal でデフォルト入力デバイスを開き、専用スレッドでストリームを保持する。
    fn capture(&self, running: &AtomicBool) -> Result<CaptureResult, VoiceError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| VoiceError::DeviceError("No input device available".into()))?;
        let supported_config = device
            .default_input_config()
            .map_err(|e| VoiceError::DeviceError(format!("Failed to get input config: {}", e)))?;

        let sample_rate = supported_config.sample_rate().0;
        let channels = supported_config.channels();
        let sample_format = supported_config.sample_format();
        let stream_config: cpal::StreamConfig = supported_config.into();
        debug!(sample_rate, channels, ?sample_format, "opening input stream");

        let (data_tx, data_rx) = mpsc::channel::<StreamEvent>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

        // 録音スレッド: cpal::Stream を保持し、stop シグナルで終了
        let handle = thread::spawn(move || {
            let build_result = match sample_format {
                cpal::SampleFormat::F32 => build_stream(&device, &stream_config, data_tx, |s: f32| s),
                cpal::SampleFormat::I16 => {
                    build_stream(&device, &stream_config, data_tx, |s: i16| s as f32 / 32768.0)
                }
                cpal::SampleFormat::U16 => build_stream(&device, &stream_config, data_tx, |s: u16| {
                    (s as f32 - 32768.0) / 32768.0
                }),
                _ => {
                    let _ = ready_tx.send(Err(format!(
                        "Unsupported sample format: {:?}",
                        sample_format
                    )));
                    return;
                }
            };

            match build_result {
                Ok(stream) => match stream.play() {
                    Ok(()) => {
                        let _ = ready_tx.send(Ok(()));
                        let _ = stop_rx.recv();
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(format!("Failed to start stream: {}", e)));
                    }
                },
                Err(e) => {
                    let _ = ready_tx.send(Err(format!("Failed to build stream: {}", e)));
                }
            }
        });

        match ready_rx.recv_timeout(READY_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(VoiceError::DeviceError(e));
            }
            Err(_) => {
                let _ = stop_tx.send(());
                return Err(VoiceError::DeviceError("Recording thread timed out".into()));
            }
        }

        let config = EndpointConfig {
            sample_rate,
            ..self.endpoint.clone()
        };
        let deadline = config.capture_deadline();
        let result = collect_utterance(&data_rx, channels, config, running, deadline);

        let _ = stop_tx.send(());
        let _ = handle.join();

        if let Ok(CaptureResult::Utterance(utterance)) = &result {
            debug!(duration_ms = utterance.duration_ms(), "utterance captured");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utterance_duration() {
        let utterance = CapturedUtterance {
            samples: vec![0.0; 24_000],
            sample_rate: 48_000,
        };
        assert_eq!(utterance.duration_ms(), 500);
    }

    #[test]
    fn test_zero_rate_duration() {
        let utterance = CapturedUtterance {
            samples: vec![0.0; 10],
            sample_rate: 0,
        };
        assert_eq!(utterance.duration_ms(), 0);
    }

    fn config_16k() -> EndpointConfig {
        EndpointConfig {
            initial_silence_ms: 200,
            ..EndpointConfig::new(16_000)
        }
    }

    #[test]
    fn test_stream_error_is_device_error() {
        let (tx, rx) = mpsc::channel();
        tx.send(StreamEvent::Failed("device unplugged".into())).unwrap();
        let running = AtomicBool::new(true);

        let result = collect_utterance(&rx, 1, config_16k(), &running, Duration::from_secs(5));
        match result {
            Err(VoiceError::DeviceError(msg)) => assert!(msg.contains("device unplugged")),
            other => panic!("expected device error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_silent_device_hits_deadline() {
        // 送信側は生きているがサンプルが届かない
        let (_tx, rx) = mpsc::channel::<StreamEvent>();
        let running = AtomicBool::new(true);

        let started = Instant::now();
        let result = collect_utterance(&rx, 1, config_16k(), &running, Duration::from_millis(150));
        assert!(matches!(result, Err(VoiceError::DeviceError(_))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_silence_frames_time_out_before_deadline() {
        let (tx, rx) = mpsc::channel();
        // 200ms 分を超える無音
        tx.send(StreamEvent::Samples(vec![0.0; 16_000])).unwrap();
        let running = AtomicBool::new(true);

        let result = collect_utterance(&rx, 1, config_16k(), &running, Duration::from_secs(5));
        assert!(matches!(result, Ok(CaptureResult::InitialSilenceTimeout)));
    }

    #[test]
    fn test_stopped_flag_aborts() {
        let (_tx, rx) = mpsc::channel::<StreamEvent>();
        let running = AtomicBool::new(false);

        let result = collect_utterance(&rx, 1, config_16k(), &running, Duration::from_secs(5));
        assert!(matches!(result, Ok(CaptureResult::Aborted)));
    }

    #[test]
    fn test_closed_stream_is_device_error() {
        let (tx, rx) = mpsc::channel::<StreamEvent>();
        drop(tx);
        let running = AtomicBool::new(true);

        let result = collect_utterance(&rx, 1, config_16k(), &running, Duration::from_secs(5));
        assert!(matches!(result, Err(VoiceError::DeviceError(_))));
    }
}
