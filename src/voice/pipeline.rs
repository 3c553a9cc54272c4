use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::voice::capture::{CaptureResult, UtteranceSource};
use crate::voice::format::{self, MONO_CHANNELS, SPEECH_SAMPLE_RATE};
use crate::voice::resample::resample_all;
use crate::voice::{
    CancellationDetails, NoMatchReason, RecognitionOutcome, SpeechRecognizer, VoiceError,
};

/// 1回分の認識（録音から結果まで）を行うインターフェース
///
/// ループ側はこのトレイトだけに依存し、テストでは台本どおりの結果を返す
/// 実装に差し替える。
#[async_trait]
pub trait RecognizeOnce: Send + Sync {
    async fn recognize_once(
        &self,
        running: Arc<AtomicBool>,
    ) -> Result<RecognitionOutcome, VoiceError>;
}

/// マイク入力 → 16kHz WAV → 認識サービス のパイプライン
pub struct MicrophoneRecognizer<R: SpeechRecognizer> {
    recognizer: R,
    source: Arc<dyn UtteranceSource>,
    language: String,
}

impl<R: SpeechRecognizer> MicrophoneRecognizer<R> {
    pub fn new(recognizer: R, source: Arc<dyn UtteranceSource>, language: &str) -> Self {
        Self {
            recognizer,
            source,
            language: language.to_string(),
        }
    }

    /// 録音済みの1発話を 16kHz モノラル WAV にして認識する
    async fn recognize_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<RecognitionOutcome, VoiceError> {
        let resampled = resample_all(samples, sample_rate, SPEECH_SAMPLE_RATE)?;
        let wav_data = format::pcm_f32_to_wav(&resampled, SPEECH_SAMPLE_RATE, MONO_CHANNELS)?;
        debug!(bytes = wav_data.len(), language = %self.language, "sending utterance");
        self.recognizer.recognize(&wav_data, &self.language).await
    }
}

#[async_trait]
impl<R: SpeechRecognizer> RecognizeOnce for MicrophoneRecognizer<R> {
    async fn recognize_once(
        &self,
        running: Arc<AtomicBool>,
    ) -> Result<RecognitionOutcome, VoiceError> {
        // cpal の録音はブロッキングなので専用スレッドで待つ
        let source = Arc::clone(&self.source);
        let captured = tokio::task::spawn_blocking(move || source.capture(&running))
            .await
            .map_err(|e| VoiceError::PipelineError(format!("Capture task failed: {}", e)))??;

        match captured {
            CaptureResult::Utterance(utterance) => {
                self.recognize_samples(&utterance.samples, utterance.sample_rate)
                    .await
            }
            CaptureResult::InitialSilenceTimeout => Ok(RecognitionOutcome::NoMatch(
                NoMatchReason::InitialSilenceTimeout,
            )),
            CaptureResult::Aborted => Ok(RecognitionOutcome::Canceled(
                CancellationDetails::end_of_stream("Recognition stopped"),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::capture::CapturedUtterance;
    use crate::voice::format::decode_wav;
    use crate::voice::CancellationReason;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// 固定の録音結果を返す入力源
    struct FakeSource {
        result: Mutex<Option<CaptureResult>>,
    }

    impl FakeSource {
        fn new(result: CaptureResult) -> Arc<Self> {
            Arc::new(Self {
                result: Mutex::new(Some(result)),
            })
        }
    }

    impl UtteranceSource for FakeSource {
        fn capture(&self, _running: &AtomicBool) -> Result<CaptureResult, VoiceError> {
            self.result
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| VoiceError::DeviceError("exhausted".into()))
        }
    }

    /// 受け取った WAV を記録するだけの認識器
    struct RecordingRecognizer {
        calls: AtomicUsize,
        last_wav: Mutex<Vec<u8>>,
    }

    impl RecordingRecognizer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                last_wav: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SpeechRecognizer for RecordingRecognizer {
        async fn recognize(
            &self,
            wav_data: &[u8],
            language: &str,
        ) -> Result<RecognitionOutcome, VoiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_wav.lock().unwrap() = wav_data.to_vec();
            Ok(RecognitionOutcome::Recognized(format!("ok:{}", language)))
        }
    }

    fn running() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(true))
    }

    #[tokio::test]
    async fn test_utterance_is_resampled_and_recognized() {
        let source = FakeSource::new(CaptureResult::Utterance(CapturedUtterance {
            samples: vec![0.1; 48_000],
            sample_rate: 48_000,
        }));
        let pipeline = MicrophoneRecognizer::new(RecordingRecognizer::new(), source, "zh-CN");

        let outcome = pipeline.recognize_once(running()).await.unwrap();
        assert_eq!(outcome, RecognitionOutcome::Recognized("ok:zh-CN".into()));

        let wav = pipeline.recognizer.last_wav.lock().unwrap().clone();
        let decoded = decode_wav(&wav).unwrap();
        assert_eq!(decoded.sample_rate, SPEECH_SAMPLE_RATE);
        assert_eq!(decoded.channels, MONO_CHANNELS);
        assert!((decoded.samples.len() as isize - 16_000).abs() <= 400);
    }

    #[tokio::test]
    async fn test_initial_silence_skips_service() {
        let source = FakeSource::new(CaptureResult::InitialSilenceTimeout);
        let pipeline = MicrophoneRecognizer::new(RecordingRecognizer::new(), source, "zh-CN");

        let outcome = pipeline.recognize_once(running()).await.unwrap();
        assert_eq!(
            outcome,
            RecognitionOutcome::NoMatch(NoMatchReason::InitialSilenceTimeout)
        );
        assert_eq!(pipeline.recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_aborted_capture_is_end_of_stream() {
        let source = FakeSource::new(CaptureResult::Aborted);
        let pipeline = MicrophoneRecognizer::new(RecordingRecognizer::new(), source, "zh-CN");

        match pipeline.recognize_once(running()).await.unwrap() {
            RecognitionOutcome::Canceled(details) => {
                assert_eq!(details.reason, CancellationReason::EndOfStream)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(pipeline.recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_device_error_propagates() {
        let source = FakeSource::new(CaptureResult::Aborted);
        source.result.lock().unwrap().take();
        let pipeline = MicrophoneRecognizer::new(RecordingRecognizer::new(), source, "zh-CN");

        let result = pipeline.recognize_once(running()).await;
        assert!(matches!(result, Err(VoiceError::DeviceError(_))));
    }
}
