pub mod azure;
pub mod playback;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::locale_of;
use crate::voice::CancellationDetails;
use playback::AudioSink;

/// 音声合成・再生のエラー型
///
/// サービス側の失敗は `SynthesisOutcome::Canceled` で返すため、
/// ここに来るのは端末側の問題のみ。
#[derive(Debug)]
pub enum TtsError {
    /// HTTP クライアントの初期化エラー
    ClientError(String),
    /// 出力デバイス・再生のエラー
    PlaybackError(String),
    /// 再生タスクの失敗
    TaskError(String),
}

impl std::fmt::Display for TtsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TtsError::ClientError(msg) => write!(f, "HTTP client error: {}", msg),
            TtsError::PlaybackError(msg) => write!(f, "Playback error: {}", msg),
            TtsError::TaskError(msg) => write!(f, "Playback task failed: {}", msg),
        }
    }
}

impl std::error::Error for TtsError {}

/// 朗読に使う音声（名前とロケール）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSelection {
    pub name: String,
    pub locale: String,
}

impl VoiceSelection {
    /// 音声名からロケールを導く（`en-GB-SoniaNeural` → `en-GB`）
    pub fn from_voice_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            locale: locale_of(name),
        }
    }
}

/// 音声合成の結果
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisOutcome {
    /// 合成できた（WAV バイト列）
    Completed(Vec<u8>),
    Canceled(CancellationDetails),
}

/// 音声合成サービスの抽象trait
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelection,
    ) -> Result<SynthesisOutcome, TtsError>;
}

/// speak-text の結果
#[derive(Debug, Clone, PartialEq)]
pub enum SpeakResult {
    /// 再生まで完了した
    Completed,
    /// 空のテキストだった
    NothingToSpeak,
    /// 別の朗読が進行中だった
    AlreadySpeaking,
    Canceled(CancellationDetails),
}

/// 朗読中フラグを解除する（途中で future が破棄されても戻す）
struct SpeakingGuard<'a>(&'a AtomicBool);

impl Drop for SpeakingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// 合成して再生する（speak-text）
///
/// 同時に1つの朗読しか行わない。進行中に呼ばれた場合は何もせず
/// `AlreadySpeaking` を返す。
pub struct Speaker {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    sink: Arc<dyn AudioSink>,
    voice: Mutex<VoiceSelection>,
    speaking: AtomicBool,
}

impl Speaker {
    pub fn new(
        synthesizer: Arc<dyn SpeechSynthesizer>,
        sink: Arc<dyn AudioSink>,
        voice_name: &str,
    ) -> Self {
        Self {
            synthesizer,
            sink,
            voice: Mutex::new(VoiceSelection::from_voice_name(voice_name)),
            speaking: AtomicBool::new(false),
        }
    }

    pub fn voice(&self) -> VoiceSelection {
        match self.voice.lock() {
            Ok(voice) => voice.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 以降の朗読で使う音声を切り替える
    pub fn set_voice(&self, voice_name: &str) {
        let selection = VoiceSelection::from_voice_name(voice_name);
        info!(voice = %selection.name, locale = %selection.locale, "voice changed");
        match self.voice.lock() {
            Ok(mut voice) => *voice = selection,
            Err(poisoned) => *poisoned.into_inner() = selection,
        }
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    pub async fn speak(&self, text: &str) -> Result<SpeakResult, TtsError> {
        if text.trim().is_empty() {
            return Ok(SpeakResult::NothingToSpeak);
        }
        if self
            .speaking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("speak skipped: already speaking");
            return Ok(SpeakResult::AlreadySpeaking);
        }

        let _guard = SpeakingGuard(&self.speaking);
        self.synthesize_and_play(text).await
    }

    async fn synthesize_and_play(&self, text: &str) -> Result<SpeakResult, TtsError> {
        let voice = self.voice();
        match self.synthesizer.synthesize(text, &voice).await? {
            SynthesisOutcome::Completed(wav) => {
                debug!(bytes = wav.len(), voice = %voice.name, "playing synthesized audio");
                let sink = Arc::clone(&self.sink);
                tokio::task::spawn_blocking(move || sink.play_wav(&wav))
                    .await
                    .map_err(|e| TtsError::TaskError(e.to_string()))??;
                Ok(SpeakResult::Completed)
            }
            SynthesisOutcome::Canceled(details) => Ok(SpeakResult::Canceled(details)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct FakeSynthesizer {
        outcome: SynthesisOutcome,
        calls: AtomicUsize,
        last_voice: Mutex<Option<VoiceSelection>>,
    }

    impl FakeSynthesizer {
        fn new(outcome: SynthesisOutcome) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                calls: AtomicUsize::new(0),
                last_voice: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSynthesizer {
        async fn synthesize(
            &self,
            _text: &str,
            voice: &VoiceSelection,
        ) -> Result<SynthesisOutcome, TtsError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_voice.lock().unwrap() = Some(voice.clone());
            Ok(self.outcome.clone())
        }
    }

    #[derive(Default)]
    struct CountingSink {
        played: AtomicUsize,
    }

    impl AudioSink for CountingSink {
        fn play_wav(&self, _wav: &[u8]) -> Result<(), TtsError> {
            self.played.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_voice_selection_locale() {
        let voice = VoiceSelection::from_voice_name("en-GB-SoniaNeural");
        assert_eq!(voice.locale, "en-GB");
        assert_eq!(voice.name, "en-GB-SoniaNeural");
    }

    #[tokio::test]
    async fn test_speak_plays_completed_audio() {
        let synth = FakeSynthesizer::new(SynthesisOutcome::Completed(vec![1, 2, 3]));
        let sink = Arc::new(CountingSink::default());
        let speaker = Speaker::new(synth.clone(), sink.clone(), "en-US-JennyNeural");

        assert_eq!(speaker.speak("Hello").await.unwrap(), SpeakResult::Completed);
        assert_eq!(sink.played.load(Ordering::SeqCst), 1);
        assert!(!speaker.is_speaking());
    }

    #[tokio::test]
    async fn test_speak_empty_text() {
        let synth = FakeSynthesizer::new(SynthesisOutcome::Completed(vec![]));
        let sink = Arc::new(CountingSink::default());
        let speaker = Speaker::new(synth.clone(), sink, "en-US-JennyNeural");

        assert_eq!(speaker.speak("   ").await.unwrap(), SpeakResult::NothingToSpeak);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_speak_canceled_does_not_play() {
        let synth = FakeSynthesizer::new(SynthesisOutcome::Canceled(
            CancellationDetails::error("HTTP 401"),
        ));
        let sink = Arc::new(CountingSink::default());
        let speaker = Speaker::new(synth, sink.clone(), "en-US-JennyNeural");

        match speaker.speak("Hello").await.unwrap() {
            SpeakResult::Canceled(details) => assert!(details.is_error()),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(sink.played.load(Ordering::SeqCst), 0);
        assert!(!speaker.is_speaking());
    }

    #[tokio::test]
    async fn test_speak_skipped_while_speaking() {
        let synth = FakeSynthesizer::new(SynthesisOutcome::Completed(vec![1]));
        let sink = Arc::new(CountingSink::default());
        let speaker = Speaker::new(synth.clone(), sink, "en-US-GuyNeural");
        speaker.speaking.store(true, Ordering::SeqCst);

        assert_eq!(speaker.speak("Hello").await.unwrap(), SpeakResult::AlreadySpeaking);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_set_voice_applies_to_next_speak() {
        let synth = FakeSynthesizer::new(SynthesisOutcome::Completed(vec![1]));
        let sink = Arc::new(CountingSink::default());
        let speaker = Speaker::new(synth.clone(), sink, "en-US-JennyNeural");
        speaker.set_voice("en-GB-SoniaNeural");
        speaker.speak("Hello").await.unwrap();

        let voice = synth.last_voice.lock().unwrap().clone().unwrap();
        assert_eq!(voice.locale, "en-GB");
    }
}
