//! 認識ループ
//!
//! 1回認識 → 結果で分岐 → 表示 → (翻訳 → 朗読) → 待機 を停止フラグが
//! 下りるまで繰り返す。CLI と GUI は `Pacing` と `EventSink` だけが異なる。

pub mod console;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::db::repository::NewEntry;
use crate::db::HistoryStore;
use crate::error::AppError;
use crate::translate::Translator;
use crate::tts::{SpeakResult, Speaker};
use crate::voice::pipeline::RecognizeOnce;
use crate::voice::{CancellationDetails, CancellationReason, NoMatchReason, RecognitionOutcome};

pub use console::ConsoleSink;

/// 待機中に停止フラグを確認する間隔
const PAUSE_SLICE: Duration = Duration::from_millis(50);

/// ループから UI へ通知するイベント
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Listening,
    Recognized(String),
    NoMatch(NoMatchReason),
    Canceled(CancellationDetails),
    Translating,
    Translated { source: String, translation: String },
    TranslationFailed(String),
    Speaking(String),
    SpeakCompleted,
    SpeakFailed(String),
    NothingToSpeak,
    /// 想定外のローカルエラー（マイクなど）
    Error(String),
    Stopped,
}

/// イベントの受け取り先（CLI はコンソール表示、GUI はチャンネル）
pub trait EventSink: Send + Sync {
    fn emit(&self, event: SessionEvent);
}

/// 反復ごとの待機とエラー時の振る舞い
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    /// 毎回の反復後の待機
    pub idle: Duration,
    /// エラー付きキャンセル・想定外エラーの後の待機
    pub error_backoff: Duration,
    /// 想定外エラーでループを終える
    pub stop_on_error: bool,
}

impl Pacing {
    pub fn cli() -> Self {
        Self {
            idle: Duration::from_millis(500),
            error_backoff: Duration::ZERO,
            stop_on_error: true,
        }
    }

    pub fn gui() -> Self {
        Self {
            idle: Duration::from_millis(100),
            error_backoff: Duration::from_secs(2),
            stop_on_error: false,
        }
    }
}

/// 翻訳段の設定
pub struct TranslationStage {
    pub translator: Arc<dyn Translator>,
    pub from: String,
    pub to: String,
}

/// 1回の反復の結果
#[derive(Debug, Clone, Copy, PartialEq)]
enum Iteration {
    Continue,
    Backoff,
}

/// 停止フラグを確認しながら待つ
async fn pause(running: &AtomicBool, duration: Duration) {
    let mut remaining = duration;
    while !remaining.is_zero() && running.load(Ordering::SeqCst) {
        let step = remaining.min(PAUSE_SLICE);
        tokio::time::sleep(step).await;
        remaining -= step;
    }
}

/// speak-text を実行し、結果をイベントとして通知する
///
/// 進行中の朗読があれば何も通知せずに戻る。再生まで完了したら true。
pub async fn speak_and_report(speaker: &Speaker, text: &str, sink: &dyn EventSink) -> bool {
    if text.trim().is_empty() {
        sink.emit(SessionEvent::NothingToSpeak);
        return false;
    }
    if speaker.is_speaking() {
        debug!("auto-speak skipped: already speaking");
        return false;
    }

    sink.emit(SessionEvent::Speaking(text.to_string()));
    match speaker.speak(text).await {
        Ok(SpeakResult::Completed) => {
            sink.emit(SessionEvent::SpeakCompleted);
            true
        }
        Ok(SpeakResult::NothingToSpeak) => {
            sink.emit(SessionEvent::NothingToSpeak);
            false
        }
        Ok(SpeakResult::AlreadySpeaking) => {
            debug!("speak skipped: already speaking");
            false
        }
        Ok(SpeakResult::Canceled(details)) => {
            warn!(reason = %details.reason, "synthesis canceled: {}", details.error_details);
            sink.emit(SessionEvent::SpeakFailed(format!(
                "{}: {}",
                details.reason, details.error_details
            )));
            false
        }
        Err(e) => {
            warn!("speak failed: {}", e);
            sink.emit(SessionEvent::SpeakFailed(e.to_string()));
            false
        }
    }
}

/// 認識 → 翻訳 → 朗読 のループ
pub struct RecognitionLoop {
    recognizer: Arc<dyn RecognizeOnce>,
    source_language: String,
    sink: Arc<dyn EventSink>,
    pacing: Pacing,
    translation: Option<TranslationStage>,
    speaker: Option<Arc<Speaker>>,
    history: Option<Arc<HistoryStore>>,
}

impl RecognitionLoop {
    pub fn new(
        recognizer: Arc<dyn RecognizeOnce>,
        source_language: &str,
        sink: Arc<dyn EventSink>,
        pacing: Pacing,
    ) -> Self {
        Self {
            recognizer,
            source_language: source_language.to_string(),
            sink,
            pacing,
            translation: None,
            speaker: None,
            history: None,
        }
    }

    pub fn with_translation(mut self, stage: TranslationStage) -> Self {
        self.translation = Some(stage);
        self
    }

    /// 翻訳成功後に自動で朗読する
    pub fn with_speaker(mut self, speaker: Arc<Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// `running` が false になるまでループする
    ///
    /// `Pacing::stop_on_error` の場合、想定外エラーでループを終えてエラーを返す。
    pub async fn run(&self, running: Arc<AtomicBool>) -> Result<(), AppError> {
        info!(language = %self.source_language, "recognition loop started");

        while running.load(Ordering::SeqCst) {
            match self.run_once(&running).await {
                Ok(Iteration::Continue) => {}
                Ok(Iteration::Backoff) => pause(&running, self.pacing.error_backoff).await,
                Err(e) => {
                    warn!("recognition loop error: {}", e);
                    self.sink.emit(SessionEvent::Error(e.to_string()));
                    if self.pacing.stop_on_error {
                        self.sink.emit(SessionEvent::Stopped);
                        return Err(e);
                    }
                    pause(&running, self.pacing.error_backoff).await;
                }
            }

            if running.load(Ordering::SeqCst) {
                pause(&running, self.pacing.idle).await;
            }
        }

        info!("recognition loop stopped");
        self.sink.emit(SessionEvent::Stopped);
        Ok(())
    }

    async fn run_once(&self, running: &Arc<AtomicBool>) -> Result<Iteration, AppError> {
        self.sink.emit(SessionEvent::Listening);
        let outcome = self.recognizer.recognize_once(Arc::clone(running)).await?;

        match outcome {
            RecognitionOutcome::Recognized(text) => {
                info!(text = %text, "recognized");
                self.sink.emit(SessionEvent::Recognized(text.clone()));

                let translation = match &self.translation {
                    Some(stage) => self.translate(stage, &text).await,
                    None => None,
                };
                let spoken_voice = match (&self.speaker, &translation) {
                    (Some(speaker), Some(translated)) => {
                        let voice = speaker.voice().name;
                        speak_and_report(speaker, translated, self.sink.as_ref())
                            .await
                            .then_some(voice)
                    }
                    _ => None,
                };
                self.record_history(&text, translation.as_deref(), spoken_voice);
                Ok(Iteration::Continue)
            }
            RecognitionOutcome::NoMatch(reason) => {
                debug!(%reason, "no match");
                self.sink.emit(SessionEvent::NoMatch(reason));
                Ok(Iteration::Continue)
            }
            RecognitionOutcome::Canceled(details) => {
                // 停止操作による中断は通知しない
                if details.reason == CancellationReason::EndOfStream
                    && !running.load(Ordering::SeqCst)
                {
                    return Ok(Iteration::Continue);
                }
                warn!(reason = %details.reason, "recognition canceled: {}", details.error_details);
                let is_error = details.is_error();
                self.sink.emit(SessionEvent::Canceled(details));
                Ok(if is_error {
                    Iteration::Backoff
                } else {
                    Iteration::Continue
                })
            }
        }
    }

    async fn translate(&self, stage: &TranslationStage, text: &str) -> Option<String> {
        self.sink.emit(SessionEvent::Translating);
        match stage.translator.translate(text, &stage.from, &stage.to).await {
            Ok(translation) => {
                info!(translation = %translation, "translated");
                self.sink.emit(SessionEvent::Translated {
                    source: text.to_string(),
                    translation: translation.clone(),
                });
                Some(translation)
            }
            Err(e) => {
                warn!("translation failed: {}", e);
                self.sink.emit(SessionEvent::TranslationFailed(e.to_string()));
                None
            }
        }
    }

    /// 訳文があるときだけ翻訳先言語を、朗読できたときだけ音声を残す
    fn record_history(&self, text: &str, translation: Option<&str>, voice: Option<String>) {
        let Some(history) = &self.history else {
            return;
        };
        let entry = NewEntry {
            recognized_text: text.to_string(),
            translated_text: translation.map(str::to_string),
            source_language: self.source_language.clone(),
            target_language: translation
                .and(self.translation.as_ref())
                .map(|stage| stage.to.clone()),
            voice,
        };
        if let Err(e) = history.record(&entry) {
            warn!("failed to save history: {}", e);
        }
    }
}
