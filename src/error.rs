use thiserror::Error;

use crate::translate::TranslateError;
use crate::tts::TtsError;
use crate::voice::VoiceError;

/// アプリケーション共通エラー型
///
/// 各モジュールのエラー（音声認識・翻訳・音声合成）はここに集約され、
/// CLI / GUI の境界でメッセージとして表示される。
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech recognition error: {0}")]
    Speech(#[from] VoiceError),

    #[error("Translation error: {0}")]
    Translation(#[from] TranslateError),

    #[error("Speech synthesis error: {0}")]
    Synthesis(#[from] TtsError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

impl From<AppError> for String {
    fn from(e: AppError) -> Self {
        e.to_string()
    }
}
