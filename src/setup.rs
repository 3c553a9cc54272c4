//! 各プログラム共通の組み立て処理
//!
//! 設定の読み込みからサービスクライアント・ループの部品を作るまでをまとめる。

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{history_db_path, AzureSpeechSettings, LanguageSettings, TranslatorSettings};
use crate::db::HistoryStore;
use crate::error::AppError;
use crate::session::TranslationStage;
use crate::translate::azure::AzureTranslator;
use crate::tts::azure::AzureSynthesizer;
use crate::tts::playback::CpalSink;
use crate::tts::Speaker;
use crate::voice::azure_stt::AzureSpeechRecognizer;
use crate::voice::capture::MicrophoneSource;
use crate::voice::pipeline::{MicrophoneRecognizer, RecognizeOnce};

/// 起動時に読み込む設定一式
#[derive(Debug, Clone)]
pub struct StartupConfig {
    pub speech: AzureSpeechSettings,
    pub languages: LanguageSettings,
    /// 翻訳を使うプログラムだけが読み込む
    pub translator: Option<TranslatorSettings>,
}

impl StartupConfig {
    /// `.env` を読み込み、音声サービスと言語の設定を確定する
    pub fn load() -> Result<Self, AppError> {
        crate::config::load_dotenv();
        let speech = AzureSpeechSettings::from_env()?;
        let languages = LanguageSettings::from_env();
        info!(
            recognition = %languages.recognition,
            from = %languages.translate_from,
            to = %languages.translate_to,
            voice = %languages.voice,
            "language settings"
        );
        Ok(Self {
            speech,
            languages,
            translator: None,
        })
    }

    /// 翻訳サービスの設定も必須として読み込む
    pub fn load_with_translator() -> Result<Self, AppError> {
        let mut config = Self::load()?;
        config.translator = Some(TranslatorSettings::from_env()?);
        Ok(config)
    }

    pub fn translator(&self) -> Result<&TranslatorSettings, AppError> {
        self.translator.as_ref().ok_or_else(|| {
            AppError::Config(
                "Set AZURE_TRANSLATOR_KEY and AZURE_TRANSLATOR_ENDPOINT in the .env file"
                    .to_string(),
            )
        })
    }
}

/// デフォルトマイクで1発話ずつ認識する recognizer
pub fn build_recognizer(
    speech: &AzureSpeechSettings,
    language: &str,
) -> Result<Arc<dyn RecognizeOnce>, AppError> {
    let client = AzureSpeechRecognizer::new(speech)?;
    Ok(Arc::new(MicrophoneRecognizer::new(
        client,
        Arc::new(MicrophoneSource::new()),
        language,
    )))
}

/// 翻訳段
pub fn build_translation(
    settings: &TranslatorSettings,
    languages: &LanguageSettings,
) -> Result<TranslationStage, AppError> {
    let translator = AzureTranslator::new(settings)?;
    Ok(TranslationStage {
        translator: Arc::new(translator),
        from: languages.translate_from.clone(),
        to: languages.translate_to.clone(),
    })
}

/// 合成 + デフォルト出力デバイスでの再生
pub fn build_speaker(speech: &AzureSpeechSettings, voice: &str) -> Result<Arc<Speaker>, AppError> {
    let synthesizer = AzureSynthesizer::new(speech)?;
    Ok(Arc::new(Speaker::new(
        Arc::new(synthesizer),
        Arc::new(CpalSink::new()),
        voice,
    )))
}

/// `HISTORY_DB_PATH` が設定されていれば履歴DBを開く
///
/// 開けなかった場合は警告だけ出して履歴なしで続ける。
pub fn open_history() -> Option<Arc<HistoryStore>> {
    let path = history_db_path()?;
    match HistoryStore::open(&path) {
        Ok(store) => {
            info!(path = %path.display(), "history enabled");
            Some(Arc::new(store))
        }
        Err(e) => {
            warn!("failed to open history at {}: {}", path.display(), e);
            None
        }
    }
}
