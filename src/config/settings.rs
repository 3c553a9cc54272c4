use std::path::PathBuf;

use tracing::{info, warn};

use crate::error::AppError;

/// `.env` テンプレートに残っているリージョンのプレースホルダー
pub const PLACEHOLDER_REGION: &str = "your_azure_region_here";

/// 翻訳リクエストのリージョンヘッダーに使う既定値
const DEFAULT_TRANSLATOR_REGION: &str = "eastus";

pub const DEFAULT_RECOGNITION_LANGUAGE: &str = "zh-CN";
pub const DEFAULT_TRANSLATION_FROM: &str = "zh-Hans";
pub const DEFAULT_TRANSLATION_TO: &str = "en";
pub const DEFAULT_VOICE: &str = "en-US-JennyNeural";

/// カレントディレクトリの `.env` を読み込む（既存の環境変数を上書きする）
///
/// ファイルが無くてもエラーにはしない。起動時の診断のため、
/// 作業ディレクトリと `.env` の有無をログに出す。
pub fn load_dotenv() -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_path = cwd.join(".env");
    let exists = env_path.exists();

    info!(cwd = %cwd.display(), "working directory");
    info!(path = %env_path.display(), exists, ".env file");

    if exists {
        if let Err(e) = dotenvy::from_path_override(&env_path) {
            warn!("failed to load {}: {}", env_path.display(), e);
        }
    }
    env_path
}

/// プロセス環境変数を参照する lookup（空文字列は未設定として扱う）
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// キーの先頭4文字と末尾4文字だけを残してマスクする
///
/// 8文字以下のキーはすべて `*` にする。
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}

/// 音声サービス（認識・合成）の接続情報
#[derive(Debug, Clone)]
pub struct AzureSpeechSettings {
    pub key: String,
    pub region: String,
}

impl AzureSpeechSettings {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = lookup("AZURE_SPEECH_KEY");
        let region = lookup("AZURE_SPEECH_REGION");

        match &key {
            Some(k) => info!(key = %mask_key(k), "speech service key"),
            None => warn!("speech service key is not set"),
        }
        info!(region = ?region, "speech service region");

        let (Some(key), Some(region)) = (key, region) else {
            return Err(AppError::Config(
                "Set AZURE_SPEECH_KEY and AZURE_SPEECH_REGION in the .env file".to_string(),
            ));
        };

        if region == PLACEHOLDER_REGION {
            return Err(AppError::Config(
                "Replace AZURE_SPEECH_REGION in the .env file with an actual region name"
                    .to_string(),
            ));
        }

        Ok(Self { key, region })
    }
}

/// 翻訳サービスの接続情報
#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub key: String,
    pub endpoint: String,
    /// `Ocp-Apim-Subscription-Region` ヘッダーに入れるリージョン
    pub region: String,
}

impl TranslatorSettings {
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (Some(key), Some(endpoint)) = (
            lookup("AZURE_TRANSLATOR_KEY"),
            lookup("AZURE_TRANSLATOR_ENDPOINT"),
        ) else {
            return Err(AppError::Config(
                "Set AZURE_TRANSLATOR_KEY and AZURE_TRANSLATOR_ENDPOINT in the .env file"
                    .to_string(),
            ));
        };

        let region = lookup("AZURE_SPEECH_REGION")
            .unwrap_or_else(|| DEFAULT_TRANSLATOR_REGION.to_string());

        info!(key = %mask_key(&key), endpoint = %endpoint, "translator settings");

        Ok(Self {
            key,
            endpoint,
            region,
        })
    }
}

/// 認識・翻訳・朗読で使う言語設定
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageSettings {
    /// 音声認識の言語 (BCP 47, 例: "zh-CN")
    pub recognition: String,
    /// 翻訳元の言語コード (例: "zh-Hans")
    pub translate_from: String,
    /// 翻訳先の言語コード (例: "en")
    pub translate_to: String,
    /// 朗読に使う音声名 (例: "en-US-JennyNeural")
    pub voice: String,
}

impl Default for LanguageSettings {
    fn default() -> Self {
        Self {
            recognition: DEFAULT_RECOGNITION_LANGUAGE.to_string(),
            translate_from: DEFAULT_TRANSLATION_FROM.to_string(),
            translate_to: DEFAULT_TRANSLATION_TO.to_string(),
            voice: DEFAULT_VOICE.to_string(),
        }
    }
}

impl LanguageSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            recognition: lookup("RECOGNITION_LANGUAGE").unwrap_or(defaults.recognition),
            translate_from: lookup("TRANSLATION_FROM").unwrap_or(defaults.translate_from),
            translate_to: lookup("TRANSLATION_TO").unwrap_or(defaults.translate_to),
            voice: lookup("TTS_VOICE").unwrap_or(defaults.voice),
        }
    }
}

/// 履歴DBのパス（`HISTORY_DB_PATH` が設定されている場合のみ履歴を保存する）
pub fn history_db_path() -> Option<PathBuf> {
    env_lookup("HISTORY_DB_PATH").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_mask_key_keeps_edges() {
        assert_eq!(mask_key("abcd1234efgh"), "abcd****efgh");
    }

    #[test]
    fn test_mask_key_short_key_fully_masked() {
        assert_eq!(mask_key("abcdefgh"), "********");
        assert_eq!(mask_key("abc"), "***");
        assert_eq!(mask_key(""), "");
    }

    #[test]
    fn test_speech_settings_ok() {
        let settings = AzureSpeechSettings::from_lookup(lookup_from(&[
            ("AZURE_SPEECH_KEY", "secret-key-value"),
            ("AZURE_SPEECH_REGION", "eastasia"),
        ]))
        .unwrap();
        assert_eq!(settings.key, "secret-key-value");
        assert_eq!(settings.region, "eastasia");
    }

    #[test]
    fn test_speech_settings_missing_region() {
        let result = AzureSpeechSettings::from_lookup(lookup_from(&[(
            "AZURE_SPEECH_KEY",
            "secret-key-value",
        )]));
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_speech_settings_placeholder_region() {
        let result = AzureSpeechSettings::from_lookup(lookup_from(&[
            ("AZURE_SPEECH_KEY", "secret-key-value"),
            ("AZURE_SPEECH_REGION", PLACEHOLDER_REGION),
        ]));
        let err = result.unwrap_err().to_string();
        assert!(err.contains("actual region"));
    }

    #[test]
    fn test_translator_settings_region_fallback() {
        let settings = TranslatorSettings::from_lookup(lookup_from(&[
            ("AZURE_TRANSLATOR_KEY", "translator-key"),
            ("AZURE_TRANSLATOR_ENDPOINT", "https://api.cognitive.microsofttranslator.com"),
        ]))
        .unwrap();
        assert_eq!(settings.region, "eastus");
    }

    #[test]
    fn test_translator_settings_uses_speech_region() {
        let settings = TranslatorSettings::from_lookup(lookup_from(&[
            ("AZURE_TRANSLATOR_KEY", "translator-key"),
            ("AZURE_TRANSLATOR_ENDPOINT", "https://api.cognitive.microsofttranslator.com"),
            ("AZURE_SPEECH_REGION", "japaneast"),
        ]))
        .unwrap();
        assert_eq!(settings.region, "japaneast");
    }

    #[test]
    fn test_translator_settings_missing_endpoint() {
        let result =
            TranslatorSettings::from_lookup(lookup_from(&[("AZURE_TRANSLATOR_KEY", "k")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_language_settings_defaults_and_overrides() {
        let defaults = LanguageSettings::from_lookup(lookup_from(&[]));
        assert_eq!(defaults, LanguageSettings::default());
        assert_eq!(defaults.recognition, "zh-CN");

        let custom = LanguageSettings::from_lookup(lookup_from(&[
            ("RECOGNITION_LANGUAGE", "ja-JP"),
            ("TRANSLATION_FROM", "ja"),
        ]));
        assert_eq!(custom.recognition, "ja-JP");
        assert_eq!(custom.translate_from, "ja");
        assert_eq!(custom.translate_to, "en");
    }
}
