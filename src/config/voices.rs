use serde::Deserialize;
use std::path::Path;

use crate::error::AppError;

/// 朗読音声の選択肢
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VoiceOption {
    /// 合成サービスの音声名 (例: "en-US-JennyNeural")
    pub name: String,
    /// ドロップダウンに表示するラベル
    pub label: String,
}

#[derive(Debug, Deserialize)]
struct VoicesFile {
    voices: Vec<VoiceOption>,
}

const FALLBACK_VOICES_YAML: &str = include_str!("../../config/voices.yaml");
const DEV_VOICES_PATH: &str = "config/voices.yaml";

/// 音声名の先頭2セグメントをロケールとして返す
///
/// セグメントが2つ未満の名前はそのまま返す。
pub fn locale_of(voice_name: &str) -> String {
    let mut parts = voice_name.split('-');
    match (parts.next(), parts.next()) {
        (Some(lang), Some(region)) if !lang.is_empty() && !region.is_empty() => {
            format!("{}-{}", lang, region)
        }
        _ => voice_name.to_string(),
    }
}

/// 音声一覧を読み込む
///
/// 読み込み優先順位:
/// 1. ./config/voices.yaml（カレントディレクトリ）
/// 2. コンパイル時埋め込み（フォールバック）
pub fn load_voices() -> Result<Vec<VoiceOption>, AppError> {
    let dev_path = Path::new(DEV_VOICES_PATH);
    if dev_path.exists() {
        return load_from_path(dev_path);
    }
    parse_yaml(FALLBACK_VOICES_YAML)
}

fn load_from_path(path: &Path) -> Result<Vec<VoiceOption>, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
    parse_yaml(&content)
}

fn parse_yaml(content: &str) -> Result<Vec<VoiceOption>, AppError> {
    let file: VoicesFile = serde_yaml::from_str(content)
        .map_err(|e| AppError::Config(format!("Failed to parse voices.yaml: {}", e)))?;
    if file.voices.is_empty() {
        return Err(AppError::Config("voices.yaml lists no voices".to_string()));
    }
    Ok(file.voices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_voices_parse() {
        let voices = parse_yaml(FALLBACK_VOICES_YAML).unwrap();
        assert_eq!(voices.len(), 4);
        assert_eq!(voices[0].name, "en-US-JennyNeural");
        assert!(voices.iter().any(|v| v.name == "en-GB-SoniaNeural"));
    }

    #[test]
    fn test_locale_of_voice_name() {
        assert_eq!(locale_of("en-US-JennyNeural"), "en-US");
        assert_eq!(locale_of("en-GB-SoniaNeural"), "en-GB");
        assert_eq!(locale_of("zh-CN-XiaoxiaoNeural"), "zh-CN");
    }

    #[test]
    fn test_locale_of_malformed_name() {
        assert_eq!(locale_of("Jenny"), "Jenny");
        assert_eq!(locale_of(""), "");
    }

    #[test]
    fn test_empty_voice_list_rejected() {
        assert!(parse_yaml("voices: []").is_err());
    }

    #[test]
    fn test_invalid_yaml_rejected() {
        assert!(matches!(parse_yaml("voices: ["), Err(AppError::Config(_))));
    }
}
