pub mod azure_stt;
pub mod capture;
pub mod endpoint;
pub mod format;
pub mod pipeline;
pub mod resample;

use async_trait::async_trait;
use std::fmt;

/// 1回分の音声認識（recognize-once）の結果
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionOutcome {
    /// 発話を認識できた
    Recognized(String),
    /// 音声は届いたが、テキストにならなかった
    NoMatch(NoMatchReason),
    /// 認識が完了しなかった
    Canceled(CancellationDetails),
}

/// NoMatch になった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoMatchReason {
    /// 音声はあったが一致する語が無かった
    NotRecognized,
    /// 発話が始まらないまま待ち時間を超えた
    InitialSilenceTimeout,
    /// 雑音のみで発話を検出できなかった
    InitialBabbleTimeout,
}

impl fmt::Display for NoMatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoMatchReason::NotRecognized => write!(f, "NotRecognized"),
            NoMatchReason::InitialSilenceTimeout => write!(f, "InitialSilenceTimeout"),
            NoMatchReason::InitialBabbleTimeout => write!(f, "InitialBabbleTimeout"),
        }
    }
}

/// 認識・合成がキャンセルされた理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancellationReason {
    /// 音声ストリームの終端に達した（停止要求を含む）
    EndOfStream,
    /// サービスまたは通信のエラー
    Error,
}

impl fmt::Display for CancellationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancellationReason::EndOfStream => write!(f, "EndOfStream"),
            CancellationReason::Error => write!(f, "Error"),
        }
    }
}

/// キャンセル理由と詳細メッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancellationDetails {
    pub reason: CancellationReason,
    pub error_details: String,
}

impl CancellationDetails {
    pub fn error(details: impl Into<String>) -> Self {
        Self {
            reason: CancellationReason::Error,
            error_details: details.into(),
        }
    }

    pub fn end_of_stream(details: impl Into<String>) -> Self {
        Self {
            reason: CancellationReason::EndOfStream,
            error_details: details.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.reason == CancellationReason::Error
    }
}

/// 音声認識で発生しうるローカルエラー
///
/// サービス側の失敗は `RecognitionOutcome::Canceled` として返すため、
/// ここに来るのは端末側（マイク・変換処理）の問題のみ。
#[derive(Debug)]
pub enum VoiceError {
    /// 音声フォーマット変換エラー
    FormatError(String),
    /// リサンプリングエラー
    ResampleError(String),
    /// マイクデバイスのエラー
    DeviceError(String),
    /// HTTP クライアントの初期化エラー
    ClientError(String),
    /// パイプラインエラー
    PipelineError(String),
}

impl fmt::Display for VoiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceError::FormatError(msg) => write!(f, "Format error: {}", msg),
            VoiceError::ResampleError(msg) => write!(f, "Resample error: {}", msg),
            VoiceError::DeviceError(msg) => write!(f, "Audio device error: {}", msg),
            VoiceError::ClientError(msg) => write!(f, "HTTP client error: {}", msg),
            VoiceError::PipelineError(msg) => write!(f, "Pipeline error: {}", msg),
        }
    }
}

impl std::error::Error for VoiceError {}

/// 音声認識サービスの共通インターフェース
///
/// 16kHz / 16bit / モノラルの WAV を1発話分受け取り、認識結果を返す。
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// 1発話分の WAV を認識する
    ///
    /// # Arguments
    /// * `wav_data` - WAV ファイルのバイト列
    /// * `language` - BCP 47 言語コード (例: "zh-CN")
    async fn recognize(
        &self,
        wav_data: &[u8],
        language: &str,
    ) -> Result<RecognitionOutcome, VoiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_details_constructors() {
        let err = CancellationDetails::error("boom");
        assert!(err.is_error());
        assert_eq!(err.error_details, "boom");

        let eos = CancellationDetails::end_of_stream("stopped");
        assert!(!eos.is_error());
        assert_eq!(eos.reason.to_string(), "EndOfStream");
    }
}
