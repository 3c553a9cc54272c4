use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AzureSpeechSettings;
use crate::voice::format::SPEECH_SAMPLE_RATE;
use crate::voice::{
    CancellationDetails, NoMatchReason, RecognitionOutcome, SpeechRecognizer, VoiceError,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 短い音声向け REST API のレスポンス（format=simple）
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
}

/// 音声サービスの REST API を使った認識クライアント
pub struct AzureSpeechRecognizer {
    client: Client,
    key: String,
    region: String,
}

impl AzureSpeechRecognizer {
    pub fn new(settings: &AzureSpeechSettings) -> Result<Self, VoiceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| VoiceError::ClientError(e.to_string()))?;
        Ok(Self {
            client,
            key: settings.key.clone(),
            region: settings.region.clone(),
        })
    }
}

/// リージョンごとの認識エンドポイント
pub fn recognition_url(region: &str) -> String {
    format!(
        "https://{}.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1",
        region
    )
}

/// `RecognitionStatus` を認識結果に対応づける
fn outcome_from_response(response: RecognitionResponse) -> RecognitionOutcome {
    match response.recognition_status.as_str() {
        "Success" => match response.display_text {
            Some(text) if !text.trim().is_empty() => RecognitionOutcome::Recognized(text),
            _ => RecognitionOutcome::NoMatch(NoMatchReason::NotRecognized),
        },
        "NoMatch" => RecognitionOutcome::NoMatch(NoMatchReason::NotRecognized),
        "InitialSilenceTimeout" => {
            RecognitionOutcome::NoMatch(NoMatchReason::InitialSilenceTimeout)
        }
        "BabbleTimeout" => RecognitionOutcome::NoMatch(NoMatchReason::InitialBabbleTimeout),
        "EndOfDictation" => RecognitionOutcome::Canceled(CancellationDetails::end_of_stream(
            "End of dictation",
        )),
        "Error" => RecognitionOutcome::Canceled(CancellationDetails::error(
            "The recognition service returned an error status",
        )),
        other => RecognitionOutcome::Canceled(CancellationDetails::error(format!(
            "Unknown recognition status: {}",
            other
        ))),
    }
}

#[async_trait]
impl SpeechRecognizer for AzureSpeechRecognizer {
    /// WAV 形式の1発話を送信して認識する
    ///
    /// 通信エラーや HTTP エラーは Err ではなく `Canceled(Error)` として返す。
    async fn recognize(
        &self,
        wav_data: &[u8],
        language: &str,
    ) -> Result<RecognitionOutcome, VoiceError> {
        let content_type = format!(
            "audio/wav; codecs=audio/pcm; samplerate={}",
            SPEECH_SAMPLE_RATE
        );

        let response = match self
            .client
            .post(recognition_url(&self.region))
            .query(&[("language", language), ("format", "simple")])
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", content_type)
            .header("Accept", "application/json")
            .body(wav_data.to_vec())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("recognition request failed: {}", e);
                let details = if e.is_timeout() {
                    "Recognition request timed out".to_string()
                } else {
                    format!("Request failed: {}", e)
                };
                return Ok(RecognitionOutcome::Canceled(CancellationDetails::error(
                    details,
                )));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Ok(RecognitionOutcome::Canceled(CancellationDetails::error(
                format!("HTTP {}: {}", status, body),
            )));
        }

        let parsed: RecognitionResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                return Ok(RecognitionOutcome::Canceled(CancellationDetails::error(
                    format!("Failed to parse response: {}", e),
                )));
            }
        };
        debug!(status = %parsed.recognition_status, "recognition response");

        Ok(outcome_from_response(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::CancellationReason;

    fn parse(json: &str) -> RecognitionOutcome {
        outcome_from_response(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_recognition_url() {
        assert_eq!(
            recognition_url("eastasia"),
            "https://eastasia.stt.speech.microsoft.com/speech/recognition/conversation/cognitiveservices/v1"
        );
    }

    #[test]
    fn test_success_response() {
        let outcome = parse(
            r#"{"RecognitionStatus":"Success","DisplayText":"你好，世界。","Offset":300000,"Duration":15000000}"#,
        );
        assert_eq!(outcome, RecognitionOutcome::Recognized("你好，世界。".to_string()));
    }

    #[test]
    fn test_success_with_empty_text_is_no_match() {
        let outcome = parse(r#"{"RecognitionStatus":"Success","DisplayText":""}"#);
        assert_eq!(
            outcome,
            RecognitionOutcome::NoMatch(NoMatchReason::NotRecognized)
        );
    }

    #[test]
    fn test_no_match_statuses() {
        assert_eq!(
            parse(r#"{"RecognitionStatus":"NoMatch"}"#),
            RecognitionOutcome::NoMatch(NoMatchReason::NotRecognized)
        );
        assert_eq!(
            parse(r#"{"RecognitionStatus":"InitialSilenceTimeout","Offset":0,"Duration":0}"#),
            RecognitionOutcome::NoMatch(NoMatchReason::InitialSilenceTimeout)
        );
        assert_eq!(
            parse(r#"{"RecognitionStatus":"BabbleTimeout"}"#),
            RecognitionOutcome::NoMatch(NoMatchReason::InitialBabbleTimeout)
        );
    }

    #[test]
    fn test_end_of_dictation_is_end_of_stream() {
        match parse(r#"{"RecognitionStatus":"EndOfDictation"}"#) {
            RecognitionOutcome::Canceled(details) => {
                assert_eq!(details.reason, CancellationReason::EndOfStream)
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_error_and_unknown_status_are_errors() {
        for json in [
            r#"{"RecognitionStatus":"Error"}"#,
            r#"{"RecognitionStatus":"SomethingNew"}"#,
        ] {
            match parse(json) {
                RecognitionOutcome::Canceled(details) => assert!(details.is_error()),
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
    }
}
