use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use super::{SpeechSynthesizer, SynthesisOutcome, TtsError, VoiceSelection};
use crate::config::AzureSpeechSettings;
use crate::voice::CancellationDetails;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const OUTPUT_FORMAT: &str = "riff-24khz-16bit-mono-pcm";
const USER_AGENT: &str = "voice-translate";

/// 音声合成サービスの REST クライアント
pub struct AzureSynthesizer {
    client: Client,
    key: String,
    region: String,
}

impl AzureSynthesizer {
    pub fn new(settings: &AzureSpeechSettings) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TtsError::ClientError(e.to_string()))?;
        Ok(Self {
            client,
            key: settings.key.clone(),
            region: settings.region.clone(),
        })
    }
}

pub fn synthesis_url(region: &str) -> String {
    format!("https://{}.tts.speech.microsoft.com/cognitiveservices/v1", region)
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 1音声分の SSML を組み立てる
pub fn build_ssml(text: &str, voice: &VoiceSelection) -> String {
    format!(
        "<speak version='1.0' xml:lang='{}'><voice name='{}'>{}</voice></speak>",
        escape_xml(&voice.locale),
        escape_xml(&voice.name),
        escape_xml(text)
    )
}

#[async_trait]
impl SpeechSynthesizer for AzureSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        voice: &VoiceSelection,
    ) -> Result<SynthesisOutcome, TtsError> {
        let response = match self
            .client
            .post(synthesis_url(&self.region))
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Content-Type", "application/ssml+xml")
            .header("X-Microsoft-OutputFormat", OUTPUT_FORMAT)
            .header("User-Agent", USER_AGENT)
            .body(build_ssml(text, voice))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("synthesis request failed: {}", e);
                return Ok(SynthesisOutcome::Canceled(CancellationDetails::error(
                    format!("Request failed: {}", e),
                )));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Ok(SynthesisOutcome::Canceled(CancellationDetails::error(
                format!("HTTP {}: {}", status, body),
            )));
        }

        // 音声本体はストリームで受け取って連結する
        let mut audio = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => audio.extend_from_slice(&bytes),
                Err(e) => {
                    return Ok(SynthesisOutcome::Canceled(CancellationDetails::error(
                        format!("Stream error: {}", e),
                    )));
                }
            }
        }
        debug!(bytes = audio.len(), voice = %voice.name, "synthesis completed");

        if audio.is_empty() {
            return Ok(SynthesisOutcome::Canceled(CancellationDetails::error(
                "The synthesis service returned no audio",
            )));
        }
        Ok(SynthesisOutcome::Completed(audio))
    }
}
