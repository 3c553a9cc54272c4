use async_trait::async_trait;
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{TranslateError, Translator};
use crate::config::TranslatorSettings;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const API_VERSION: &str = "3.0";

#[derive(Debug, Serialize)]
struct TranslateRequestItem<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponseItem {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
    #[allow(dead_code)]
    #[serde(default)]
    to: String,
}

/// 翻訳サービス (v3.0 REST) のクライアント
pub struct AzureTranslator {
    client: Client,
    key: String,
    endpoint: String,
    region: String,
}

impl AzureTranslator {
    pub fn new(settings: &TranslatorSettings) -> Result<Self, TranslateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TranslateError::ClientError(e.to_string()))?;
        Ok(Self {
            client,
            key: settings.key.clone(),
            endpoint: settings.endpoint.clone(),
            region: settings.region.clone(),
        })
    }
}

/// `{endpoint}/translate`（末尾のスラッシュは許容）
pub fn translate_url(endpoint: &str) -> String {
    format!("{}/translate", endpoint.trim_end_matches('/'))
}

/// リクエストごとの `X-ClientTraceId`（UUID v4 形式）
pub fn client_trace_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    // version 4 / RFC 4122 variant
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// レスポンスから各断片の最初の訳文を取り出す
fn parse_translations(
    items: Vec<TranslateResponseItem>,
    expected: usize,
) -> Result<Vec<String>, TranslateError> {
    if items.is_empty() {
        return Err(TranslateError::UnexpectedFormat(
            "response contained no items".to_string(),
        ));
    }
    if items.len() != expected {
        return Err(TranslateError::UnexpectedFormat(format!(
            "expected {} items, got {}",
            expected,
            items.len()
        )));
    }

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| {
            item.translations
                .into_iter()
                .next()
                .map(|t| t.text)
                .ok_or_else(|| {
                    TranslateError::UnexpectedFormat(format!("item {} has no translations", i))
                })
        })
        .collect()
}

#[async_trait]
impl Translator for AzureTranslator {
    async fn translate_batch(
        &self,
        fragments: &[&str],
        from: &str,
        to: &str,
    ) -> Result<Vec<String>, TranslateError> {
        if fragments.is_empty() {
            return Ok(Vec::new());
        }

        let body: Vec<TranslateRequestItem> = fragments
            .iter()
            .map(|&text| TranslateRequestItem { text })
            .collect();
        let trace_id = client_trace_id();
        debug!(fragments = fragments.len(), from, to, trace_id = %trace_id, "translating");

        let response = self
            .client
            .post(translate_url(&self.endpoint))
            .query(&[("api-version", API_VERSION), ("from", from), ("to", to)])
            .header("Ocp-Apim-Subscription-Key", &self.key)
            .header("Ocp-Apim-Subscription-Region", &self.region)
            .header("Content-type", "application/json")
            .header("X-ClientTraceId", trace_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranslateError::RequestFailed("request timed out".to_string())
                } else {
                    TranslateError::RequestFailed(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(TranslateError::Http(status, text));
        }

        let items: Vec<TranslateResponseItem> = response
            .json()
            .await
            .map_err(|e| TranslateError::UnexpectedFormat(e.to_string()))?;

        parse_translations(items, fragments.len())
    }
}
