pub mod azure;

use async_trait::async_trait;

/// 翻訳処理のエラー型
#[derive(Debug)]
pub enum TranslateError {
    /// サービスが 2xx 以外を返した
    Http(u16, String),
    /// 通信自体の失敗
    RequestFailed(String),
    /// レスポンスに翻訳結果が含まれていない
    UnexpectedFormat(String),
    /// HTTP クライアントの初期化エラー
    ClientError(String),
}

impl std::fmt::Display for TranslateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslateError::Http(status, body) => write!(f, "HTTP {}: {}", status, body),
            TranslateError::RequestFailed(msg) => write!(f, "Translation request failed: {}", msg),
            TranslateError::UnexpectedFormat(msg) => {
                write!(f, "Unexpected translation response: {}", msg)
            }
            TranslateError::ClientError(msg) => write!(f, "HTTP client error: {}", msg),
        }
    }
}

impl std::error::Error for TranslateError {}

/// テキスト翻訳サービスの抽象trait
#[async_trait]
pub trait Translator: Send + Sync {
    /// 複数の断片をまとめて翻訳する（入力と同じ順序で返す）
    async fn translate_batch(
        &self,
        fragments: &[&str],
        from: &str,
        to: &str,
    ) -> Result<Vec<String>, TranslateError>;

    /// 1つのテキストを翻訳する
    async fn translate(&self, text: &str, from: &str, to: &str) -> Result<String, TranslateError> {
        self.translate_batch(&[text], from, to)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TranslateError::UnexpectedFormat("empty result".to_string()))
    }
}
