pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod gui;
pub mod session;
pub mod setup;
pub mod translate;
pub mod tts;
pub mod voice;

/// ログ出力を初期化する（`RUST_LOG` が無ければ info レベル）
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("voice_translate_lib=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
