use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::mask_key;
use crate::error::AppError;
use crate::session::RecognitionLoop;
use crate::setup::StartupConfig;

/// 起動時の見出し（キーはマスクして表示）
pub fn print_banner(config: &StartupConfig, title: &str, instructions: &str) {
    println!("Speech service key: {}", mask_key(&config.speech.key));
    println!("Speech service region: {}", config.speech.region);
    println!("====== {} ======", title);
    println!("{}", instructions);
    println!("Press Ctrl+C to exit");
}

/// Ctrl+C を受けるまでループを回す
///
/// Ctrl+C では停止フラグを下ろして `farewell` を表示し、正常終了する。
/// ループが想定外エラーで終わった場合はそのエラーを返す。
pub async fn run_until_interrupted(
    session: RecognitionLoop,
    farewell: &str,
) -> Result<(), AppError> {
    let running = Arc::new(AtomicBool::new(true));

    tokio::select! {
        result = session.run(Arc::clone(&running)) => result,
        signal = tokio::signal::ctrl_c() => {
            running.store(false, Ordering::SeqCst);
            signal?;
            println!("\n{}", farewell);
            Ok(())
        }
    }
}
