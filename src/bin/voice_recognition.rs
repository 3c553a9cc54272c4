use std::process::ExitCode;

use voice_translate_lib::cli::{print_banner, run_until_interrupted};
use voice_translate_lib::error::AppError;
use voice_translate_lib::session::{ConsoleSink, Pacing, RecognitionLoop};
use voice_translate_lib::setup::{build_recognizer, open_history, StartupConfig};

async fn run() -> Result<(), AppError> {
    let config = StartupConfig::load()?;
    let language = &config.languages.recognition;
    let recognizer = build_recognizer(&config.speech, language)?;

    let mut session = RecognitionLoop::new(
        recognizer,
        language,
        std::sync::Arc::new(ConsoleSink::new(language)),
        Pacing::cli(),
    );
    if let Some(history) = open_history() {
        session = session.with_history(history);
    }

    print_banner(
        &config,
        "Speech Recognition",
        &format!("Speak into the microphone ({})", language),
    );
    run_until_interrupted(session, "Stopping speech recognition...").await
}

#[tokio::main]
async fn main() -> ExitCode {
    voice_translate_lib::init_tracing();
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
