use std::process::ExitCode;
use std::sync::Arc;

use voice_translate_lib::cli::{print_banner, run_until_interrupted};
use voice_translate_lib::error::AppError;
use voice_translate_lib::session::{ConsoleSink, Pacing, RecognitionLoop};
use voice_translate_lib::setup::{build_recognizer, build_translation, open_history, StartupConfig};

async fn run() -> Result<(), AppError> {
    let config = StartupConfig::load_with_translator()?;
    let languages = &config.languages;

    let recognizer = build_recognizer(&config.speech, &languages.recognition)?;
    let translation = build_translation(config.translator()?, languages)?;
    let sink = ConsoleSink::new(&languages.recognition).with_target_language(&languages.translate_to);

    let mut session = RecognitionLoop::new(
        recognizer,
        &languages.recognition,
        Arc::new(sink),
        Pacing::cli(),
    )
    .with_translation(translation);
    if let Some(history) = open_history() {
        session = session.with_history(history);
    }

    print_banner(
        &config,
        "Speech Recognition and Translation",
        &format!(
            "Speak into the microphone; speech in {} is translated to {}",
            languages.recognition, languages.translate_to
        ),
    );
    run_until_interrupted(session, "Stopping speech recognition and translation...").await
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
