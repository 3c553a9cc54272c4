use super::{EventSink, SessionEvent};
use crate::voice::CancellationReason;

/// CLI 用: イベントを標準出力に表示する
pub struct ConsoleSink {
    source_language: String,
    target_language: Option<String>,
}

impl ConsoleSink {
    pub fn new(source_language: &str) -> Self {
        Self {
            source_language: source_language.to_string(),
            target_language: None,
        }
    }

    pub fn with_target_language(mut self, target_language: &str) -> Self {
        self.target_language = Some(target_language.to_string());
        self
    }

    /// 1イベント分の表示行（表示しないイベントは空）
    pub fn render(&self, event: &SessionEvent) -> Vec<String> {
        match event {
            SessionEvent::Listening => vec![String::new(), "Listening...".to_string()],
            SessionEvent::Recognized(text) => {
                vec![format!("Recognized ({}): {}", self.source_language, text)]
            }
            SessionEvent::NoMatch(_) => vec!["No speech could be recognized".to_string()],
            SessionEvent::Canceled(details) => {
                let mut lines = vec![format!("Recognition canceled: {}", details.reason)];
                if details.reason == CancellationReason::Error {
                    lines.push(format!("Error details: {}", details.error_details));
                }
                lines
            }
            SessionEvent::Translating => vec!["Translating...".to_string()],
            SessionEvent::Translated { translation, .. } => {
                let target = self.target_language.as_deref().unwrap_or("translation");
                vec![format!("Translated ({}): {}", target, translation)]
            }
            SessionEvent::TranslationFailed(_) => vec!["Translation failed".to_string()],
            SessionEvent::Speaking(text) => vec![format!("Speaking: {}", text)],
            SessionEvent::SpeakCompleted => vec!["Speech synthesis completed".to_string()],
            SessionEvent::SpeakFailed(msg) => vec![format!("Speech synthesis failed: {}", msg)],
            SessionEvent::NothingToSpeak => vec!["Nothing to speak".to_string()],
            SessionEvent::Error(msg) => vec![format!("Unexpected error: {}", msg)],
            SessionEvent::Stopped => Vec::new(),
        }
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: SessionEvent) {
        for line in self.render(&event) {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::CancellationDetails;

    #[test]
    fn test_render_recognized_with_language() {
        let sink = ConsoleSink::new("zh-CN");
        assert_eq!(
            sink.render(&SessionEvent::Recognized("你好".into())),
            vec!["Recognized (zh-CN): 你好"]
        );
    }

    #[test]
    fn test_render_canceled_error_includes_details() {
        let sink = ConsoleSink::new("zh-CN");
        let lines = sink.render(&SessionEvent::Canceled(CancellationDetails::error("HTTP 401")));
        assert_eq!(lines, vec!["Recognition canceled: Error", "Error details: HTTP 401"]);
    }

    #[test]
    fn test_render_canceled_end_of_stream_has_no_details() {
        let sink = ConsoleSink::new("zh-CN");
        let lines = sink.render(&SessionEvent::Canceled(CancellationDetails::end_of_stream(
            "End of dictation",
        )));
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn test_render_translation_target() {
        let sink = ConsoleSink::new("zh-CN").with_target_language("en");
        let lines = sink.render(&SessionEvent::Translated {
            source: "谢谢".into(),
            translation: "Thank you".into(),
        });
        assert_eq!(lines, vec!["Translated (en): Thank you"]);
    }

    #[test]
    fn test_stopped_renders_nothing() {
        assert!(ConsoleSink::new("zh-CN").render(&SessionEvent::Stopped).is_empty());
    }
}
