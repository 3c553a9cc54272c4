use std::sync::mpsc;
use std::sync::Arc;

use eframe::egui;
use tracing::warn;

use super::{
    apply_common_status, configure_fonts, copy_to_clipboard, spawn_speak, ChannelSink,
    StatusLine, Worker, STATUS_ERROR, STATUS_OK, STATUS_WARN,
};
use crate::config::{load_voices, VoiceOption};
use crate::session::{EventSink, Pacing, RecognitionLoop, SessionEvent};
use crate::setup::{build_recognizer, build_speaker, build_translation, open_history, StartupConfig};
use crate::tts::Speaker;

const TITLE: &str = "Speech Recognition, Translation and Read-Aloud";

/// 認識 + 翻訳 + 朗読のウィンドウ
pub struct TranslateApp {
    session: Arc<RecognitionLoop>,
    speaker: Arc<Speaker>,
    sink: Arc<dyn EventSink>,
    events: mpsc::Receiver<SessionEvent>,
    worker: Option<Worker>,
    source_text: String,
    translation_text: String,
    last_translation: Option<String>,
    voices: Vec<VoiceOption>,
    selected_voice: String,
    translating: bool,
    status: StatusLine,
}

/// 状態表示を更新してよいイベントか
///
/// 停止後に届いた古いワーカーのイベントでは更新しない。朗読の通知は
/// Speak ボタン（ワーカー停止中）からも来るので常に反映する。
fn updates_status(worker_running: bool, event: &SessionEvent) -> bool {
    worker_running
        || matches!(
            event,
            SessionEvent::Speaking(_)
                | SessionEvent::SpeakCompleted
                | SessionEvent::SpeakFailed(_)
                | SessionEvent::NothingToSpeak
        )
}

impl TranslateApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: &StartupConfig) -> Result<Self, String> {
        configure_fonts(&cc.egui_ctx);

        let (sink, events) = ChannelSink::new(cc.egui_ctx.clone());
        let sink: Arc<dyn EventSink> = Arc::new(sink);
        let languages = &config.languages;

        let recognizer = build_recognizer(&config.speech, &languages.recognition)?;
        let translation = build_translation(config.translator()?, languages)?;
        let speaker = build_speaker(&config.speech, &languages.voice)?;

        let mut session = RecognitionLoop::new(
            recognizer,
            &languages.recognition,
            Arc::clone(&sink),
            Pacing::gui(),
        )
        .with_translation(translation)
        .with_speaker(Arc::clone(&speaker));
        if let Some(history) = open_history() {
            session = session.with_history(history);
        }

        let voices = match load_voices() {
            Ok(voices) => voices,
            Err(e) => {
                warn!("voice list unavailable: {}", e);
                Vec::new()
            }
        };

        Ok(Self {
            session: Arc::new(session),
            speaker,
            sink,
            events,
            worker: None,
            source_text: String::new(),
            translation_text: String::new(),
            last_translation: None,
            voices,
            selected_voice: languages.voice.clone(),
            translating: false,
            status: StatusLine::ready(),
        })
    }

    fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(Worker::is_running)
    }

    fn start(&mut self) {
        if self.is_running() {
            return;
        }
        self.status.set("Recognizing...", STATUS_OK);
        self.worker = Some(Worker::start(
            Arc::clone(&self.session),
            Arc::clone(&self.sink),
        ));
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.stop();
            self.translating = false;
            self.status.set("Stopped", STATUS_ERROR);
        }
    }

    /// 両方の欄と最後の訳文を消す
    fn clear(&mut self) {
        self.source_text.clear();
        self.translation_text.clear();
        self.last_translation = None;
        self.status = StatusLine::ready();
    }

    fn speak_last_translation(&mut self) {
        match &self.last_translation {
            Some(text) => spawn_speak(
                Arc::clone(&self.speaker),
                text.clone(),
                Arc::clone(&self.sink),
            ),
            None => self.status.set("No translation to speak", STATUS_WARN),
        }
    }

    fn select_voice(&mut self, name: String) {
        self.speaker.set_voice(&name);
        self.status.set(format!("Selected voice: {}", name), STATUS_OK);
        self.selected_voice = name;
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let running = self.is_running();
            match &event {
                SessionEvent::Recognized(text) => {
                    self.source_text.push_str(text);
                    self.source_text.push('\n');
                }
                SessionEvent::Translating => self.translating = running,
                SessionEvent::Translated { translation, .. } => {
                    self.translating = false;
                    self.translation_text.push_str(translation);
                    self.translation_text.push('\n');
                    self.last_translation = Some(translation.clone());
                }
                SessionEvent::TranslationFailed(_) => self.translating = false,
                _ => {}
            }
            if updates_status(running, &event) {
                apply_common_status(&mut self.status, &event);
            }
        }
    }

    fn text_pane(ui: &mut egui::Ui, id: &str, title: &str, text: &str) {
        ui.group(|ui| {
            ui.label(egui::RichText::new(title).strong());
            egui::ScrollArea::vertical()
                .id_salt(id)
                .stick_to_bottom(true)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.label(egui::RichText::new(text).size(15.0));
                });
        });
    }
}

impl eframe::App for TranslateApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        if ctx.input(|i| i.viewport().close_requested()) {
            self.stop();
        }

        egui::TopBottomPanel::top("status").show(ctx, |ui| {
            ui.add_space(6.0);
            self.status.show(ui);
            ui.add_space(6.0);
        });

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.add_space(6.0);
            ui.horizontal(|ui| {
                let running = self.is_running();
                if ui
                    .add_enabled(!running, egui::Button::new("Start"))
                    .clicked()
                {
                    self.start();
                }
                if ui.add_enabled(running, egui::Button::new("Stop")).clicked() {
                    self.stop();
                }
                if ui.button("Clear").clicked() {
                    self.clear();
                }
                if ui.button("Speak").clicked() {
                    self.speak_last_translation();
                }
                if ui.button("Copy").clicked() {
                    match copy_to_clipboard(&self.translation_text) {
                        Ok(()) => self.status.set("Translation copied", STATUS_OK),
                        Err(e) => self.status.set(e.to_string(), STATUS_ERROR),
                    }
                }
                if self.translating {
                    ui.spinner();
                }
            });

            ui.horizontal(|ui| {
                ui.label("Voice:");
                let mut chosen = None;
                let selected_label = self
                    .voices
                    .iter()
                    .find(|v| v.name == self.selected_voice)
                    .map(|v| v.label.clone())
                    .unwrap_or_else(|| self.selected_voice.clone());
                egui::ComboBox::from_id_salt("voice")
                    .selected_text(selected_label)
                    .show_ui(ui, |ui| {
                        for voice in &self.voices {
                            let selected = voice.name == self.selected_voice;
                            if ui.selectable_label(selected, &voice.label).clicked() && !selected {
                                chosen = Some(voice.name.clone());
                            }
                        }
                    });
                if let Some(name) = chosen {
                    self.select_voice(name);
                }
            });
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                Self::text_pane(&mut columns[0], "source", "Recognized text", &self.source_text);
                Self::text_pane(
                    &mut columns[1],
                    "translation",
                    "Translation",
                    &self.translation_text,
                );
            });
        });
    }
}

/// 翻訳・朗読ウィンドウを起動する（設定エラー時はエラーウィンドウ）
pub fn run() -> eframe::Result<()> {
    let config = match StartupConfig::load_with_translator() {
        Ok(config) => config,
        Err(e) => return super::show_error_window(TITLE, &e.to_string()),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([700.0, 500.0])
            .with_title(TITLE),
        ..Default::default()
    };

    eframe::run_native(
        TITLE,
        options,
        Box::new(move |cc| {
            let app = TranslateApp::new(cc, &config)?;
            Ok(Box::new(app))
        }),
    )
}
