use std::sync::mpsc;
use std::sync::Arc;

use eframe::egui;

use super::{
    apply_common_status, cancellation_message, configure_fonts, copy_to_clipboard, ChannelSink,
    StatusLine, Worker, STATUS_ERROR, STATUS_OK,
};
use crate::session::{EventSink, Pacing, RecognitionLoop, SessionEvent};
use crate::setup::{build_recognizer, open_history, StartupConfig};

const TITLE: &str = "Speech Recognition";

/// 認識のみのウィンドウ
pub struct RecognitionApp {
    session: Arc<RecognitionLoop>,
    sink: Arc<dyn EventSink>,
    events: mpsc::Receiver<SessionEvent>,
    worker: Option<Worker>,
    header: String,
    transcript: String,
    status: StatusLine,
}

/// 文字起こし欄の見出し（リージョンと認識言語）
pub fn transcript_header(region: &str, language: &str) -> String {
    format!(
        "Speech service region: {}\nRecognition language: {}\n----------------------------\n",
        region, language
    )
}

/// 文字起こし欄に追記する行（認識結果・キャンセル・エラー）
fn transcript_line(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Recognized(text) => Some(text.clone()),
        SessionEvent::Canceled(details) => Some(cancellation_message(details)),
        SessionEvent::Error(msg) => Some(format!("Error during recognition: {}", msg)),
        _ => None,
    }
}

impl RecognitionApp {
    pub fn new(cc: &eframe::CreationContext<'_>, config: &StartupConfig) -> Result<Self, String> {
        configure_fonts(&cc.egui_ctx);

        let (sink, events) = ChannelSink::new(cc.egui_ctx.clone());
        let sink: Arc<dyn EventSink> = Arc::new(sink);
        let recognizer = build_recognizer(&config.speech, &config.languages.recognition)?;

        let mut session = RecognitionLoop::new(
            recognizer,
            &config.languages.recognition,
            Arc::clone(&sink),
            Pacing::gui(),
        );
        if let Some(history) = open_history() {
            session = session.with_history(history);
        }

        let header = transcript_header(&config.speech.region, &config.languages.recognition);
        Ok(Self {
            session: Arc::new(session),
            sink,
            events,
            worker: None,
            transcript: header.clone(),
            header,
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
            self.status.set("Stopped", STATUS_ERROR);
        }
    }

    fn clear(&mut self) {
        self.transcript = self.header.clone();
        self.status = StatusLine::ready();
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            if let Some(line) = transcript_line(&event) {
                self.transcript.push_str(&line);
                self.transcript.push('\n');
            }
            // 停止後に届いた古いワーカーのイベントで状態を上書きしない
            if self.is_running() {
                apply_common_status(&mut self.status, &event);
            }
        }
    }
}

impl eframe::App for RecognitionApp {
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
                if ui.button("Copy").clicked() {
                    match copy_to_clipboard(&self.transcript) {
                        Ok(()) => self.status.set("Copied to clipboard", STATUS_OK),
                        Err(e) => self.status.set(e.to_string(), STATUS_ERROR),
                    }
                }
            });
            ui.add_space(6.0);
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .auto_shrink([false, false])
                .show(ui, |ui| {
                    ui.label(egui::RichText::new(&self.transcript).size(15.0));
                });
        });
    }
}

/// 認識ウィンドウを起動する（設定エラー時はエラーウィンドウ）
pub fn run() -> eframe::Result<()> {
    let config = match StartupConfig::load() {
        Ok(config) => config,
        Err(e) => return super::show_error_window(TITLE, &e.to_string()),
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([600.0, 400.0])
            .with_title(TITLE),
        ..Default::default()
    };

    eframe::run_native(
        TITLE,
        options,
        Box::new(move |cc| {
            let app = RecognitionApp::new(cc, &config)?;
            Ok(Box::new(app))
        }),
    )
}
