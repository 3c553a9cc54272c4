pub mod recognition_app;
pub mod translate_app;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use eframe::egui;
use tracing::{error, info, warn};

use crate::error::AppError;
use crate::session::{speak_and_report, EventSink, RecognitionLoop, SessionEvent};
use crate::tts::Speaker;
use crate::voice::CancellationDetails;

pub use recognition_app::RecognitionApp;
pub use translate_app::TranslateApp;

/// 中国語・日本語を表示できるシステムフォントの候補
const CJK_FONT_PATHS: &[&str] = &[
    "C:\\Windows\\Fonts\\msyh.ttc",
    "C:\\Windows\\Fonts\\simhei.ttf",
    "/System/Library/Fonts/PingFang.ttc",
    "/System/Library/Fonts/STHeiti Light.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
];

pub const STATUS_OK: egui::Color32 = egui::Color32::from_rgb(0x4C, 0xAF, 0x50);
pub const STATUS_WARN: egui::Color32 = egui::Color32::from_rgb(0xFF, 0x98, 0x00);
pub const STATUS_ERROR: egui::Color32 = egui::Color32::from_rgb(0xF4, 0x43, 0x36);

/// 見つかった最初の CJK フォントを既定フォントの後ろに追加する
pub fn configure_fonts(ctx: &egui::Context) {
    let Some((path, bytes)) = CJK_FONT_PATHS
        .iter()
        .find_map(|path| std::fs::read(path).ok().map(|bytes| (*path, bytes)))
    else {
        warn!("no CJK font found; Chinese text may not render");
        return;
    };

    let mut fonts = egui::FontDefinitions::default();
    fonts.font_data.insert(
        "cjk".to_owned(),
        Arc::new(egui::FontData::from_owned(bytes)),
    );
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts.families.entry(family).or_default().push("cjk".to_owned());
    }
    ctx.set_fonts(fonts);
    info!(path, "CJK font loaded");
}

/// GUI 用: イベントをチャンネルで UI スレッドに送り、再描画を要求する
pub struct ChannelSink {
    tx: mpsc::Sender<SessionEvent>,
    ctx: egui::Context,
}

impl ChannelSink {
    pub fn new(ctx: egui::Context) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx, ctx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_ok() {
            self.ctx.request_repaint();
        }
    }
}

/// tokio の current-thread ランタイムを作る
fn build_runtime() -> Result<tokio::runtime::Runtime, AppError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::from)
}

/// 認識ループを回すバックグラウンドスレッド
///
/// 開始ごとに新しい停止フラグを持つので、停止直後に再開しても
/// 古いスレッドは自分のフラグを見て終了する。
pub struct Worker {
    running: Arc<AtomicBool>,
}

impl Worker {
    pub fn start(session: Arc<RecognitionLoop>, sink: Arc<dyn EventSink>) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        thread::spawn(move || {
            let runtime = match build_runtime() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("failed to start worker runtime: {}", e);
                    flag.store(false, Ordering::SeqCst);
                    sink.emit(SessionEvent::Error(e.to_string()));
                    sink.emit(SessionEvent::Stopped);
                    return;
                }
            };
            if let Err(e) = runtime.block_on(session.run(Arc::clone(&flag))) {
                error!("recognition worker ended: {}", e);
            }
            flag.store(false, Ordering::SeqCst);
        });

        Self { running }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// 1回だけ朗読するスレッドを起動する（UI をブロックしない）
pub fn spawn_speak(speaker: Arc<Speaker>, text: String, sink: Arc<dyn EventSink>) {
    thread::spawn(move || match build_runtime() {
        Ok(runtime) => {
            runtime.block_on(speak_and_report(&speaker, &text, sink.as_ref()));
        }
        Err(e) => sink.emit(SessionEvent::SpeakFailed(e.to_string())),
    });
}

pub fn copy_to_clipboard(text: &str) -> Result<(), AppError> {
    let mut clipboard = arboard::Clipboard::new()
        .map_err(|e| AppError::Config(format!("Clipboard unavailable: {}", e)))?;
    clipboard
        .set_text(text.to_string())
        .map_err(|e| AppError::Config(format!("Failed to copy: {}", e)))
}

/// 起動時の設定エラーを表示するだけのウィンドウ
struct ErrorApp {
    message: String,
}

impl eframe::App for ErrorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Error");
            ui.add_space(8.0);
            ui.colored_label(STATUS_ERROR, &self.message);
            ui.add_space(12.0);
            if ui.button("Close").clicked() {
                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            }
        });
    }
}

pub fn show_error_window(title: &str, message: &str) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 180.0])
            .with_title(title),
        ..Default::default()
    };
    let app = ErrorApp {
        message: message.to_string(),
    };
    eframe::run_native(
        title,
        options,
        Box::new(move |cc| {
            configure_fonts(&cc.egui_ctx);
            Ok(Box::new(app))
        }),
    )
}

/// 状態表示（メッセージと色）
#[derive(Debug, Clone)]
pub struct StatusLine {
    pub text: String,
    pub color: egui::Color32,
}

impl StatusLine {
    pub fn ready() -> Self {
        Self {
            text: "Ready".to_string(),
            color: egui::Color32::GRAY,
        }
    }

    pub fn set(&mut self, text: impl Into<String>, color: egui::Color32) {
        self.text = text.into();
        self.color = color;
    }

    pub fn show(&self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.label(egui::RichText::new(&self.text).size(16.0).color(self.color));
        });
    }
}

/// 認識キャンセルの表示文（エラー時は詳細を2行目に付ける）
pub fn cancellation_message(details: &CancellationDetails) -> String {
    let mut message = format!("Recognition canceled: {}", details.reason);
    if details.is_error() {
        message.push_str(&format!("\nError details: {}", details.error_details));
    }
    message
}

/// 認識ループのイベントを状態表示に反映する（両ウィンドウ共通部分）
pub fn apply_common_status(status: &mut StatusLine, event: &SessionEvent) {
    match event {
        SessionEvent::Listening => status.set("Listening...", STATUS_OK),
        SessionEvent::Recognized(_) => status.set("Recognized", STATUS_OK),
        SessionEvent::NoMatch(_) => status.set("No speech could be recognized", STATUS_WARN),
        SessionEvent::Canceled(details) => status.set(cancellation_message(details), STATUS_ERROR),
        SessionEvent::Translating => status.set("Translating...", STATUS_WARN),
        SessionEvent::Translated { .. } => status.set("Translation succeeded", STATUS_OK),
        SessionEvent::TranslationFailed(msg) => {
            status.set(format!("Translation failed: {}", msg), STATUS_ERROR)
        }
        SessionEvent::Speaking(_) => status.set("Speaking...", STATUS_OK),
        SessionEvent::SpeakCompleted => status.set("Speech completed", STATUS_OK),
        SessionEvent::SpeakFailed(msg) => status.set(format!("Speech failed: {}", msg), STATUS_ERROR),
        SessionEvent::NothingToSpeak => status.set("Nothing to speak", STATUS_WARN),
        SessionEvent::Error(msg) => {
            status.set(format!("Error during recognition: {}", msg), STATUS_ERROR)
        }
        SessionEvent::Stopped => {}
    }
}
