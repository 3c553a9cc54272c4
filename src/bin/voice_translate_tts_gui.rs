fn main() -> eframe::Result<()> {
    voice_translate_lib::init_tracing();
    voice_translate_lib::gui::translate_app::run()
}
