pub mod settings;
pub mod voices;

pub use settings::{
    history_db_path, load_dotenv, mask_key, AzureSpeechSettings, LanguageSettings,
    TranslatorSettings,
};
pub use voices::{load_voices, locale_of, VoiceOption};
