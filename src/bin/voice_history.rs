//! 保存された認識・翻訳履歴の表示と削除
//!
//! 使い方: `voice_history [list [N] | prune DAYS | clear]`

use std::process::ExitCode;

use chrono::{DateTime, Local};

use voice_translate_lib::config::{history_db_path, load_dotenv};
use voice_translate_lib::db::repository::Entry;
use voice_translate_lib::db::HistoryStore;
use voice_translate_lib::error::AppError;

const DEFAULT_LIST_LIMIT: u32 = 20;

#[derive(Debug, PartialEq)]
enum Command {
    List(u32),
    Prune(u32),
    Clear,
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    let number = |value: Option<&String>, name: &str| -> Result<Option<u32>, String> {
        value
            .map(|v| {
                v.parse::<u32>()
                    .map_err(|_| format!("{} must be a non-negative integer: {}", name, v))
            })
            .transpose()
    };

    match args.first().map(String::as_str) {
        None | Some("list") => Ok(Command::List(
            number(args.get(1), "N")?.unwrap_or(DEFAULT_LIST_LIMIT),
        )),
        Some("prune") => number(args.get(1), "DAYS")?
            .map(Command::Prune)
            .ok_or_else(|| "Usage: voice_history prune DAYS".to_string()),
        Some("clear") => Ok(Command::Clear),
        Some(other) => Err(format!(
            "Unknown command: {}\nUsage: voice_history [list [N] | prune DAYS | clear]",
            other
        )),
    }
}

/// 保存時刻（UTC）をローカル時刻で表示する
fn format_timestamp(created_at: &str) -> String {
    DateTime::parse_from_rfc3339(created_at)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| created_at.to_string())
}

fn format_entry(entry: &Entry) -> Vec<String> {
    let mut lines = vec![format!(
        "#{} [{}] ({}) {}",
        entry.id,
        format_timestamp(&entry.created_at),
        entry.source_language,
        entry.recognized_text
    )];
    if let Some(translation) = &entry.translated_text {
        let target = entry.target_language.as_deref().unwrap_or("?");
        lines.push(format!("    -> ({}) {}", target, translation));
    }
    lines
}

fn run(command: Command) -> Result<(), AppError> {
    load_dotenv();
    let path = history_db_path().ok_or_else(|| {
        AppError::Config("Set HISTORY_DB_PATH in the .env file to use history".to_string())
    })?;
    let store = HistoryStore::open(&path)?;

    match command {
        Command::List(limit) => {
            let entries = store.recent(limit, 0)?;
            println!(
                "Showing {} of {} entries ({})",
                entries.len(),
                store.count()?,
                path.display()
            );
            for entry in &entries {
                for line in format_entry(entry) {
                    println!("{}", line);
                }
            }
        }
        Command::Prune(days) => {
            let removed = store.prune_older_than(days)?;
            println!("Removed {} entries older than {} days", removed, days);
        }
        Command::Clear => {
            let removed = store.clear()?;
            println!("Removed {} entries", removed);
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    voice_translate_lib::init_tracing();
    let args: Vec<String> = std::env::args().skip(1).collect();

    let result = parse_command(&args)
        .map_err(AppError::Config)
        .and_then(run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(&[]), Ok(Command::List(DEFAULT_LIST_LIMIT)));
        assert_eq!(parse_command(&args(&["list", "5"])), Ok(Command::List(5)));
        assert_eq!(parse_command(&args(&["prune", "7"])), Ok(Command::Prune(7)));
        assert_eq!(parse_command(&args(&["clear"])), Ok(Command::Clear));
    }

    #[test]
    fn test_parse_command_errors() {
        assert!(parse_command(&args(&["prune"])).is_err());
        assert!(parse_command(&args(&["list", "-1"])).is_err());
        assert!(parse_command(&args(&["export"])).is_err());
    }

    #[test]
    fn test_format_timestamp_falls_back_to_raw() {
        assert_eq!(format_timestamp("not a time"), "not a time");
        assert_eq!(format_timestamp("2026-01-02T03:04:05.000Z").len(), 19);
    }

    #[test]
    fn test_format_entry_with_translation() {
        let entry = Entry {
            id: 3,
            recognized_text: "你好".to_string(),
            translated_text: Some("Hello".to_string()),
            source_language: "zh-CN".to_string(),
            target_language: Some("en".to_string()),
            voice: None,
            created_at: "bad".to_string(),
        };
        let lines = format_entry(&entry);
        assert_eq!(lines[0], "#3 [bad] (zh-CN) 你好");
        assert_eq!(lines[1], "    -> (en) Hello");
    }
}
