//! Text rendering of messages and notices.

use chanlog_bus::Message;
use chrono::{DateTime, FixedOffset, Local, Offset};

const SYSTEM_RULE_WIDTH: usize = 40;
const BANNER_RULE_WIDTH: usize = 50;

/// Offset of the local timezone right now.
pub fn local_offset() -> FixedOffset {
    Local::now().offset().fix()
}

/// `HH:MM:SS` of `timestamp` (seconds since the epoch) at `offset`.
pub fn clock(timestamp: f64, offset: FixedOffset) -> String {
    #[allow(clippy::cast_possible_truncation, reason = "millisecond precision is enough")]
    let millis = (timestamp * 1000.0) as i64;

    DateTime::from_timestamp_millis(millis)
        .unwrap_or_default()
        .with_timezone(&offset)
        .format("%H:%M:%S")
        .to_string()
}

/// Lines to print for one message.
///
/// System messages are framed between rules. User messages from `own_nick`
/// are marked with `(você)`.
pub fn message_lines(message: &Message, own_nick: &str, offset: FixedOffset) -> Vec<String> {
    if message.is_system() {
        let rule = "-".repeat(SYSTEM_RULE_WIDTH);
        return vec![rule.clone(), format!("SISTEMA: {}", message.body), rule];
    }

    let time = clock(message.timestamp, offset);
    let line = if message.author == own_nick {
        format!("[{time}] {} (você): {}", message.author, message.body)
    } else {
        format!("[{time}] {}: {}", message.author, message.body)
    };
    vec![line]
}

/// Banner printed when switching to `channel`.
pub fn channel_banner(channel: &str, nick: &str) -> Vec<String> {
    let rule = "=".repeat(BANNER_RULE_WIDTH);
    vec![
        rule.clone(),
        format!("Conectado ao canal #{channel}"),
        format!("Logado como {nick}"),
        rule,
    ]
}

/// Command reference for `/help`.
pub fn help_lines() -> Vec<String> {
    [
        "/join <canal>    entrar em um canal",
        "/create <canal>  criar um canal e entrar nele",
        "/channels        listar canais",
        "/nick <nome>     trocar de nickname",
        "/history         reexibir o histórico do canal",
        "/quit            sair",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}
