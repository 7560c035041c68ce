//! Markdown and JSON export of conversations.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{TimeZone, Utc};

use crate::error::Result;
use crate::models::{Conversation, ConversationWithTurns, Turn, TurnRole};

/// File formats a conversation can be exported to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Markdown,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Json => "json",
        }
    }
}

/// Name of the downloadable file for a conversation export.
pub fn export_file_name(conversation_id: &str, format: ExportFormat) -> String {
    format!("neurochat_{conversation_id}.{}", format.extension())
}

/// Render a conversation to markdown with UTC timestamps.
pub fn conversation_to_markdown(meta: &Conversation, turns: &[Turn]) -> String {
    conversation_to_markdown_in(meta, turns, &Utc)
}

/// Render a conversation to markdown with turn timestamps shown in `tz`.
///
/// Turn text is inserted verbatim; nothing is escaped. The title and summary
/// are collapsed onto one line.
pub fn conversation_to_markdown_in<Tz>(meta: &Conversation, turns: &[Turn], tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = format!("# {}\n\n", single_line(&meta.title));
    out.push_str(&format!("- ID : {}\n", meta.id));
    out.push_str(&format!("- Créée le : {}\n", meta.created_at.to_rfc3339()));
    if let Some(summary) = &meta.summary {
        out.push_str(&format!("- Résumé : {}\n", single_line(summary)));
    }
    out.push_str("\n---\n\n");

    for turn in turns {
        let when = turn.created_at.with_timezone(tz).format("%d/%m/%Y %H:%M:%S");
        out.push_str(&format!("### {} · {when}\n\n", role_label(turn.role)));
        out.push_str(&turn.text);
        out.push_str("\n\n");
    }

    out
}

/// Pretty-printed `{ "meta": ..., "turns": [...] }` dump.
pub fn conversation_to_json(full: &ConversationWithTurns) -> Result<String> {
    Ok(serde_json::to_string_pretty(full)?)
}

/// Render a conversation in the given format.
pub fn render<Tz>(full: &ConversationWithTurns, format: ExportFormat, tz: &Tz) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match format {
        ExportFormat::Markdown => Ok(conversation_to_markdown_in(&full.meta, &full.turns, tz)),
        ExportFormat::Json => conversation_to_json(full),
    }
}

/// Write rendered export contents to `dir`, creating it if needed.
pub fn write_export(
    dir: &Path,
    conversation_id: &str,
    format: ExportFormat,
    contents: &str,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_file_name(conversation_id, format));
    std::fs::write(&path, contents)?;
    Ok(path)
}

fn role_label(role: TurnRole) -> &'static str {
    match role {
        TurnRole::User => "Utilisateur",
        TurnRole::Assistant => "Assistant",
        TurnRole::System => "Système",
    }
}

/// Collapse text onto one line so a heading or bullet stays a single
/// markdown element. Lines are trimmed, blank lines dropped and the rest
/// joined with one space, so a multi-line title is not reproduced verbatim.
fn single_line(s: &str) -> String {
    s.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;
