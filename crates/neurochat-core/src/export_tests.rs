//! Unit tests for conversation export.

use super::*;
use crate::models::TurnSource;
use chrono::{DateTime, FixedOffset};

fn at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .expect("timestamp")
        .with_timezone(&Utc)
}

fn sample() -> ConversationWithTurns {
    let meta = Conversation {
        id: "conv-42".to_string(),
        created_at: at("2024-05-01T09:30:00Z"),
        updated_at: at("2024-05-01T09:31:00Z"),
        title: "Demo".to_string(),
        personality_id: Some("coach".to_string()),
        voice_name: None,
        summary: Some("Petit test".to_string()),
    };
    let turns = vec![
        Turn {
            id: "t1".to_string(),
            conversation_id: meta.id.clone(),
            role: TurnRole::User,
            text: "Bonjour".to_string(),
            created_at: at("2024-05-01T09:30:10Z"),
            source: Some(TurnSource::Speech),
            is_final: true,
        },
        Turn {
            id: "t2".to_string(),
            conversation_id: meta.id.clone(),
            role: TurnRole::Assistant,
            text: "Salut !\n\n**gras** <b>brut</b>".to_string(),
            created_at: at("2024-05-01T09:30:12Z"),
            source: Some(TurnSource::Model),
            is_final: true,
        },
    ];
    ConversationWithTurns { meta, turns }
}

#[cfg(test)]
mod markdown_tests {
    use super::*;

    #[test]
    fn markdown_has_title_metadata_and_rule() {
        let full = sample();
        let md = conversation_to_markdown(&full.meta, &full.turns);

        assert!(md.starts_with("# Demo\n\n"));
        assert!(md.contains("- ID : conv-42\n"));
        assert!(md.contains("- Créée le : 2024-05-01T09:30:00+00:00\n"));
        assert!(md.contains("- Résumé : Petit test\n"));
        assert!(md.contains("\n---\n"));
    }

    #[test]
    fn markdown_has_one_heading_per_turn_with_verbatim_text() {
        let full = sample();
        let md = conversation_to_markdown(&full.meta, &full.turns);

        assert_eq!(md.matches("\n### ").count(), full.turns.len());
        assert!(md.contains("### Utilisateur · 01/05/2024 09:30:10\n\nBonjour\n"));
        assert!(md.contains("### Assistant · 01/05/2024 09:30:12\n"));
        assert!(md.contains("Salut !\n\n**gras** <b>brut</b>"));
    }

    #[test]
    fn markdown_is_deterministic() {
        let full = sample();
        let first = conversation_to_markdown(&full.meta, &full.turns);
        let second = conversation_to_markdown(&full.meta, &full.turns);
        assert_eq!(first, second);
    }

    #[test]
    fn markdown_omits_missing_summary() {
        let mut full = sample();
        full.meta.summary = None;
        let md = conversation_to_markdown(&full.meta, &full.turns);
        assert!(!md.contains("Résumé"));
    }

    #[test]
    fn markdown_collapses_multiline_title_onto_heading_line() {
        let mut full = sample();
        full.meta.title = "Ligne un\nLigne deux".to_string();
        let md = conversation_to_markdown(&full.meta, &[]);
        assert!(md.starts_with("# Ligne un Ligne deux\n\n- ID"));
    }

    #[test]
    fn markdown_collapse_drops_blank_lines_in_title_and_summary() {
        let mut full = sample();
        full.meta.title = "A\n\nB".to_string();
        full.meta.summary = Some("  un\r\n\r\n  deux  \n".to_string());
        let md = conversation_to_markdown(&full.meta, &[]);
        assert!(md.starts_with("# A B\n\n"));
        assert!(md.contains("- Résumé : un deux\n"));
    }

    #[test]
    fn markdown_renders_times_in_given_zone() {
        let full = sample();
        let paris = FixedOffset::east_opt(2 * 3600).expect("offset");
        let md = conversation_to_markdown_in(&full.meta, &full.turns, &paris);
        assert!(md.contains("### Utilisateur · 01/05/2024 11:30:10\n"));
    }

    #[test]
    fn system_turns_are_labelled() {
        let mut full = sample();
        full.turns[0].role = TurnRole::System;
        let md = conversation_to_markdown(&full.meta, &full.turns);
        assert!(md.contains("### Système · "));
    }
}

#[cfg(test)]
mod json_tests {
    use super::*;

    #[test]
    fn json_dump_has_meta_and_turns() {
        let full = sample();
        let json = conversation_to_json(&full).expect("json");
        let value: serde_json::Value = serde_json::from_str(&json).expect("parse");

        assert_eq!(value["meta"]["title"], "Demo");
        assert_eq!(value["meta"]["personalityId"], "coach");
        assert_eq!(value["turns"].as_array().map(Vec::len), Some(2));
        assert_eq!(value["turns"][0]["text"], "Bonjour");
    }

    #[test]
    fn json_dump_parses_back() {
        let full = sample();
        let json = conversation_to_json(&full).expect("json");
        let parsed: ConversationWithTurns = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, full);
    }
}

#[cfg(test)]
mod file_tests {
    use super::*;

    #[test]
    fn file_names_follow_download_convention() {
        assert_eq!(
            export_file_name("abc", ExportFormat::Markdown),
            "neurochat_abc.md"
        );
        assert_eq!(export_file_name("abc", ExportFormat::Json), "neurochat_abc.json");
    }

    #[test]
    fn write_export_creates_directory_and_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let target = dir.path().join("nested");
        let full = sample();
        let contents = render(&full, ExportFormat::Markdown, &Utc).expect("render");

        let path =
            write_export(&target, &full.meta.id, ExportFormat::Markdown, &contents).expect("write");

        assert_eq!(path, target.join("neurochat_conv-42.md"));
        let written = std::fs::read_to_string(&path).expect("read");
        assert_eq!(written, contents);
    }
}
