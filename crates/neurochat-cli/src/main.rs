//! neurochat CLI - local conversation history

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use neurochat_core::export::ExportFormat;
use neurochat_core::models::{
    ConversationPatch, NewConversation, NewTurn, ProfilePatch, TurnRole, TurnSource,
};
use neurochat_core::{Config, ConversationStore};

#[derive(Debug, Parser)]
#[command(
    name = "neurochat",
    author,
    version,
    about = "Browse and export local voice-chat history",
    propagate_version = true
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start a new conversation
    New {
        /// Conversation title
        #[arg(long)]
        title: Option<String>,

        /// Personality preset
        #[arg(long)]
        personality: Option<String>,

        /// Voice name
        #[arg(long)]
        voice: Option<String>,
    },

    /// List conversations, newest first
    List {
        /// Maximum results (defaults to the configured list_limit)
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// Show a conversation
    Show {
        /// Conversation ID
        id: String,
    },

    /// Append a turn to a conversation
    Say {
        /// Conversation ID
        id: String,

        /// Turn text
        text: String,

        /// Speaker role
        #[arg(long, value_enum, default_value = "user")]
        role: RoleArg,

        /// Where the text came from
        #[arg(long, value_enum)]
        source: Option<SourceArg>,

        /// Store as an interim (non-final) transcription
        #[arg(long)]
        partial: bool,
    },

    /// Rename a conversation
    Rename {
        /// Conversation ID
        id: String,

        /// New title
        title: String,
    },

    /// Set the summary of a conversation
    Summarize {
        /// Conversation ID
        id: String,

        /// Summary text
        summary: String,
    },

    /// Delete a conversation and its turns
    Delete {
        /// Conversation ID
        id: String,
    },

    /// Export a conversation to a file
    Export {
        /// Conversation ID
        id: String,

        /// Output format
        #[arg(long, value_enum, default_value = "md")]
        format: FormatArg,

        /// Output directory (defaults to the configured export_dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show or edit the user profile
    Profile {
        #[command(subcommand)]
        command: Option<ProfileCommand>,
    },

    /// Remove turns left behind by deleted conversations
    Prune,

    /// Show database statistics
    Stats,
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    /// Show the profile
    Show,

    /// Update profile fields; omitted fields are kept
    Set {
        /// Display name
        #[arg(long)]
        name: Option<String>,

        /// IANA timezone, e.g. Europe/Paris
        #[arg(long)]
        timezone: Option<String>,

        /// Free-text preferences for the assistant
        #[arg(long)]
        preferences: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum RoleArg {
    User,
    Assistant,
    System,
}

impl From<RoleArg> for TurnRole {
    fn from(value: RoleArg) -> Self {
        match value {
            RoleArg::User => TurnRole::User,
            RoleArg::Assistant => TurnRole::Assistant,
            RoleArg::System => TurnRole::System,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum SourceArg {
    Speech,
    Model,
}

impl From<SourceArg> for TurnSource {
    fn from(value: SourceArg) -> Self {
        match value {
            SourceArg::Speech => TurnSource::Speech,
            SourceArg::Model => TurnSource::Model,
        }
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FormatArg {
    Md,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Md => ExportFormat::Markdown,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    // Load config
    let config_path = cli.config.unwrap_or_else(Config::default_config_path);
    let config = Config::ensure_at(&config_path)?;

    // Open store
    let store = ConversationStore::open(&config.database)
        .await?
        .with_default_title(config.default_title.clone());

    let result = match cli.command {
        Command::New {
            title,
            personality,
            voice,
        } => cmd_new(&store, title, personality, voice).await,
        Command::List { limit } => cmd_list(&store, limit.unwrap_or(config.list_limit)).await,
        Command::Show { id } => cmd_show(&store, &id).await,
        Command::Say {
            id,
            text,
            role,
            source,
            partial,
        } => cmd_say(&store, id, text, role, source, partial).await,
        Command::Rename { id, title } => {
            cmd_update(&store, &id, ConversationPatch::title(title)).await
        }
        Command::Summarize { id, summary } => {
            cmd_update(&store, &id, ConversationPatch::summary(summary)).await
        }
        Command::Delete { id } => cmd_delete(&store, &id).await,
        Command::Export { id, format, out } => {
            let dir = out.unwrap_or_else(|| config.export_dir.clone());
            cmd_export(&store, &id, format.into(), &dir).await
        }
        Command::Profile { command } => cmd_profile(&store, command).await,
        Command::Prune => cmd_prune(&store).await,
        Command::Stats => cmd_stats(&store).await,
    };

    store.close().await;
    result
}

async fn cmd_new(
    store: &ConversationStore,
    title: Option<String>,
    personality: Option<String>,
    voice: Option<String>,
) -> Result<()> {
    let conv = store
        .create_conversation(NewConversation {
            title,
            personality_id: personality,
            voice_name: voice,
            ..NewConversation::default()
        })
        .await?;
    println!("Created conversation: {} ({})", conv.id, conv.title);
    Ok(())
}

async fn cmd_list(store: &ConversationStore, limit: i64) -> Result<()> {
    let conversations = store.list_conversations(limit).await?;

    if conversations.is_empty() {
        println!("No conversations found.");
        return Ok(());
    }

    for conv in conversations {
        let date = conv
            .created_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M");
        println!("{} | {} | {}", conv.id, date, conv.title);
    }

    Ok(())
}

async fn cmd_show(store: &ConversationStore, id: &str) -> Result<()> {
    let full = store
        .get_conversation(id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Conversation not found: {id}"))?;

    let meta = &full.meta;
    println!("Title: {}", meta.title);
    println!("Created: {}", meta.created_at.with_timezone(&chrono::Local));
    println!("Updated: {}", meta.updated_at.with_timezone(&chrono::Local));
    if let Some(personality) = &meta.personality_id {
        println!("Personality: {personality}");
    }
    if let Some(voice) = &meta.voice_name {
        println!("Voice: {voice}");
    }
    if let Some(summary) = &meta.summary {
        println!("Summary: {summary}");
    }
    println!();

    for turn in &full.turns {
        let interim = if turn.is_final { "" } else { " (interim)" };
        println!("--- {}{interim} ---", turn.role);
        println!("{}", turn.text);
        println!();
    }

    Ok(())
}

async fn cmd_say(
    store: &ConversationStore,
    id: String,
    text: String,
    role: RoleArg,
    source: Option<SourceArg>,
    partial: bool,
) -> Result<()> {
    let mut new = NewTurn::new(id, role.into(), text);
    new.source = source.map(Into::into);
    if partial {
        new = new.partial();
    }

    let turn = store.add_turn(new).await?;
    println!("Added {} turn {}", turn.role, turn.id);
    Ok(())
}

async fn cmd_update(store: &ConversationStore, id: &str, patch: ConversationPatch) -> Result<()> {
    match store.update_conversation(id, patch).await? {
        Some(conv) => println!("Updated conversation: {} ({})", conv.id, conv.title),
        None => anyhow::bail!("Conversation not found: {id}"),
    }
    Ok(())
}

async fn cmd_delete(store: &ConversationStore, id: &str) -> Result<()> {
    if store.delete_conversation(id).await? {
        println!("Deleted conversation: {id}");
    } else {
        println!("No conversation with id {id}.");
    }
    Ok(())
}

async fn cmd_export(
    store: &ConversationStore,
    id: &str,
    format: ExportFormat,
    dir: &std::path::Path,
) -> Result<()> {
    let path = store
        .export_conversation(id, format, dir)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Conversation not found: {id}"))?;
    println!("Exported to {}", path.display());
    Ok(())
}

async fn cmd_profile(store: &ConversationStore, command: Option<ProfileCommand>) -> Result<()> {
    let profile = match command.unwrap_or(ProfileCommand::Show) {
        ProfileCommand::Show => store.get_or_create_profile().await?,
        ProfileCommand::Set {
            name,
            timezone,
            preferences,
        } => {
            store
                .upsert_user_profile(ProfilePatch {
                    display_name: name,
                    timezone,
                    preferences,
                })
                .await?
        }
    };

    println!("Profile: {}", profile.id);
    println!("Name:        {}", profile.display_name.as_deref().unwrap_or("-"));
    println!("Timezone:    {}", profile.timezone.as_deref().unwrap_or("-"));
    println!("Preferences: {}", profile.preferences.as_deref().unwrap_or("-"));
    println!("Updated:     {}", profile.updated_at.with_timezone(&chrono::Local));
    Ok(())
}

async fn cmd_prune(store: &ConversationStore) -> Result<()> {
    let removed = store.prune_orphan_turns().await?;
    println!("Removed {removed} orphaned turns.");
    Ok(())
}

async fn cmd_stats(store: &ConversationStore) -> Result<()> {
    let conv_count = store.count_conversations().await?;
    let turn_count = store.count_turns().await?;

    println!("Database Statistics");
    println!("-------------------");
    println!("Conversations: {conv_count}");
    println!("Turns:         {turn_count}");

    Ok(())
}
