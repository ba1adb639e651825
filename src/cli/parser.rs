//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::context::DEFAULT_WINDOW_SIZE;
use crate::engine::knowledge::{DEFAULT_MAX_CHUNKS, DEFAULT_MIN_RELEVANCE};

/// Virtual gym receptionist.
///
/// Manages keyword rules, guided flows and the knowledge base, and drives
/// conversations through the reply engine from the terminal.
#[derive(Parser, Debug)]
#[command(name = "receptionist")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the database file.
    ///
    /// Defaults to `.receptionist/receptionist.db` in the current directory.
    #[arg(short, long, env = "RECEPTIONIST_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// Path to the chatbot settings JSON file.
    ///
    /// Defaults to `<config dir>/receptionist/settings.json`; built-in
    /// defaults are used when that file does not exist.
    #[arg(short, long, env = "RECEPTIONIST_SETTINGS", global = true)]
    pub settings: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize the database.
    ///
    /// Creates the database file and schema if they don't exist.
    #[command(after_help = r#"Examples:
  receptionist init                    # Initialize in current directory
  receptionist init --force            # Re-initialize (destroys existing data)
  receptionist --db-path ./gym.db init # Initialize with custom path
"#)]
    Init {
        /// Force re-initialization (destroys existing data).
        #[arg(short, long)]
        force: bool,
    },

    /// Keyword rule operations (add, list).
    #[command(subcommand)]
    Rule(RuleCommands),

    /// Conversation flow operations (import, list).
    #[command(subcommand)]
    Flow(FlowCommands),

    /// Knowledge base operations (add, search).
    #[command(subcommand)]
    Knowledge(KnowledgeCommands),

    /// Process one message and print the reply.
    ///
    /// With `--session`, the session is read from and written back to a
    /// JSON file so consecutive calls continue the same conversation.
    #[command(after_help = r#"Examples:
  receptionist send "hola"                                # One-off turn (new session)
  receptionist send "precio" --session ./ana.json         # Continue a saved session
  receptionist --format json send "hola" | jq '.message'
"#)]
    Send {
        /// Message text.
        text: String,

        /// Session file to load and save.
        #[arg(long)]
        session: Option<PathBuf>,

        /// Contact address for new sessions.
        #[arg(long, default_value = "cli")]
        contact: String,

        /// History messages sent to the AI provider.
        #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
        window: usize,
    },

    /// Interactive conversation over stdin.
    ///
    /// Each line is one inbound message. Type `/quit` or send EOF to stop.
    Chat {
        /// Contact address for the session.
        #[arg(long, default_value = "cli")]
        contact: String,

        /// History messages sent to the AI provider.
        #[arg(long, default_value_t = DEFAULT_WINDOW_SIZE)]
        window: usize,
    },
}

/// Keyword rule subcommands.
#[derive(Subcommand, Debug)]
pub enum RuleCommands {
    /// Add or replace a keyword rule.
    #[command(after_help = r#"Examples:
  receptionist rule add hola -k hola -k buenas -r "¡Hola! ¿En qué te ayudo?"
  receptionist rule add humano -k "hablar con" -t transfer -r "Te paso con recepción" -p 10
  receptionist rule add reserva -k "^reserv" -m regex -t flow -r booking
"#)]
    Add {
        /// Rule identifier. Re-using an id replaces the rule in place.
        id: String,

        /// Keyword (repeatable).
        #[arg(short, long = "keyword", required = true)]
        keywords: Vec<String>,

        /// Reply text, or the flow id for `flow` rules.
        #[arg(short, long)]
        response: String,

        /// Match type: exact, contains, starts_with, regex.
        #[arg(short, long, default_value = "contains")]
        match_type: String,

        /// Response type: text, transfer, flow.
        #[arg(short = 't', long, default_value = "text")]
        response_type: String,

        /// Priority; higher wins.
        #[arg(short, long, default_value = "0", allow_negative_numbers = true)]
        priority: i64,

        /// Human-readable name (defaults to the id).
        #[arg(short, long)]
        name: Option<String>,

        /// Compare keywords case-sensitively.
        #[arg(long)]
        case_sensitive: bool,

        /// Store the rule disabled.
        #[arg(long)]
        disabled: bool,
    },

    /// List all rules in load order.
    #[command(alias = "ls")]
    List,
}

/// Conversation flow subcommands.
#[derive(Subcommand, Debug)]
pub enum FlowCommands {
    /// Import flows from a JSON file (one flow or an array).
    Import {
        /// Path to the JSON file.
        file: PathBuf,
    },

    /// List flows.
    #[command(alias = "ls")]
    List,
}

/// Knowledge base subcommands.
#[derive(Subcommand, Debug)]
pub enum KnowledgeCommands {
    /// Add a document.
    Add {
        /// Document title.
        title: String,

        /// Document text (reads stdin when omitted and no file is given).
        content: Option<String>,

        /// Read the document text from a file.
        #[arg(short, long, conflicts_with = "content")]
        file: Option<PathBuf>,
    },

    /// Search the knowledge base the way the AI stage does.
    Search {
        /// Query text.
        query: String,

        /// Maximum number of snippets (1-10).
        #[arg(short = 'k', long, default_value_t = DEFAULT_MAX_CHUNKS)]
        max_chunks: usize,

        /// Minimum relevance score (0.0-1.0).
        #[arg(short, long, default_value_t = DEFAULT_MIN_RELEVANCE)]
        threshold: f64,
    },
}

impl Cli {
    /// Returns the database path, using the default if not specified.
    #[must_use]
    pub fn get_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::storage::DEFAULT_DB_PATH))
    }

    /// Default settings location under the user's config directory.
    #[must_use]
    pub fn default_settings_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("receptionist").join("settings.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn cli(db_path: Option<PathBuf>) -> Cli {
        Cli {
            db_path,
            settings: None,
            verbose: false,
            format: "text".to_string(),
            command: Commands::Rule(RuleCommands::List),
        }
    }

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_default_db_path() {
        assert_eq!(
            cli(None).get_db_path(),
            PathBuf::from(crate::storage::DEFAULT_DB_PATH)
        );
    }

    #[test]
    fn test_custom_db_path() {
        let cli = cli(Some(PathBuf::from("/custom/path.db")));
        assert_eq!(cli.get_db_path(), PathBuf::from("/custom/path.db"));
    }

    #[test]
    fn test_rule_add_parses_repeated_keywords() {
        let cli = Cli::try_parse_from([
            "receptionist",
            "rule",
            "add",
            "hola",
            "-k",
            "hola",
            "-k",
            "buenas",
            "-r",
            "¡Hola!",
            "-p",
            "-1",
        ])
        .unwrap_or_else(|_| unreachable!());
        let Commands::Rule(RuleCommands::Add {
            keywords, priority, ..
        }) = cli.command
        else {
            unreachable!()
        };
        assert_eq!(keywords, vec!["hola", "buenas"]);
        assert_eq!(priority, -1);
    }

    #[test]
    fn test_settings_default_path_is_under_config_dir() {
        if let Some(path) = Cli::default_settings_path() {
            assert!(path.ends_with("receptionist/settings.json"));
        }
    }
}
