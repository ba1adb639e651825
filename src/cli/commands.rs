//! CLI command implementations.
//!
//! Contains the business logic for each CLI command.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

use crate::cli::output::{OutputFormat, format_flows, format_hits, format_response, format_rules};
use crate::cli::parser::{Cli, Commands, FlowCommands, KnowledgeCommands, RuleCommands};
use crate::core::{ChatbotSettings, ConversationFlow, KeywordRule, MatchType, ResponseType, Session};
use crate::engine::{AgentEngine, EngineOptions, extract_keywords};
use crate::error::{CommandError, Error, Result, StorageError};
use crate::provider::ProviderFactory;
use crate::storage::{FlowStore, KnowledgeStore, SqliteStore};

/// Line that ends an interactive chat.
const QUIT_COMMAND: &str = "/quit";

/// Executes the CLI command.
///
/// # Returns
///
/// Result with output string on success.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub async fn execute(cli: &Cli) -> Result<String> {
    let format = OutputFormat::parse(&cli.format);
    let db_path = cli.get_db_path();

    match &cli.command {
        Commands::Init { force } => cmd_init(&db_path, *force, format),
        Commands::Rule(sub) => execute_rule(sub, &db_path, format),
        Commands::Flow(sub) => execute_flow(sub, &db_path, format),
        Commands::Knowledge(sub) => execute_knowledge(sub, &db_path, format).await,
        Commands::Send {
            text,
            session,
            contact,
            window,
        } => {
            let settings = load_settings(cli.settings.as_deref())?;
            cmd_send(&db_path, settings, text, session.as_deref(), contact, *window, format).await
        }
        Commands::Chat { contact, window } => {
            let settings = load_settings(cli.settings.as_deref())?;
            cmd_chat(&db_path, settings, contact, *window, format).await
        }
    }
}

fn execute_rule(cmd: &RuleCommands, db_path: &Path, format: OutputFormat) -> Result<String> {
    match cmd {
        RuleCommands::Add {
            id,
            keywords,
            response,
            match_type,
            response_type,
            priority,
            name,
            case_sensitive,
            disabled,
        } => {
            let match_type = MatchType::parse(match_type).ok_or_else(|| {
                CommandError::InvalidArgument(format!(
                    "match type must be exact, contains, starts_with or regex (got {match_type})"
                ))
            })?;
            let response_type = ResponseType::parse(response_type).ok_or_else(|| {
                CommandError::InvalidArgument(format!(
                    "response type must be text, transfer or flow (got {response_type})"
                ))
            })?;
            let rule = KeywordRule {
                id: id.clone(),
                name: name.clone().unwrap_or_else(|| id.clone()),
                keywords: keywords.clone(),
                match_type,
                response_type,
                response: response.clone(),
                priority: *priority,
                enabled: !*disabled,
                case_sensitive: *case_sensitive,
            };
            cmd_rule_add(db_path, &rule, format)
        }
        RuleCommands::List => cmd_rule_list(db_path, format),
    }
}

fn execute_flow(cmd: &FlowCommands, db_path: &Path, format: OutputFormat) -> Result<String> {
    match cmd {
        FlowCommands::Import { file } => cmd_flow_import(db_path, file, format),
        FlowCommands::List => cmd_flow_list(db_path, format),
    }
}

async fn execute_knowledge(
    cmd: &KnowledgeCommands,
    db_path: &Path,
    format: OutputFormat,
) -> Result<String> {
    match cmd {
        KnowledgeCommands::Add {
            title,
            content,
            file,
        } => {
            let content = match (content, file) {
                (Some(text), _) => text.clone(),
                (None, Some(path)) => std::fs::read_to_string(path)?,
                (None, None) => {
                    let mut text = String::new();
                    tokio::io::stdin().read_to_string(&mut text).await?;
                    text
                }
            };
            cmd_knowledge_add(db_path, title, &content, format)
        }
        KnowledgeCommands::Search {
            query,
            max_chunks,
            threshold,
        } => cmd_knowledge_search(db_path, query, *max_chunks, *threshold, format).await,
    }
}

/// Opens storage and ensures it's initialized.
fn open_storage(db_path: &Path) -> Result<SqliteStore> {
    if !db_path.exists() {
        return Err(StorageError::NotInitialized.into());
    }
    let store = SqliteStore::open(db_path)?;
    if !store.is_initialized()? {
        return Err(StorageError::NotInitialized.into());
    }
    Ok(store)
}

/// Loads chatbot settings.
///
/// An explicit path must exist. Without one, the default location is used
/// when present and built-in defaults otherwise.
fn load_settings(explicit: Option<&Path>) -> Result<ChatbotSettings> {
    let (path, required) = match explicit {
        Some(path) => (Some(path.to_path_buf()), true),
        None => (Cli::default_settings_path(), false),
    };

    match path {
        Some(path) if required || path.exists() => {
            debug!(path = %path.display(), "loading settings");
            ChatbotSettings::load(&path).map_err(|e| {
                Error::from(CommandError::Settings {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            })
        }
        _ => {
            debug!("no settings file, using defaults");
            Ok(ChatbotSettings::default())
        }
    }
}

fn build_engine(db_path: &Path, settings: ChatbotSettings, window: usize) -> Result<AgentEngine> {
    let store = open_storage(db_path)?;
    let options = EngineOptions {
        window_size: window,
        ..EngineOptions::default()
    };
    Ok(AgentEngine::from_stores(
        settings,
        &store,
        &store,
        Arc::new(ProviderFactory::new()),
        Arc::new(store.clone()),
        options,
    )?)
}

// ==================== Command Implementations ====================

fn cmd_init(db_path: &Path, force: bool, format: OutputFormat) -> Result<String> {
    if db_path.exists() && !force {
        return Err(CommandError::ExecutionFailed(
            "Database already exists. Use --force to reinitialize.".to_string(),
        )
        .into());
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to create directory: {e}"))
        })?;
    }

    if force && db_path.exists() {
        std::fs::remove_file(db_path).map_err(|e| {
            CommandError::ExecutionFailed(format!("Failed to remove existing database: {e}"))
        })?;
    }

    SqliteStore::open(db_path)?.init()?;

    match format {
        OutputFormat::Text => Ok(format!(
            "Initialized receptionist database at: {}\n",
            db_path.display()
        )),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "success": true,
            "path": db_path.to_string_lossy(),
            "force": force
        }))),
    }
}

fn cmd_rule_add(db_path: &Path, rule: &KeywordRule, format: OutputFormat) -> Result<String> {
    if rule.keywords.iter().all(|k| k.trim().is_empty()) {
        return Err(CommandError::InvalidArgument("at least one non-empty keyword is required".to_string()).into());
    }
    if rule.match_type == MatchType::Regex {
        for keyword in &rule.keywords {
            if let Err(e) = regex::Regex::new(keyword) {
                return Err(CommandError::InvalidArgument(format!("invalid regex {keyword:?}: {e}")).into());
            }
        }
    }

    let store = open_storage(db_path)?;
    store.upsert_rule(rule)?;

    match format {
        OutputFormat::Text => Ok(format!("Saved rule: {}\n", rule.id)),
        OutputFormat::Json => Ok(format.to_json(rule)),
    }
}

fn cmd_rule_list(db_path: &Path, format: OutputFormat) -> Result<String> {
    let store = open_storage(db_path)?;
    Ok(format_rules(&store.list_rules()?, format))
}

fn cmd_flow_import(db_path: &Path, file: &Path, format: OutputFormat) -> Result<String> {
    let text = std::fs::read_to_string(file)?;
    let value: serde_json::Value = serde_json::from_str(&text).map_err(StorageError::from)?;
    let flows: Vec<ConversationFlow> = if value.is_array() {
        serde_json::from_value(value).map_err(StorageError::from)?
    } else {
        vec![serde_json::from_value(value).map_err(StorageError::from)?]
    };

    for flow in &flows {
        if flow.steps.is_empty() {
            return Err(CommandError::InvalidArgument(format!("flow {} has no steps", flow.id)).into());
        }
    }

    let store = open_storage(db_path)?;
    for flow in &flows {
        store.upsert_flow(flow)?;
    }

    match format {
        OutputFormat::Text => Ok(format!(
            "Imported {} flow(s): {}\n",
            flows.len(),
            flows.iter().map(|f| f.id.as_str()).collect::<Vec<_>>().join(", ")
        )),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "imported": flows.iter().map(|f| &f.id).collect::<Vec<_>>(),
        }))),
    }
}

fn cmd_flow_list(db_path: &Path, format: OutputFormat) -> Result<String> {
    let store = open_storage(db_path)?;
    Ok(format_flows(&store.load_flows()?, format))
}

fn cmd_knowledge_add(db_path: &Path, title: &str, content: &str, format: OutputFormat) -> Result<String> {
    if content.trim().is_empty() {
        return Err(CommandError::InvalidArgument("document content is empty".to_string()).into());
    }
    let store = open_storage(db_path)?;
    let id = store.add_document(title, content.trim())?;

    match format {
        OutputFormat::Text => Ok(format!("Added document {id}: {title}\n")),
        OutputFormat::Json => Ok(format.to_json(&serde_json::json!({
            "id": id,
            "title": title,
        }))),
    }
}

async fn cmd_knowledge_search(
    db_path: &Path,
    query: &str,
    max_chunks: usize,
    threshold: f64,
    format: OutputFormat,
) -> Result<String> {
    let store = open_storage(db_path)?;
    let keywords = extract_keywords(query);
    let hits = if keywords.is_empty() {
        Vec::new()
    } else {
        store
            .search(&keywords, max_chunks.clamp(1, 10), threshold.clamp(0.0, 1.0))
            .await?
    };
    Ok(format_hits(&keywords, &hits, format))
}

async fn cmd_send(
    db_path: &Path,
    settings: ChatbotSettings,
    text: &str,
    session_file: Option<&Path>,
    contact: &str,
    window: usize,
    format: OutputFormat,
) -> Result<String> {
    let engine = build_engine(db_path, settings, window)?;

    let mut session = match session_file {
        Some(path) if path.exists() => {
            let json = std::fs::read_to_string(path)?;
            serde_json::from_str(&json).map_err(StorageError::from)?
        }
        _ => new_session(contact),
    };

    let response = engine.process_message(text, &mut session).await;

    if let Some(path) = session_file {
        let json = serde_json::to_string_pretty(&session).map_err(StorageError::from)?;
        std::fs::write(path, json)?;
    }

    Ok(format_response(&response, format))
}

async fn cmd_chat(
    db_path: &Path,
    settings: ChatbotSettings,
    contact: &str,
    window: usize,
    format: OutputFormat,
) -> Result<String> {
    let engine = build_engine(db_path, settings, window)?;
    let mut session = new_session(contact);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line == QUIT_COMMAND {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let response = engine.process_message(line, &mut session).await;
        stdout
            .write_all(format_response(&response, format).as_bytes())
            .await
            .map_err(|e| CommandError::Output(e.to_string()))?;
        stdout
            .flush()
            .await
            .map_err(|e| CommandError::Output(e.to_string()))?;
    }

    Ok(String::new())
}

fn new_session(contact: &str) -> Session {
    let id = format!("cli-{}", chrono::Utc::now().timestamp_millis());
    Session::new(id, contact)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap_or_else(|_| unreachable!());
        let db_path = temp_dir.path().join("test.db");
        (temp_dir, db_path)
    }

    fn settings() -> ChatbotSettings {
        ChatbotSettings {
            welcome_message: "¡Bienvenido!".to_string(),
            fallback_message: "No te he entendido.".to_string(),
            ..ChatbotSettings::default()
        }
    }

    #[test]
    fn test_cmd_init() {
        let (_temp_dir, db_path) = setup();
        let result = cmd_init(&db_path, false, OutputFormat::Text);
        assert!(result.is_ok());
        assert!(db_path.exists());
    }

    #[test]
    fn test_cmd_init_already_exists() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false, OutputFormat::Text).unwrap_or_else(|_| unreachable!());

        assert!(cmd_init(&db_path, false, OutputFormat::Text).is_err());
        assert!(cmd_init(&db_path, true, OutputFormat::Text).is_ok());
    }

    #[test]
    fn test_commands_require_init() {
        let (_temp_dir, db_path) = setup();
        let err = cmd_rule_list(&db_path, OutputFormat::Text);
        assert!(matches!(
            err,
            Err(Error::Storage(StorageError::NotInitialized))
        ));
    }

    #[test]
    fn test_cmd_rule_add_and_list() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false, OutputFormat::Text).unwrap_or_else(|_| unreachable!());

        let empty = cmd_rule_list(&db_path, OutputFormat::Text).unwrap_or_default();
        assert!(empty.contains("No rules"));

        let rule = KeywordRule::text("precio", &["precio", "cuota"], "39€/mes");
        let result = cmd_rule_add(&db_path, &rule, OutputFormat::Text);
        assert!(result.unwrap_or_default().contains("precio"));

        let listed = cmd_rule_list(&db_path, OutputFormat::Text).unwrap_or_default();
        assert!(listed.contains("precio, cuota"));
    }

    #[test]
    fn test_cmd_rule_add_rejects_bad_regex() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false, OutputFormat::Text).unwrap_or_else(|_| unreachable!());

        let rule = KeywordRule::text("bad", &["(unclosed"], "x").with_match_type(MatchType::Regex);
        assert!(cmd_rule_add(&db_path, &rule, OutputFormat::Text).is_err());
    }

    #[test]
    fn test_cmd_flow_import_single_and_array() {
        let (temp_dir, db_path) = setup();
        cmd_init(&db_path, false, OutputFormat::Text).unwrap_or_else(|_| unreachable!());

        let single = temp_dir.path().join("one.json");
        std::fs::write(
            &single,
            r#"{"id":"trial","name":"Prueba","triggerKeywords":["clase de prueba"],
                "steps":[{"id":"name","content":"¿Nombre?"}]}"#,
        )
        .unwrap_or_else(|_| unreachable!());
        let many = temp_dir.path().join("many.json");
        std::fs::write(
            &many,
            r#"[{"id":"a","name":"A","steps":[{"id":"s","content":"?"}]},
                {"id":"b","name":"B","steps":[{"id":"s","content":"?"}]}]"#,
        )
        .unwrap_or_else(|_| unreachable!());

        assert!(cmd_flow_import(&db_path, &single, OutputFormat::Text).is_ok());
        let out = cmd_flow_import(&db_path, &many, OutputFormat::Text).unwrap_or_default();
        assert!(out.contains("Imported 2 flow(s)"));

        let listed = cmd_flow_list(&db_path, OutputFormat::Text).unwrap_or_default();
        assert!(listed.contains("trial (Prueba) - 1 steps"));
        assert!(listed.contains("triggers: clase de prueba"));
    }

    #[tokio::test]
    async fn test_cmd_knowledge_add_and_search() {
        let (_temp_dir, db_path) = setup();
        cmd_init(&db_path, false, OutputFormat::Text).unwrap_or_else(|_| unreachable!());

        for (title, content) in [
            ("Horario", "Abrimos de lunes a viernes de 7 a 23"),
            ("Cuotas", "La cuota mensual cuesta 39 euros"),
            ("Parking", "Parking gratuito para socios"),
        ] {
            cmd_knowledge_add(&db_path, title, content, OutputFormat::Text)
                .unwrap_or_else(|_| unreachable!());
        }

        let out = cmd_knowledge_search(&db_path, "¿cuánto es la cuota?", 3, 0.0, OutputFormat::Text)
            .await
            .unwrap_or_default();
        assert!(out.contains("Cuotas"));
        assert!(!out.contains("Parking"));

        let none = cmd_knowledge_search(&db_path, "ok", 3, 0.0, OutputFormat::Text)
            .await
            .unwrap_or_default();
        assert!(none.contains("No searchable keywords"));
    }

    #[tokio::test]
    async fn test_cmd_send_persists_session() {
        let (temp_dir, db_path) = setup();
        cmd_init(&db_path, false, OutputFormat::Text).unwrap_or_else(|_| unreachable!());
        cmd_rule_add(
            &db_path,
            &KeywordRule::text("precio", &["precio"], "39€/mes"),
            OutputFormat::Text,
        )
        .unwrap_or_else(|_| unreachable!());
        let session_file = temp_dir.path().join("session.json");

        let first = cmd_send(&db_path, settings(), "precio", Some(&session_file), "ana", 20, OutputFormat::Text)
            .await
            .unwrap_or_default();
        assert_eq!(first, "¡Bienvenido!\n");
        assert!(session_file.exists());

        let second = cmd_send(&db_path, settings(), "precio", Some(&session_file), "ana", 20, OutputFormat::Text)
            .await
            .unwrap_or_default();
        assert_eq!(second, "39€/mes\n");

        let third = cmd_send(&db_path, settings(), "otra cosa", Some(&session_file), "ana", 20, OutputFormat::Text)
            .await
            .unwrap_or_default();
        assert_eq!(third, "No te he entendido.\n");
    }

    #[test]
    fn test_load_settings_explicit_missing_is_error() {
        let (temp_dir, _) = setup();
        let missing = temp_dir.path().join("nope.json");
        assert!(matches!(
            load_settings(Some(&missing)),
            Err(Error::Command(CommandError::Settings { .. }))
        ));
    }

    #[test]
    fn test_load_settings_explicit_file() {
        let (temp_dir, _) = setup();
        let path = temp_dir.path().join("settings.json");
        std::fs::write(&path, r#"{"enabled": false, "fallbackMessage": "Nada"}"#)
            .unwrap_or_else(|_| unreachable!());
        let settings = load_settings(Some(&path)).unwrap_or_else(|_| unreachable!());
        assert!(!settings.enabled);
        assert_eq!(settings.fallback_message, "Nada");
    }
}
