//! End-to-end tests for the `receptionist` binary.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

struct Workspace {
    _dir: TempDir,
    db: PathBuf,
    settings: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("gym.db");
        let settings = dir.path().join("settings.json");
        std::fs::write(
            &settings,
            r#"{
                "welcomeMessage": "¡Bienvenido al gimnasio!",
                "fallbackMessage": "Perdona, no te he entendido."
            }"#,
        )
        .unwrap();
        Self {
            _dir: dir,
            db,
            settings,
        }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("receptionist").unwrap();
        cmd.env_remove("RUST_LOG")
            .arg("--db-path")
            .arg(&self.db)
            .arg("--settings")
            .arg(&self.settings);
        cmd
    }

    fn dir(&self) -> &Path {
        self.db.parent().unwrap()
    }
}

#[test]
fn test_help() {
    Command::cargo_bin("receptionist")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("receptionist"));
}

#[test]
fn test_requires_init() {
    let ws = Workspace::new();
    ws.cmd()
        .args(["rule", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn test_init_twice_needs_force() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    ws.cmd().arg("init").assert().failure();
    ws.cmd().args(["init", "--force"]).assert().success();
}

#[test]
fn test_rule_add_and_list() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    ws.cmd()
        .args(["rule", "add", "precio", "-k", "precio", "-k", "cuota", "-r", "39€/mes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Saved rule: precio"));
    ws.cmd()
        .args(["rule", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("precio, cuota"));
}

#[test]
fn test_rule_add_rejects_unknown_match_type() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    ws.cmd()
        .args(["rule", "add", "x", "-k", "x", "-r", "y", "-m", "fuzzy"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("match type"));
}

#[test]
fn test_send_conversation_with_session_file() {
    let ws = Workspace::new();
    let session = ws.dir().join("ana.json");
    ws.cmd().arg("init").assert().success();
    ws.cmd()
        .args(["rule", "add", "precio", "-k", "precio", "-r", "39€/mes"])
        .assert()
        .success();

    ws.cmd()
        .args(["send", "precio", "--session"])
        .arg(&session)
        .assert()
        .success()
        .stdout("¡Bienvenido al gimnasio!\n");
    ws.cmd()
        .args(["send", "precio", "--session"])
        .arg(&session)
        .assert()
        .success()
        .stdout("39€/mes\n");
    ws.cmd()
        .args(["send", "algo raro", "--session"])
        .arg(&session)
        .assert()
        .success()
        .stdout("Perdona, no te he entendido.\n");
}

#[test]
fn test_send_json_output() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    ws.cmd()
        .args(["--format", "json", "send", "hola"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"success\": true"));
}

#[test]
fn test_flow_import_and_walkthrough() {
    let ws = Workspace::new();
    let flow = ws.dir().join("trial.json");
    let session = ws.dir().join("session.json");
    std::fs::write(
        &flow,
        r#"{
            "id": "trial",
            "name": "Clase de prueba",
            "triggerKeywords": ["clase de prueba"],
            "steps": [
                {"id": "name", "content": "¿Cómo te llamas?"},
                {"id": "day", "content": "¿Qué día te viene bien?"}
            ],
            "completionMessage": "¡Reservado!"
        }"#,
    )
    .unwrap();

    ws.cmd().arg("init").assert().success();
    ws.cmd().args(["flow", "import"]).arg(&flow).assert().success();
    ws.cmd()
        .args(["flow", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trial (Clase de prueba)"));

    let turn = |text: &str, expected: &str| {
        ws.cmd()
            .args(["send", text, "--session"])
            .arg(&session)
            .assert()
            .success()
            .stdout(predicate::str::contains(expected.to_string()));
    };
    turn("quiero una clase de prueba", "¿Cómo te llamas?");
    turn("Ana", "¿Qué día te viene bien?");
    turn("el martes", "¡Reservado!");
}

#[test]
fn test_knowledge_add_and_search() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    for (title, content) in [
        ("Horario", "Abrimos de lunes a viernes de 7 a 23"),
        ("Cuotas", "La cuota mensual cuesta 39 euros"),
        ("Parking", "Parking gratuito para socios"),
        ("Duchas", "Vestuarios con duchas y taquillas"),
    ] {
        ws.cmd()
            .args(["knowledge", "add", title, content])
            .assert()
            .success();
    }
    ws.cmd()
        .args(["knowledge", "search", "precio de la cuota", "-t", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cuotas"));
}

#[test]
fn test_missing_settings_file_fails() {
    let ws = Workspace::new();
    ws.cmd().arg("init").assert().success();
    Command::cargo_bin("receptionist")
        .unwrap()
        .arg("--db-path")
        .arg(&ws.db)
        .arg("--settings")
        .arg(ws.dir().join("missing.json"))
        .args(["send", "hola"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load settings"));
}
