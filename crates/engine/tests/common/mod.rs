//! Scripted clinic application shared by the integration tests
//!
//! Hash-routed SPA under `/app`: a login page (form and demo button), a
//! dashboard with stat cards, a patient list with a "new patient" modal and
//! an agenda whose modal opens after a short animation.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use uiprobe_engine::driver::scripted::{FakeElement, ScriptedApp, ScriptedFactory};
use uiprobe_engine::{Isolation, RunConfig, Scenario};

pub const BASE_URL: &str = "http://clinic.test/app";
pub const LOGIN: &str = "http://clinic.test/app/#/login";
pub const DASHBOARD: &str = "http://clinic.test/app/#/dashboard";
pub const PATIENTS: &str = "http://clinic.test/app/#/pacientes";
pub const AGENDA: &str = "http://clinic.test/app/#/agenda";

pub const DEMO_EMAIL: &str = "medico@clinica.com";
pub const DEMO_PASSWORD: &str = "123456";

pub fn env(name: &str) -> Option<String> {
    match name {
        "DEMO_EMAIL" => Some(DEMO_EMAIL.to_string()),
        "DEMO_PASSWORD" => Some(DEMO_PASSWORD.to_string()),
        _ => None,
    }
}

fn login_page(demo_clicks: Arc<AtomicUsize>, flaky_demo: bool) -> Vec<FakeElement> {
    vec![
        FakeElement::heading("login-title", "Acesso ao Sistema"),
        FakeElement::input("email")
            .placeholder("seu@email.com")
            .selector("input[type=\"email\"]")
            .label("E-mail"),
        FakeElement::input("password")
            .selector("input[type=\"password\"]")
            .label("Senha"),
        FakeElement::button("submit", "Acessar Sistema")
            .selector("button[type=\"submit\"]")
            .on_click(|page| {
                let ok = page.value_of("email") == Some(DEMO_EMAIL)
                    && page.value_of("password") == Some(DEMO_PASSWORD);
                if ok {
                    page.navigate(DASHBOARD);
                } else {
                    page.show("login-error");
                }
            }),
        FakeElement::button("demo", "Acesso Demo").on_click(move |page| {
            let previous = demo_clicks.fetch_add(1, Ordering::SeqCst);
            // The flaky variant ignores the very first click of the process.
            if !(flaky_demo && previous == 0) {
                page.navigate(DASHBOARD);
            }
        }),
        FakeElement::new("login-error", "div")
            .text("Credenciais inválidas")
            .selector(".login-error")
            .hidden(),
    ]
}

fn dashboard_page() -> Vec<FakeElement> {
    vec![
        FakeElement::heading("dashboard-title", "Dashboard"),
        FakeElement::new("stat-patients", "div").text("Pacientes 128").selector(".stat-card"),
        FakeElement::new("stat-visits", "div").text("Consultas hoje 12").selector(".stat-card"),
        FakeElement::new("stat-revenue", "div").text("Faturamento R$ 8.400").selector(".stat-card"),
        FakeElement::new("nav-patients", "a")
            .role("link")
            .text("Pacientes")
            .on_click(|page| page.navigate(PATIENTS)),
        FakeElement::new("nav-agenda", "a")
            .role("link")
            .text("Agenda")
            .on_click(|page| page.navigate(AGENDA)),
    ]
}

fn patients_page() -> Vec<FakeElement> {
    vec![
        FakeElement::heading("patients-title", "Pacientes"),
        FakeElement::button("new-patient", "Novo Paciente").on_click(|page| page.show("patient-modal")),
        FakeElement::new("patient-modal", "div").role("dialog").hidden(),
        FakeElement::new("patient-modal-title", "h2")
            .text("Novo Paciente")
            .inside("patient-modal"),
        FakeElement::input("patient-name").label("Nome").inside("patient-modal"),
        FakeElement::button("patient-save", "Salvar").inside("patient-modal"),
        FakeElement::button("patient-cancel", "Cancelar")
            .inside("patient-modal")
            .on_click(|page| page.hide("patient-modal")),
    ]
}

fn agenda_page() -> Vec<FakeElement> {
    vec![
        FakeElement::heading("agenda-title", "Agenda"),
        FakeElement::button("new-appointment", "Nova Consulta")
            .on_click(|page| page.after(3, |page| page.show("agenda-modal"))),
        FakeElement::new("agenda-modal", "div").role("dialog").hidden(),
        FakeElement::new("agenda-modal-title", "h2")
            .text("Agendar Consulta")
            .inside("agenda-modal"),
        FakeElement::button("agenda-close", "×")
            .label("Fechar")
            .inside("agenda-modal")
            .on_click(|page| page.hide("agenda-modal")),
    ]
}

fn build(flaky_demo: bool) -> ScriptedApp {
    let demo_clicks = Arc::new(AtomicUsize::new(0));
    ScriptedApp::new()
        .route(LOGIN, login_page(demo_clicks, flaky_demo))
        .route(DASHBOARD, dashboard_page())
        .route(PATIENTS, patients_page())
        .route(AGENDA, agenda_page())
        .settle_polls(1)
}

pub fn clinic() -> ScriptedApp {
    build(false)
}

/// The demo button ignores its first click across all sessions
pub fn flaky_clinic() -> ScriptedApp {
    build(true)
}

pub fn factory() -> ScriptedFactory {
    ScriptedFactory::new(clinic())
}

pub fn config(artifact_dir: &Path) -> RunConfig {
    RunConfig {
        base_url: BASE_URL.to_string(),
        artifact_dir: artifact_dir.to_path_buf(),
        step_timeout_ms: 1_000,
        settle_timeout_ms: 1_000,
        isolation: Isolation::PerScenario,
        ..RunConfig::default()
    }
}

pub fn scenario(yaml: &str) -> Scenario {
    Scenario::from_yaml_with_env(yaml, "test", &env).unwrap()
}

/// Load a scenario file from the repository's `scenarios/` directory
pub fn sample(file: &str) -> Scenario {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../scenarios")
        .join(file);
    let yaml = std::fs::read_to_string(&path).unwrap();
    Scenario::from_yaml_with_env(&yaml, file, &env).unwrap()
}

pub const LOGIN_FORM: &str = r#"
name: login-form
steps:
  - kind: navigate
    value: /#/login
  - kind: fill
    target:
      description: email field
      primary: { placeholder: "seu@email.com" }
      fallbacks:
        - { css: 'input[type="email"]' }
    value: ${DEMO_EMAIL}
  - kind: fill
    target:
      description: password field
      primary: { css: 'input[type="password"]' }
    value: ${DEMO_PASSWORD}
  - kind: click
    target:
      description: submit button
      primary: { role: { role: button, name: Acessar Sistema } }
  - kind: wait_for_url
    value: "**/dashboard"
"#;
