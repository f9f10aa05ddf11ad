use guestline_core::config::{AppConfig, LoadOptions};
use guestline_db::{connect, connection::ping, migrations};
use secrecy::ExposeSecret;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Exits 0 when every check passes and 1 otherwise.
pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck::pass(
                "config_validation",
                "configuration loaded and validated",
            ));
            checks.push(check_chat_token(&config));
            checks.push(check_platform_credentials(&config));
            checks.extend(check_audit_database(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            checks.push(DoctorCheck::skipped("chat_token_readiness"));
            checks.push(DoctorCheck::skipped("platform_credentials"));
            checks.push(DoctorCheck::skipped("database_connectivity"));
            checks.push(DoctorCheck::skipped("audit_schema"));
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Only the public bot id half of the token is ever printed.
fn check_chat_token(config: &AppConfig) -> DoctorCheck {
    let token = config.chat.bot_token.expose_secret();
    match token.split_once(':') {
        Some((bot_id, _)) => DoctorCheck::pass(
            "chat_token_readiness",
            format!("bot {bot_id} via {}", config.chat.api_base),
        ),
        None => DoctorCheck::fail("chat_token_readiness", "bot token is malformed"),
    }
}

fn check_platform_credentials(config: &AppConfig) -> DoctorCheck {
    DoctorCheck::pass(
        "platform_credentials",
        format!(
            "api key present for org `{}` at {}",
            config.platform.org_id, config.platform.base_url
        ),
    )
}

fn check_audit_database(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("audit_schema"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::fail("audit_schema", "database unreachable"),
                ];
            }
        };

        let connectivity = match ping(&pool).await {
            Ok(()) => DoctorCheck::pass(
                "database_connectivity",
                format!("connected using `{}`", config.database.url),
            ),
            Err(error) => DoctorCheck::fail("database_connectivity", error.to_string()),
        };

        let known = migrations::known_versions();
        let schema = match migrations::applied_versions(&pool).await {
            Ok(applied) => {
                let pending = known.iter().filter(|version| !applied.contains(version)).count();
                if pending == 0 {
                    let details = format!("{} migrations applied", applied.len());
                    DoctorCheck::pass("audit_schema", details)
                } else {
                    DoctorCheck::fail(
                        "audit_schema",
                        format!("{pending} pending migrations; run `guestline migrate`"),
                    )
                }
            }
            Err(_) => DoctorCheck::fail(
                "audit_schema",
                format!("{} pending migrations; run `guestline migrate`", known.len()),
            ),
        };

        pool.close().await;
        vec![connectivity, schema]
    })
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
