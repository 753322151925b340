use shipquote_core::config::{AppConfig, LoadOptions};
use shipquote_db::repositories::{RateRepository, SqlRateRepository};
use shipquote_db::{connect_with_config, migrations, DbPool};
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

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 6 };

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
            checks.extend(database_checks(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck::fail("config_validation", error.to_string()));
            for name in ["database_connectivity", "schema_migrations", "shipping_methods"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
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

fn database_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return vec![
                DoctorCheck::fail(
                    "database_connectivity",
                    format!("failed to initialize async runtime: {error}"),
                ),
                DoctorCheck::skipped("schema_migrations", "the async runtime did not start"),
                DoctorCheck::skipped("shipping_methods", "the async runtime did not start"),
            ];
        }
    };

    runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => {
                return vec![
                    DoctorCheck::fail(
                        "database_connectivity",
                        format!("failed to connect to database: {error}"),
                    ),
                    DoctorCheck::skipped("schema_migrations", "the database is unreachable"),
                    DoctorCheck::skipped("shipping_methods", "the database is unreachable"),
                ];
            }
        };

        let mut checks = vec![DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}`", config.database.url),
        )];
        checks.extend(schema_checks(&pool).await);
        pool.close().await;
        checks
    })
}

async fn schema_checks(pool: &DbPool) -> Vec<DoctorCheck> {
    match migrations::applied_count(pool).await {
        Ok(0) => {
            return vec![
                DoctorCheck::fail("schema_migrations", "no migrations applied; run `shipquote migrate`"),
                DoctorCheck::skipped("shipping_methods", "the schema is missing"),
            ];
        }
        Ok(applied) => {
            let expected = migrations::MIGRATOR
                .iter()
                .filter(|migration| migration.migration_type.is_up_migration())
                .count() as i64;
            if applied < expected {
                return vec![
                    DoctorCheck::fail(
                        "schema_migrations",
                        format!("{applied} of {expected} migrations applied; run `shipquote migrate`"),
                    ),
                    DoctorCheck::skipped("shipping_methods", "the schema is out of date"),
                ];
            }
        }
        Err(error) => {
            return vec![
                DoctorCheck::fail("schema_migrations", format!("failed to read migrations: {error}")),
                DoctorCheck::skipped("shipping_methods", "the schema could not be inspected"),
            ];
        }
    }

    let methods_check = match SqlRateRepository::new(pool.clone()).list_active_shipping_methods().await
    {
        Ok(methods) if methods.is_empty() => DoctorCheck::fail(
            "shipping_methods",
            "no active shipping methods; run `shipquote seed` or load rate data",
        ),
        Ok(methods) => DoctorCheck::pass(
            "shipping_methods",
            format!("{} active shipping methods", methods.len()),
        ),
        Err(error) => DoctorCheck::fail("shipping_methods", error.to_string()),
    };

    vec![DoctorCheck::pass("schema_migrations", "schema is current"), methods_check]
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
