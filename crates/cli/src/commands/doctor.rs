use palaver_core::config::{AppConfig, LoadOptions};
use palaver_db::{connect_with_settings, connection::ping, migrations};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_DB_CONNECTIVITY, EXIT_RUNTIME_INIT};

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

#[derive(Debug, Serialize)]
struct DoctorReport {
    command: &'static str,
    status: &'static str,
    error_class: Option<&'static str>,
    message: String,
    checks: Vec<DoctorCheck>,
    #[serde(skip)]
    exit_code: u8,
}

pub fn run(json_output: bool) -> CommandResult {
    run_with(LoadOptions::default(), json_output)
}

pub fn run_with(options: LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = report.exit_code;

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"command\":\"doctor\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();
    let mut failure: Option<(&'static str, u8)> = None;

    match AppConfig::load(options) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            let (database, schema, database_failure) = check_database(&config);
            checks.push(database);
            checks.push(schema);
            failure = database_failure;
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["database_connectivity", "schema_migrations"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
            failure = failure.or(Some(("config_validation", EXIT_CONFIG)));
        }
    }

    let (status, error_class, message, exit_code) = match failure {
        None => ("ok", None, "doctor: all readiness checks passed".to_string(), 0),
        Some((class, code)) => {
            ("error", Some(class), "doctor: one or more readiness checks failed".to_string(), code)
        }
    };

    DoctorReport { command: "doctor", status, error_class, message, checks, exit_code }
}

fn check_database(
    config: &AppConfig,
) -> (DoctorCheck, DoctorCheck, Option<(&'static str, u8)>) {
    let skipped_schema = |details: &str| DoctorCheck {
        name: "schema_migrations",
        status: CheckStatus::Skipped,
        details: details.to_string(),
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return (
                DoctorCheck {
                    name: "database_connectivity",
                    status: CheckStatus::Fail,
                    details: format!("failed to initialize async runtime: {error}"),
                },
                skipped_schema("skipped because the async runtime did not start"),
                Some(("runtime_init", EXIT_RUNTIME_INIT)),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| format!("failed to connect to database: {error}"))?;
        ping(&pool).await.map_err(|error| format!("database ping failed: {error}"))?;

        let pending = migrations::pending_count(&pool)
            .await
            .map_err(|error| format!("could not read migration ledger: {error}"));
        pool.close().await;
        Ok::<Result<usize, String>, String>(pending)
    });

    match result {
        Ok(pending) => {
            let connected = DoctorCheck {
                name: "database_connectivity",
                status: CheckStatus::Pass,
                details: format!("connected using `{}`", config.database.url),
            };
            let schema = match pending {
                Ok(0) => DoctorCheck {
                    name: "schema_migrations",
                    status: CheckStatus::Pass,
                    details: "all migrations applied".to_string(),
                },
                Ok(count) => DoctorCheck {
                    name: "schema_migrations",
                    status: CheckStatus::Skipped,
                    details: format!("{count} migration(s) pending; run `palaver migrate`"),
                },
                Err(error) => DoctorCheck {
                    name: "schema_migrations",
                    status: CheckStatus::Skipped,
                    details: error,
                },
            };
            (connected, schema, None)
        }
        Err(error) => (
            DoctorCheck { name: "database_connectivity", status: CheckStatus::Fail, details: error },
            skipped_schema("skipped because the database is unreachable"),
            Some(("db_connectivity", EXIT_DB_CONNECTIVITY)),
        ),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.message.clone());

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
