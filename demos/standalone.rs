use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use tms_timesheet_bot::{
    config::{Config, Timeouts},
    helpers::{csv_loader::load_rows, login::SignalLogin},
    logging,
    models::{WeekId, WeekSpec, Weekday},
    page::fake::FakePage,
    service::FillService,
};

const SAMPLE_CSV: &str = "\
project_number,project_name,project_task,monday,tuesday,wednesday,thursday,friday,saturday,sunday
8-26214-10-42,TD_Academy_Simulator,01 - Unspecified,7.4,7.4,7.4,7.4,7.4,,
8-26214-30-01,PR_Engine,01 - Unspecified,,,,,1.0,,
";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(false);

    info!("Starting TMS timesheet bot example");

    // An in-memory TMS showing week 48, with one cell already filled in week 49
    let mut page = FakePage::new(WeekId::new(2025, 48))
        .with_project("8-26214-10-42", "TD_Academy_Simulator", "01 - Unspecified")
        .with_project("8-26214-30-01", "PR_Engine", "01 - Unspecified")
        .with_value(WeekId::new(2025, 49), "8-26214-30-01", Weekday::Friday, "2.0");

    let rows = load_rows(SAMPLE_CSV.as_bytes())?;
    let weeks = WeekSpec::parse("48-49")?;

    let config = Config {
        auto_submit: true,
        no_overwrite: true,
        timeouts: Timeouts::instant(),
        ..Config::default()
    };
    let service = FillService::new(config);

    // Login is confirmed over HTTP instead of on stdin
    let gate = SignalLogin::new();
    let app = Router::new()
        .nest("/api/login", gate.router())
        .route("/health", axum::routing::get(|| async { "OK" }));

    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    info!("Server running on http://127.0.0.1:3000");
    info!("Run: curl -X POST http://127.0.0.1:3000/api/login/login-confirmed");
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    let summary = service
        .run_session(&mut page, &gate, &rows, Some(&weeks))
        .await?;
    println!("{summary}");

    server.abort();
    Ok(())
}

/*
Example usage:

1. cargo run --example standalone
2. POST /api/login/login-confirmed
   - Stands in for the operator confirming the manual login
3. GET /health

The demo will:
- Fill weeks 48 and 49 on the in-memory TMS
- Keep the value already present for PR_Engine on Friday of week 49
- Save each week and print the summary
*/
