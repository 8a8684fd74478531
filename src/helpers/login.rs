//! Manual-login confirmation strategies.
//!
//! Login is done by a human in the browser window. A [`LoginGate`] decides
//! when the run may continue.

use async_trait::async_trait;
use axum::{Router, extract::State, http::StatusCode, routing::get, routing::post};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{error, info, warn};

use crate::error::LoginError;
use crate::logging;
use crate::page::{Locator, TimesheetPage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Confirmed,
    /// The ceiling passed without confirmation and the run went ahead anyway.
    AssumedAfterTimeout,
}

#[async_trait]
pub trait LoginGate: Send + Sync {
    async fn confirm(&self, page: &mut dyn TimesheetPage) -> Result<LoginOutcome, LoginError>;
}

/// Wait for the operator to press ENTER on stdin.
#[derive(Debug, Default)]
pub struct PromptLogin;

#[async_trait]
impl LoginGate for PromptLogin {
    async fn confirm(&self, _page: &mut dyn TimesheetPage) -> Result<LoginOutcome, LoginError> {
        logging::section("MANUAL LOGIN REQUIRED");
        info!("Please log in to TMS in the browser window.");
        info!("Press ENTER when you are logged in and see the timesheet table...");

        let mut line = String::new();
        let read = BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
        if read == 0 {
            return Err(LoginError::PromptClosed);
        }

        info!("Login confirmed, continuing");
        Ok(LoginOutcome::Confirmed)
    }
}

/// Poll the page for the timesheet table, proceeding after `ceiling` regardless.
#[derive(Debug, Clone)]
pub struct PollLogin {
    pub table: Locator,
    pub interval: Duration,
    pub ceiling: Duration,
}

#[async_trait]
impl LoginGate for PollLogin {
    async fn confirm(&self, page: &mut dyn TimesheetPage) -> Result<LoginOutcome, LoginError> {
        logging::section("WAITING FOR LOGIN");
        info!(
            "Log in to TMS in the browser window; the table is checked every {:?}",
            self.interval
        );

        let started = Instant::now();
        loop {
            if page.wait_for_visible(&self.table, Duration::ZERO).await? {
                info!("Timesheet table visible, login confirmed");
                return Ok(LoginOutcome::Confirmed);
            }
            if started.elapsed() >= self.ceiling {
                warn!(
                    "Login not confirmed after {:?}; continuing anyway",
                    self.ceiling
                );
                return Ok(LoginOutcome::AssumedAfterTimeout);
            }
            sleep(self.interval).await;
        }
    }
}

/// Wait for an external signal, e.g. `POST /login-confirmed` from another tool.
#[derive(Debug, Clone, Default)]
pub struct SignalLogin {
    notify: Arc<Notify>,
}

impl SignalLogin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release a pending or future `confirm`.
    pub fn signal(&self) {
        self.notify.notify_one();
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/login-confirmed", post(login_confirmed))
            .route("/health", get(|| async { "OK" }))
            .with_state(self.clone())
    }

    /// Serve [`SignalLogin::router`] on `addr` in the background.
    pub async fn listen(&self, addr: SocketAddr) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(addr).await?;
        let local = listener.local_addr()?;
        let router = self.router();

        info!("Login signal endpoint listening on http://{}/login-confirmed", local);
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                error!("Login signal server failed: {}", e);
            }
        });

        Ok((local, handle))
    }
}

async fn login_confirmed(State(gate): State<SignalLogin>) -> StatusCode {
    info!("Received login confirmation");
    gate.signal();
    StatusCode::ACCEPTED
}

#[async_trait]
impl LoginGate for SignalLogin {
    async fn confirm(&self, _page: &mut dyn TimesheetPage) -> Result<LoginOutcome, LoginError> {
        logging::section("MANUAL LOGIN REQUIRED");
        info!("Log in to TMS, then POST to /login-confirmed");
        self.notify.notified().await;
        info!("Login confirmed by signal, continuing");
        Ok(LoginOutcome::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::WeekId;
    use crate::page::fake::FakePage;
    use crate::page::selectors;

    fn poll(ceiling: Duration) -> PollLogin {
        PollLogin {
            table: selectors::table(),
            interval: Duration::from_millis(1),
            ceiling,
        }
    }

    #[tokio::test]
    async fn poll_confirms_once_table_appears() {
        let mut page = FakePage::new(WeekId::new(2025, 48)).with_table_after_checks(3);
        let outcome = poll(Duration::from_secs(5)).confirm(&mut page).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Confirmed);
    }

    #[tokio::test]
    async fn poll_proceeds_after_ceiling() {
        let mut page = FakePage::new(WeekId::new(2025, 48)).with_hidden_table();
        let outcome = poll(Duration::from_millis(20)).confirm(&mut page).await.unwrap();
        assert_eq!(outcome, LoginOutcome::AssumedAfterTimeout);
    }

    #[tokio::test]
    async fn signal_before_confirm_is_not_lost() {
        let gate = SignalLogin::new();
        gate.signal();
        let mut page = FakePage::new(WeekId::new(2025, 48));
        let outcome = gate.confirm(&mut page).await.unwrap();
        assert_eq!(outcome, LoginOutcome::Confirmed);
    }

    #[tokio::test]
    async fn http_signal_releases_confirm() {
        let gate = SignalLogin::new();
        let (addr, server) = gate.listen("127.0.0.1:0".parse().unwrap()).await.unwrap();

        let client = reqwest::Client::new();
        let health = client
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .unwrap();
        assert!(health.status().is_success());

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move {
                let mut page = FakePage::new(WeekId::new(2025, 48));
                gate.confirm(&mut page).await
            })
        };

        let response = client
            .post(format!("http://{addr}/login-confirmed"))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::ACCEPTED);

        let outcome = tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome, LoginOutcome::Confirmed);
        server.abort();
    }
}
