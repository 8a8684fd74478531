//! Reachability pre-flight for the TMS host.
//!
//! A cheap HEAD request catches a disconnected VPN or proxy before a browser
//! is launched.

use reqwest::{Client, StatusCode};
use std::error::Error as StdError;
use std::time::Duration;
use tracing::{error, info};

use crate::error::ConnectivityError;

const USER_AGENT: &str = concat!("tms-timesheet-bot/", env!("CARGO_PKG_VERSION"));

const VPN_INDICATORS: [&str; 13] = [
    "dns",
    "name resolution failed",
    "getaddrinfo failed",
    "gaierror",
    "connection refused",
    "connection timed out",
    "timeout",
    "timed out",
    "network unreachable",
    "no route to host",
    "tunnel",
    "proxy",
    "vpn",
];

/// HEAD `url`. Any 2xx or 3xx answer counts as reachable, since the TMS
/// redirects anonymous visitors to its login page.
pub async fn check_connectivity(url: &str, timeout: Duration) -> Result<(), ConnectivityError> {
    info!("Checking connectivity to {}", url);

    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| ConnectivityError::Other(e.to_string()))?;

    let response = match client.head(url).send().await {
        Ok(resp) => resp,
        Err(e) => {
            let failure = classify(&e, timeout);
            error!("Connectivity check failed: {}", failure);
            return Err(failure);
        }
    };

    let status = response.status();
    if status.is_success() || status.is_redirection() {
        info!("TMS reachable ({})", status);
        Ok(())
    } else {
        error!("TMS answered with {}", status);
        Err(status_error(status))
    }
}

fn status_error(status: StatusCode) -> ConnectivityError {
    ConnectivityError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    }
}

fn classify(err: &reqwest::Error, timeout: Duration) -> ConnectivityError {
    let chain = error_chain(err);
    if err.is_builder() {
        ConnectivityError::InvalidUrl(chain)
    } else if err.is_timeout() {
        ConnectivityError::Timeout(timeout.as_secs())
    } else if err.is_connect() {
        let lower = chain.to_lowercase();
        if lower.contains("dns") || lower.contains("resolve") || lower.contains("lookup") {
            ConnectivityError::Dns(chain)
        } else {
            ConnectivityError::Connect(chain)
        }
    } else if let Some(status) = err.status() {
        status_error(status)
    } else {
        ConnectivityError::Other(chain)
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}

/// Whether a connectivity failure looks like a missing VPN or proxy.
pub fn is_vpn_proxy_error(message: &str) -> bool {
    let lower = message.to_lowercase();
    VPN_INDICATORS.iter().any(|indicator| lower.contains(indicator))
}

/// Operator-facing explanation of a failed connectivity check.
pub fn format_connectivity_error(url: &str, message: &str, vpn_issue: bool) -> String {
    let mut lines = vec![
        "NETWORK CONNECTIVITY CHECK FAILED".to_string(),
        String::new(),
        format!("Could not reach TMS server: {url}"),
        format!("Error: {message}"),
        String::new(),
    ];

    if vpn_issue {
        lines.extend([
            "This error is often caused by:".to_string(),
            "  - VPN/Proxy not connected (e.g., Zscaler, Cisco AnyConnect)".to_string(),
            "  - VPN/Proxy not authenticated".to_string(),
            "  - Network connectivity issues".to_string(),
            "  - Firewall blocking the connection".to_string(),
            String::new(),
            "Please ensure:".to_string(),
            "  1. Your VPN/Proxy (e.g., Zscaler) is turned ON and authenticated".to_string(),
            "  2. You can access the TMS website in your browser".to_string(),
            format!("  3. The URL is correct: {url}"),
        ]);
    } else {
        lines.extend([
            "Please check:".to_string(),
            "  1. Your internet connection is working".to_string(),
            "  2. The TMS server is accessible".to_string(),
            format!("  3. The URL is correct: {url}"),
        ]);
    }

    lines.join("\n")
}
