//! Command-line interface for the `tms-bot` binary.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::helpers::csv_loader::load_csv;
use crate::helpers::login::{LoginGate, PollLogin, PromptLogin, SignalLogin};
use crate::helpers::network::{check_connectivity, format_connectivity_error, is_vpn_proxy_error};
use crate::helpers::template::write_template;
use crate::models::WeekSpec;
use crate::page::chromium::ChromiumPage;
use crate::service::{FailureStrategy, FillService};

#[derive(Parser, Debug)]
#[command(name = "tms-bot")]
#[command(version, about = "Fill TMS timesheets from a CSV file")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// TMS URL
    #[arg(long, global = true, env = "TMS_URL")]
    pub url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fill one or more weeks from a CSV file
    Fill(FillArgs),

    /// Write a CSV template listing the projects shown in TMS
    Template(TemplateArgs),

    /// Only check that the TMS host is reachable
    Check(CheckArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LoginMode {
    /// Press ENTER once logged in
    #[default]
    Prompt,
    /// Wait for the timesheet table to appear
    Poll,
    /// Wait for POST /login-confirmed on --login-port
    Signal,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// How to detect that the manual login is done
    #[arg(long = "login", value_enum, default_value_t = LoginMode::Prompt)]
    pub mode: LoginMode,

    /// Port for the login signal endpoint
    #[arg(long, default_value_t = 3000)]
    pub login_port: u16,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,
}

#[derive(Args, Debug)]
pub struct FillArgs {
    /// CSV file with timesheet rows
    #[arg(long)]
    pub csv: PathBuf,

    /// Weeks to fill, e.g. "48", "48-50" or "45-47,50"
    #[arg(long)]
    pub weeks: Option<WeekSpec>,

    /// Year of the target weeks (default: the displayed year)
    #[arg(long)]
    pub year: Option<i32>,

    /// Save each week after filling it
    #[arg(long, conflicts_with = "dry_run")]
    pub auto_submit: bool,

    /// Click Promark after each save to submit the week
    #[arg(long, requires = "auto_submit")]
    pub promark: bool,

    /// Leave cells that already have a value
    #[arg(long)]
    pub no_overwrite: bool,

    /// Validate the input and print the plan without opening a browser
    #[arg(long)]
    pub dry_run: bool,

    /// Furthest the week selector may move forward
    #[arg(long)]
    pub max_forward: Option<u32>,

    /// Furthest the week selector may move backward
    #[arg(long)]
    pub max_backward: Option<u32>,

    /// Record a failed week and continue instead of stopping
    #[arg(long)]
    pub skip_week_on_error: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Save a screenshot here when the run fails
    #[arg(long)]
    pub screenshot_on_error: Option<PathBuf>,

    /// Skip the reachability check before launching the browser
    #[arg(long)]
    pub skip_connectivity_check: bool,

    #[command(flatten)]
    pub login: LoginArgs,
}

#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Where to write the CSV template
    #[arg(long, short = 'o')]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub login: LoginArgs,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Timeout in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout: u64,
}

pub async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load(cli.global.config.as_deref())?;
    if let Some(url) = cli.global.url {
        config.tms_url = url;
    }

    match cli.command {
        Commands::Fill(args) => fill(config, args).await,
        Commands::Template(args) => template(config, args).await,
        Commands::Check(args) => check(&config.tms_url, Duration::from_secs(args.timeout)).await,
    }
}

fn apply_fill_args(config: &mut Config, args: &FillArgs) {
    config.auto_submit |= args.auto_submit;
    config.submit_after_save |= args.promark;
    config.no_overwrite |= args.no_overwrite;
    config.dry_run |= args.dry_run;
    config.browser.headless |= args.login.headless;
    if args.year.is_some() {
        config.year = args.year;
    }
    if let Some(max) = args.max_forward {
        config.bounds.max_forward = max;
    }
    if let Some(max) = args.max_backward {
        config.bounds.max_backward = max;
    }
    if args.skip_week_on_error {
        config.failure_strategy = FailureStrategy::SkipWeek;
    }
    if args.screenshot_on_error.is_some() {
        config.screenshot_on_error = args.screenshot_on_error.clone();
    }
}

async fn fill(mut config: Config, args: FillArgs) -> Result<ExitCode> {
    apply_fill_args(&mut config, &args);
    config.validate()?;

    let rows = load_csv(&args.csv)
        .with_context(|| format!("Failed to load {}", args.csv.display()))?;
    let service = FillService::new(config);

    if service.config.dry_run {
        service.describe_plan(&rows, args.weeks.as_ref());
        return Ok(ExitCode::SUCCESS);
    }

    if !args.skip_connectivity_check
        && !reachable(&service.config.tms_url, service.config.timeouts.element()).await
    {
        return Ok(ExitCode::FAILURE);
    }

    let (gate, server) = login_gate(&service.config, &args.login).await?;
    let mut page = launch(&service.config).await?;

    let result = service
        .run_session(&mut page, gate.as_ref(), &rows, args.weeks.as_ref())
        .await;
    if let Some(server) = server {
        server.abort();
    }

    let summary = result.context("Fill run failed")?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{summary}");
    }

    if summary.has_failures() {
        error!("Some projects or cells could not be filled");
        Ok(ExitCode::FAILURE)
    } else {
        info!("All cells filled");
        Ok(ExitCode::SUCCESS)
    }
}

async fn template(mut config: Config, args: TemplateArgs) -> Result<ExitCode> {
    config.browser.headless |= args.login.headless;
    config.validate()?;

    let service = FillService::new(config);
    let (gate, server) = login_gate(&service.config, &args.login).await?;
    let mut page = launch(&service.config).await?;

    let projects = service.collect_projects(&mut page, gate.as_ref()).await;
    if let Some(server) = server {
        server.abort();
    }

    let projects = projects.context("Failed to read projects from TMS")?;
    let path = write_template(&args.output, &projects, args.force)?;
    println!("Wrote {} project(s) to {}", projects.len(), path.display());
    Ok(ExitCode::SUCCESS)
}

async fn check(url: &str, timeout: Duration) -> Result<ExitCode> {
    if reachable(url, timeout).await {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

async fn reachable(url: &str, timeout: Duration) -> bool {
    match check_connectivity(url, timeout).await {
        Ok(()) => {
            info!("TMS is reachable: {}", url);
            true
        }
        Err(e) => {
            let message = e.to_string();
            eprintln!(
                "{}",
                format_connectivity_error(url, &message, is_vpn_proxy_error(&message))
            );
            false
        }
    }
}

async fn launch(config: &Config) -> Result<ChromiumPage> {
    ChromiumPage::launch(&config.browser, config.timeouts.page_load())
        .await
        .context("Failed to launch browser")
}

async fn login_gate(
    config: &Config,
    args: &LoginArgs,
) -> Result<(Box<dyn LoginGate>, Option<JoinHandle<()>>)> {
    match args.mode {
        LoginMode::Prompt => Ok((Box::new(PromptLogin), None)),
        LoginMode::Poll => Ok((
            Box::new(PollLogin {
                table: config.controls.table.clone(),
                interval: config.timeouts.login_poll(),
                ceiling: config.timeouts.login_ceiling(),
            }),
            None,
        )),
        LoginMode::Signal => {
            let gate = SignalLogin::new();
            let addr = SocketAddr::from(([127, 0, 0, 1], args.login_port));
            let (_, server) = gate
                .listen(addr)
                .await
                .with_context(|| format!("Failed to bind login endpoint on {addr}"))?;
            Ok((Box::new(gate), Some(server)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_fill_flags() {
        let cli = Cli::try_parse_from([
            "tms-bot",
            "fill",
            "--csv",
            "hours.csv",
            "--weeks",
            "50,48-49",
            "--no-overwrite",
            "--login",
            "poll",
            "--max-forward",
            "4",
        ])
        .unwrap();

        let Commands::Fill(args) = cli.command else {
            panic!("expected fill");
        };
        assert_eq!(args.weeks.unwrap().weeks(), &[48, 49, 50]);
        assert!(args.no_overwrite);
        assert_eq!(args.login.mode, LoginMode::Poll);
        assert_eq!(args.max_forward, Some(4));
    }

    #[test]
    fn rejects_bad_week_spec_and_dry_run_with_auto_submit() {
        assert!(
            Cli::try_parse_from(["tms-bot", "fill", "--csv", "a.csv", "--weeks", "50-48"]).is_err()
        );
        assert!(
            Cli::try_parse_from(["tms-bot", "fill", "--csv", "a.csv", "--dry-run", "--auto-submit"])
                .is_err()
        );
    }

    #[test]
    fn promark_requires_auto_submit() {
        assert!(Cli::try_parse_from(["tms-bot", "fill", "--csv", "a.csv", "--promark"]).is_err());

        let cli = Cli::try_parse_from([
            "tms-bot",
            "fill",
            "--csv",
            "a.csv",
            "--auto-submit",
            "--promark",
        ])
        .unwrap();
        let Commands::Fill(args) = cli.command else {
            panic!("expected fill");
        };
        let mut config = Config::default();
        apply_fill_args(&mut config, &args);
        assert!(config.auto_submit && config.submit_after_save);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "tms-bot",
            "fill",
            "--csv",
            "a.csv",
            "--year",
            "2026",
            "--skip-week-on-error",
            "--headless",
        ])
        .unwrap();
        let Commands::Fill(args) = cli.command else {
            panic!("expected fill");
        };

        let mut config = Config::default();
        apply_fill_args(&mut config, &args);
        assert_eq!(config.year, Some(2026));
        assert_eq!(config.failure_strategy, FailureStrategy::SkipWeek);
        assert!(config.browser.headless);
        assert_eq!(config.bounds.max_backward, 20);
    }
}
