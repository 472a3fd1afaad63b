use std::io::{self, IsTerminal};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    terminal,
};
use serde::Serialize;

use crate::cli::output::{OutputFormat, OutputOptions};
use crate::cli::renderer;
use crate::core::billing::UsageClient;
use crate::core::config::AppConfig;
use crate::core::models::usage::{UsageQuery, UsageReport};
use crate::core::ranges;

#[derive(Serialize)]
struct DashboardPayload {
    all_time: UsageReport,
    this_month: UsageReport,
}

fn build_client(config: &AppConfig) -> Result<UsageClient> {
    let api_key = config
        .resolve_api_key()
        .context("No API key found: set [billing].api_key in the config or OPENAI_API_KEY")?;
    let client = UsageClient::new(
        api_key,
        config.billing.base_url.clone(),
        Duration::from_secs(config.billing.cache_ttl_secs),
    )?;
    Ok(client)
}

/// Fetch both ranges concurrently. Fail-fast: the first error aborts the
/// whole pass, so nothing partial ever reaches the renderer.
async fn fetch_pair(
    client: &UsageClient,
    all_time: &UsageQuery,
    this_month: &UsageQuery,
    opts: &OutputOptions,
) -> Result<(UsageReport, UsageReport)> {
    if opts.verbose {
        eprintln!(
            "Fetching usage {} → {} and {} → {}",
            all_time.start_param(),
            all_time.end_param(),
            this_month.start_param(),
            this_month.end_param()
        );
    }
    let (all_time, this_month) =
        tokio::try_join!(client.fetch(all_time), client.fetch(this_month))?;
    Ok((all_time, this_month))
}

fn render_dashboard(
    all_time: &UsageReport,
    this_month: &UsageReport,
    opts: &OutputOptions,
) -> Result<()> {
    match opts.format {
        OutputFormat::Text => {
            let sections = [
                renderer::render_metrics(all_time.total_cost, this_month.total_cost, opts.use_color),
                renderer::render_report("Cost per model (this month)", this_month, opts.use_color),
                renderer::render_report("Cost per model (all time)", all_time, opts.use_color),
                renderer::render_records_table(
                    "Records (all time, cost > 0)",
                    all_time,
                    opts.use_color,
                ),
            ];
            println!("{}", sections.join("\n\n"));
        }
        OutputFormat::Json => {
            let payload = DashboardPayload {
                all_time: all_time.clone(),
                this_month: this_month.clone(),
            };
            let json = if opts.pretty {
                serde_json::to_string_pretty(&payload)?
            } else {
                serde_json::to_string(&payload)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}

pub async fn run(config: AppConfig, watch: bool, opts: &OutputOptions) -> Result<()> {
    let client = build_client(&config)?;

    let today = chrono::Local::now().date_naive();
    let history_start = config
        .billing
        .history_start
        .as_deref()
        .and_then(ranges::parse_history_start)
        .unwrap_or_else(|| ranges::default_history_start(today));

    let all_time_query = ranges::all_time(today, history_start)?;
    let this_month_query = ranges::this_month(today);

    loop {
        let (all_time, this_month) =
            fetch_pair(&client, &all_time_query, &this_month_query, opts).await?;
        render_dashboard(&all_time, &this_month, opts)?;

        if !watch {
            break;
        }
        match tokio::task::spawn_blocking(wait_for_refresh).await?? {
            WatchAction::Refresh => continue,
            WatchAction::Quit => break,
        }
    }
    Ok(())
}

/// Fetch and display a single report for an explicit date range.
pub async fn run_range(config: AppConfig, start: &str, end: &str, opts: &OutputOptions) -> Result<()> {
    let start_date = parse_date(start)?;
    let end_date = parse_date(end)?;
    let query = UsageQuery::new(start_date, end_date)?;

    let client = build_client(&config)?;
    if opts.verbose {
        eprintln!("Fetching usage {} → {}", query.start_param(), query.end_param());
    }
    let report = client.fetch(&query).await?;

    match opts.format {
        OutputFormat::Text => {
            let title = format!("Cost per model ({} → {})", query.start_param(), query.end_param());
            let sections = [
                renderer::render_report(&title, &report, opts.use_color),
                renderer::render_records_table("Records (cost > 0)", &report, opts.use_color),
            ];
            println!("{}", sections.join("\n\n"));
        }
        OutputFormat::Json => {
            let json = if opts.pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}' (expected YYYY-MM-DD)", value))
}

enum WatchAction {
    Refresh,
    Quit,
}

/// RAII guard that restores terminal state on drop (even on panic).
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Block until the user asks for a refresh or quits. Falls back to quitting
/// when stdin is not a terminal, so `--watch` in a pipe degrades to one pass.
fn wait_for_refresh() -> Result<WatchAction> {
    if !io::stdin().is_terminal() {
        return Ok(WatchAction::Quit);
    }

    eprintln!();
    eprintln!(" r refresh · q quit");
    let _guard = RawModeGuard::enable()?;

    loop {
        if let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event::read()?
        {
            match (code, modifiers) {
                (KeyCode::Char('c'), KeyModifiers::CONTROL) => return Ok(WatchAction::Quit),
                (KeyCode::Esc, _) | (KeyCode::Char('q'), KeyModifiers::NONE) => {
                    return Ok(WatchAction::Quit)
                }
                (KeyCode::Char('r'), KeyModifiers::NONE) => return Ok(WatchAction::Refresh),
                _ => {}
            }
        }
    }
}
