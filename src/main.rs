mod cli;
mod core;

use clap::{Parser, Subcommand};

use crate::core::config::AppConfig;

#[derive(Parser)]
#[command(name = "spend", about = "OpenAI billing usage dashboard", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output format
    #[arg(short, long, global = true)]
    format: Option<String>,

    /// Shorthand for --format json
    #[arg(short = 'j', long = "json", global = true)]
    json: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    /// Verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and display the cost dashboard (default)
    Dashboard {
        /// Keep the dashboard open; press r to refresh, q to quit
        #[arg(short, long)]
        watch: bool,
    },
    /// Fetch a single report for an explicit date range
    Range {
        /// Range start (YYYY-MM-DD)
        #[arg(long)]
        start: String,

        /// Range end (YYYY-MM-DD)
        #[arg(long)]
        end: String,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Generate default config file
    Init,
    /// Validate config file
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load().unwrap_or_default();

    let format = if cli.json {
        cli::output::OutputFormat::Json
    } else {
        match cli.format.as_deref() {
            Some("json") => cli::output::OutputFormat::Json,
            Some(_) => cli::output::OutputFormat::Text,
            None => match config.settings.default_format.as_str() {
                "json" => cli::output::OutputFormat::Json,
                _ => cli::output::OutputFormat::Text,
            },
        }
    };
    let output_opts = cli::output::OutputOptions {
        format,
        pretty: cli.pretty,
        use_color: cli::output::resolve_color(&config.settings.color, cli.no_color),
        verbose: cli.verbose,
    };

    match cli.command {
        None | Some(Commands::Dashboard { .. }) => {
            let watch = match cli.command {
                Some(Commands::Dashboard { watch }) => watch,
                _ => false,
            };
            cli::dashboard_cmd::run(config, watch, &output_opts).await?;
        }
        Some(Commands::Range { start, end }) => {
            cli::dashboard_cmd::run_range(config, &start, &end, &output_opts).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init => cli::config_cmd::init(&output_opts)?,
            ConfigAction::Check => cli::config_cmd::check(&output_opts)?,
        },
    }

    Ok(())
}
