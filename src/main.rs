use clap::{Args, CommandFactory, Parser, Subcommand};
use std::process::ExitCode;
use travel_audit_tools::commands;
use travel_audit_tools::config::{DetectionConfig, PairingStrategy, DEFAULT_MAX_PAGES, MAX_PAGE_LIMIT};

#[derive(Parser)]
#[command(name = "travel-audit")]
#[command(about = "Detect physically impossible logins in Duo authentication logs", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every detection command
#[derive(Args)]
struct DetectionArgs {
    /// How many days back from now to pull authentication logs for (at most 180)
    #[arg(long, default_value = "1")]
    days_to_go_back: u32,

    /// Flag two different locations seen within this many hours
    #[arg(long, default_value = "2")]
    hours_to_compare: f64,

    /// Additional accounts to ignore (service/system accounts), repeatable
    #[arg(long = "exclude-user")]
    exclude_users: Vec<String>,

    /// Compare every adjacent login pair instead of disjoint pairs.
    /// Catches location changes that straddle a pair boundary.
    #[arg(long)]
    sliding_pairs: bool,

    /// Review CSV with every event of every multi-location user
    #[arg(short, long, default_value = "impossible_travel.csv")]
    output: String,

    /// Optional JSON file with per-pair flag details
    #[arg(long)]
    flagged_output: Option<String>,
}

impl DetectionArgs {
    fn config(&self, page_limit: u32, max_pages: usize) -> DetectionConfig {
        DetectionConfig {
            days_to_go_back: self.days_to_go_back,
            hours_to_compare: self.hours_to_compare,
            page_limit,
            max_pages,
            pairing: if self.sliding_pairs {
                PairingStrategy::Sliding
            } else {
                PairingStrategy::Disjoint
            },
            ..DetectionConfig::default()
        }
        .with_excluded(self.exclude_users.iter().cloned())
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Pull authentication logs from the Duo Admin API and flag impossible travel
    Detect {
        #[command(flatten)]
        detection: DetectionArgs,

        /// Duo Admin API integration key (default: $DUO_IKEY)
        #[arg(long)]
        ikey: Option<String>,

        /// Duo Admin API secret key (default: $DUO_SKEY or $DUO_SKEY_FILE)
        #[arg(long)]
        skey: Option<String>,

        /// Duo Admin API host (default: $DUO_HOST)
        #[arg(long)]
        host: Option<String>,

        /// Records requested per page
        #[arg(long, default_value_t = MAX_PAGE_LIMIT, hide = true)]
        page_limit: u32,

        /// Stop paginating after this many pages
        #[arg(long, default_value_t = DEFAULT_MAX_PAGES, hide = true)]
        max_pages: usize,

        /// Hide the page-fetch spinner
        #[arg(long)]
        no_progress: bool,
    },

    /// Run detection over saved authentication log exports
    Analyze {
        /// Authentication log files (JSON, NDJSON, .gz or .zst)
        #[arg(required = true)]
        log_files: Vec<String>,

        #[command(flatten)]
        detection: DetectionArgs,
    },

    /// Generate shell completion scripts
    GenerateCompletion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Detect {
            detection,
            ikey,
            skey,
            host,
            page_limit,
            max_pages,
            no_progress,
        } => {
            let config = detection.config(page_limit, max_pages);
            let credentials = commands::detect::Credentials {
                ikey: ikey.as_deref(),
                skey: skey.as_deref(),
                host: host.as_deref(),
            };
            commands::detect::run(
                credentials,
                &config,
                &detection.output,
                detection.flagged_output.as_deref(),
                !no_progress,
            )
            .await
            .map(|_| ())
        }
        Commands::Analyze {
            log_files,
            detection,
        } => {
            let config = detection.config(MAX_PAGE_LIMIT, DEFAULT_MAX_PAGES);
            commands::analyze::run(
                &log_files,
                &config,
                &detection.output,
                detection.flagged_output.as_deref(),
            )
            .map(|_| ())
        }
        Commands::GenerateCompletion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "travel-audit", &mut std::io::stdout());
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("Error is: {:#}.", err);
            ExitCode::FAILURE
        }
    }
}
