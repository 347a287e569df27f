mod applied;
mod fetch;
mod output;
mod parser;
mod pipeline;
mod urls;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use pipeline::PullOptions;

#[derive(Parser)]
#[command(name = "grad_scraper", about = "New-grad SWE listing scraper and application tracker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the listings README, extract fresh US roles, write the links CSV
    Pull {
        /// Keep only roles posted within this many days
        #[arg(long, default_value = "7")]
        max_age_days: u32,
        /// Master tracking file consulted for already-applied URLs
        #[arg(long, default_value = "new_grad_swe_apply_links_applying.csv")]
        applied_file: PathBuf,
        /// Output CSV path
        #[arg(short, long, default_value = "new_grad_swe_apply_links.csv")]
        output: PathBuf,
        /// Directory of historical tracking snapshots
        #[arg(long, default_value = "past_applied_data")]
        archive_dir: PathBuf,
        /// Skip archiving the previous output before overwriting it
        #[arg(long)]
        no_archive: bool,
        /// Source document URL
        #[arg(long, default_value = fetch::DEFAULT_SOURCE_URL)]
        source_url: String,
    },
    /// Remove rows already applied to (per the archive snapshots) from the links CSV
    Reconcile {
        /// Links CSV to rewrite in place
        #[arg(long, default_value = "new_grad_swe_apply_links.csv")]
        links_file: PathBuf,
        /// Directory of historical tracking snapshots
        #[arg(long, default_value = "past_applied_data")]
        archive_dir: PathBuf,
        /// Print the removed rows
        #[arg(long)]
        debug: bool,
    },
    /// Add a Status tracking column to the links CSV if it is missing
    Prepare {
        /// Links CSV to prepare
        #[arg(long, default_value = "new_grad_swe_apply_links.csv")]
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Pull {
            max_age_days,
            applied_file,
            output,
            archive_dir,
            no_archive,
            source_url,
        } => {
            let opts = PullOptions {
                source_url,
                max_age_days,
                applied_file,
                output: output.clone(),
                archive_dir,
                archive: !no_archive,
            };
            let counts = pipeline::run_pull(&opts)?;
            counts.print(max_age_days, &output);
            Ok(())
        }
        Commands::Reconcile {
            links_file,
            archive_dir,
            debug,
        } => {
            let applied = applied::load_applied_urls(&archive_dir, None);
            let counts = output::filter_links_file(&links_file, &applied, debug)?;
            println!(
                "Filtered {} applied jobs; {} fresh jobs remain in {}",
                counts.removed,
                counts.remaining,
                links_file.display()
            );
            println!(
                "Used {} unique applied URLs from {} archive files",
                applied.urls.len(),
                applied.files_used
            );
            Ok(())
        }
        Commands::Prepare { file } => {
            if output::prepare_tracker(&file)? {
                println!("Added a '{}' column to {}", output::TRACKER_COLUMN, file.display());
            } else {
                println!("{} already has a '{}' column; no changes made", file.display(), output::TRACKER_COLUMN);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {:.1}s", elapsed.as_secs_f64());
    }

    result
}
