use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use prv_runner::{doctor, Config, ReviewRequest, Reviewer, CONFIG_FILE, FEEDBACK_FILE};

#[derive(Parser)]
#[command(name = "prv", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Review a problem package and write feedback next to it
    Review {
        /// Directory holding the description, Dockerfile and patches
        problem_dir: PathBuf,
        /// Repository URL; overrides the one found in the setup notes
        #[arg(long)]
        repo_url: Option<String>,
        /// Base commit; overrides the one found in the setup notes
        #[arg(long)]
        commit: Option<String>,
        /// Only run structural and content checks
        #[arg(long, default_value_t = false)]
        skip_verification: bool,
        /// Feedback file, relative to the problem directory
        #[arg(long, default_value = FEEDBACK_FILE)]
        output: PathBuf,
        /// Config file (defaults to prv.toml in the problem directory)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Also keep logs, report and manifest under this directory
        #[arg(long)]
        evidence_dir: Option<PathBuf>,
        /// Print the report summary as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Check that git and the container program are available
    Doctor {
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Write a default config file
    Init {
        #[arg(long, default_value = CONFIG_FILE)]
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Review { problem_dir, repo_url, commit, skip_verification, output, config, evidence_dir, json } => {
            let cfg = Config::resolve(config.as_deref(), &problem_dir)?;
            let reviewer = Reviewer::from_config(cfg);
            let review = reviewer.review(&ReviewRequest { problem_dir: problem_dir.clone(), repo_url, commit, skip_verification })?;

            let out = problem_dir.join(&output);
            review.write_feedback(&out)?;
            if let Some(dir) = evidence_dir {
                let run_dir = review.write_evidence(&dir)?;
                info!(run_dir = %run_dir.display(), "evidence written");
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&review.report.summary())?);
            }
            println!("VERDICT: {}", review.verdict());
            println!("Problem: {}", review.title);
            if let Some(words) = review.word_count() {
                println!("Description: {} words, {} issue(s)", words, review.content_issues().len());
            }
            for result in review.report.phases() {
                println!(
                    "  {:<22} {:<10} {:?}",
                    result.phase.as_str(),
                    result.status.label(),
                    review.report.expectation(result.phase)
                );
            }
            println!("Feedback written to {}", out.display());
        }
        Command::Doctor { config } => {
            let cwd = std::env::current_dir()?;
            let cfg = Config::resolve(config.as_deref(), &cwd)?;
            for version in doctor(&cfg)? {
                println!("{version}");
            }
            println!("OK");
        }
        Command::Init { path } => {
            Config::default().save_to(&path)?;
            println!("Wrote {}", path.display());
        }
    }

    Ok(())
}
