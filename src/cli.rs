use clap::{Parser, Subcommand, ValueEnum};
use std::collections::BTreeMap;
use std::path::PathBuf;
use anyhow::Result;
use tracing::warn;

use crate::core::{Engine, Review};

#[derive(Parser)]
#[command(name = "reviewcraft")]
#[command(about = "The Code Reviewer That Learns Your Project's Conventions")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Plain text listing
    Console,
    /// Stable review JSON document
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Console => write!(f, "console"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Learn conventions from a repository (local path or URL)
    Learn {
        /// Path or URL of the repository to learn from
        repo: String,

        /// Relearn even if a knowledge base already exists
        #[arg(long)]
        force: bool,
    },

    /// Review one or more files against the learned conventions
    Review {
        /// Files to review
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
        output: OutputFormat,

        /// Write output to a file instead of stdout
        #[arg(long)]
        output_file: Option<PathBuf>,
    },

    /// Review every matching file in a directory
    ReviewDir {
        /// Directory to review
        dir: PathBuf,

        /// Comma-separated extensions to review (defaults to configured set)
        #[arg(long)]
        extensions: Option<String>,

        /// Recurse into subdirectories
        #[arg(long)]
        recursive: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
        output: OutputFormat,

        /// Write output to a file instead of stdout
        #[arg(long)]
        output_file: Option<PathBuf>,
    },

    /// Review the change between two versions of a file
    Diff {
        /// Original version of the file
        original: PathBuf,

        /// Updated version of the file
        updated: PathBuf,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
        output: OutputFormat,

        /// Write output to a file instead of stdout
        #[arg(long)]
        output_file: Option<PathBuf>,
    },
}

impl Cli {
    pub async fn execute(self, mut engine: Engine) -> Result<()> {
        match self.command {
            Commands::Learn { repo, force } => {
                let report = engine.learn(&repo, force).await?;
                println!(
                    "Learned {} files ({} chunks indexed, similarity index: {}) into {}",
                    report.files_indexed,
                    report.chunks_indexed,
                    if report.index_built { "built" } else { "skipped" },
                    report.storage_root.display()
                );
                Ok(())
            }
            Commands::Review { files, output, output_file } => {
                let mut reviews = BTreeMap::new();
                for path in files {
                    let review = match engine.review_file(&path).await {
                        Ok(review) => review,
                        Err(e) => {
                            warn!("Skipping {}: {}", path.display(), e);
                            continue;
                        }
                    };
                    reviews.insert(path.display().to_string(), review);
                }
                emit_reviews(&reviews, output, output_file.as_deref())
            }
            Commands::ReviewDir { dir, extensions, recursive, output, output_file } => {
                let extensions = extensions
                    .map(|s| s.split(',').map(|e| e.trim().to_string()).collect::<Vec<_>>());
                let reviews = engine.review_dir(&dir, extensions, recursive).await?;
                emit_reviews(&reviews, output, output_file.as_deref())
            }
            Commands::Diff { original, updated, output, output_file } => {
                let old_code = std::fs::read_to_string(&original)?;
                let new_code = std::fs::read_to_string(&updated)?;
                let review = engine
                    .review_diff(&old_code, &new_code, &updated.display().to_string())
                    .await?;
                let mut reviews = BTreeMap::new();
                reviews.insert(updated.display().to_string(), review);
                emit_reviews(&reviews, output, output_file.as_deref())
            }
        }
    }
}

fn emit_reviews(
    reviews: &BTreeMap<String, Review>,
    output: OutputFormat,
    output_file: Option<&std::path::Path>,
) -> Result<()> {
    let rendered = match output {
        OutputFormat::Json => serde_json::to_string_pretty(reviews)?,
        OutputFormat::Console => render_console(reviews),
    };

    match output_file {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("Reviews written to {}", path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}

fn render_console(reviews: &BTreeMap<String, Review>) -> String {
    let mut out = String::new();
    for (path, review) in reviews {
        out.push_str(&format!("=== {} ===\n", path));
        if review.recommendations.is_empty() {
            out.push_str("No recommendations.\n\n");
            continue;
        }
        for (i, rec) in review.recommendations.iter().enumerate() {
            out.push_str(&format!("{}. [{}] {} ({})\n", i + 1, rec.severity, rec.kind, rec.subtype));
            out.push_str(&format!("   Message   : {}\n", rec.message));
            out.push_str(&format!("   Suggestion: {}\n", rec.suggestion));
            if let Some(explanation) = &rec.explanation {
                out.push_str(&format!("   Why       : {}\n", explanation));
            }
            out.push('\n');
        }
    }
    out
}
