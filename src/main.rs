use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use school_grades::config::{Config, LogFormat};
use school_grades::models::Trimester;
use school_grades::{db, grades, performance, report};
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "school-grades")]
#[command(about = "Grade aggregation and report cards for school administration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load sample subjects, students and evaluations
    Seed,
    /// Import evaluations from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show a student's subject and overall averages
    Performance {
        #[arg(long)]
        student: Uuid,
        #[arg(long, value_enum)]
        trimester: Trimester,
        #[arg(long, default_value = "2024-2025")]
        year: String,
        /// Print the full aggregate as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Rank a class by overall average
    Ranking {
        #[arg(long)]
        class: String,
        #[arg(long, value_enum)]
        trimester: Trimester,
        #[arg(long, default_value = "2024-2025")]
        year: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Compare class statistics side by side
    Compare {
        #[arg(long = "class", required = true)]
        classes: Vec<String>,
        #[arg(long, value_enum)]
        trimester: Trimester,
        #[arg(long, default_value = "2024-2025")]
        year: String,
    },
    /// Write a student's markdown report card
    Report {
        #[arg(long)]
        student: Uuid,
        #[arg(long, value_enum)]
        trimester: Trimester,
        #[arg(long, default_value = "2024-2025")]
        year: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Write a markdown class report with statistics and alerts
    ClassReport {
        #[arg(long)]
        class: String,
        #[arg(long, value_enum)]
        trimester: Trimester,
        #[arg(long, default_value = "2024-2025")]
        year: String,
        #[arg(long, default_value = "class-report.md")]
        out: PathBuf,
    },
    /// Compare a student's overall average between two trimesters
    Progression {
        #[arg(long)]
        student: Uuid,
        #[arg(long, value_enum)]
        from: Trimester,
        #[arg(long, value_enum)]
        to: Trimester,
        #[arg(long, default_value = "2024-2025")]
        year: String,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            info!(inserted, path = %csv.display(), "import finished");
            println!("Inserted {inserted} evaluations from {}.", csv.display());
        }
        Commands::Performance {
            student,
            trimester,
            year,
            json,
        } => {
            let Some(result) =
                performance::student_performance(&pool, student, trimester, &year).await?
            else {
                println!("No grades recorded for this period.");
                return Ok(());
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
                return Ok(());
            }

            for subject in &result.subjects {
                println!(
                    "- {} (coef {}) {:.2}/20 across {} evaluations",
                    subject.subject_name,
                    subject.subject_coefficient,
                    subject.average,
                    subject.evaluation_count
                );
            }
            println!(
                "Overall average {:.2}/20 ({})",
                result.overall_average,
                grades::classify(result.overall_average)?
            );
        }
        Commands::Ranking {
            class,
            trimester,
            year,
            limit,
        } => {
            let overview = performance::class_overview(&pool, &class, trimester, &year).await?;

            if overview.rankings.is_empty() {
                println!("No graded students for this period.");
                return Ok(());
            }

            println!("Top students in {class}:");
            for entry in overview.rankings.iter().take(limit) {
                println!(
                    "{}. {} {:.2}/20",
                    entry.rank, entry.full_name, entry.overall_average
                );
            }
        }
        Commands::Compare {
            classes,
            trimester,
            year,
        } => {
            let comparison =
                performance::compare_classes(&pool, &classes, trimester, &year).await?;
            for class in &comparison {
                match &class.statistics {
                    None => println!("- {}: no graded students", class.class_name),
                    Some(stats) => println!(
                        "- {}: average {:.2}/20, median {:.2}, range {:.2} to {:.2}, pass rate {:.2}% ({} students)",
                        class.class_name,
                        stats.average,
                        stats.median,
                        stats.min,
                        stats.max,
                        stats.pass_rate,
                        stats.student_count
                    ),
                }
            }
        }
        Commands::Report {
            student,
            trimester,
            year,
            out,
        } => {
            let summary = db::fetch_student(&pool, student)
                .await?
                .with_context(|| format!("unknown student {student}"))?;
            let result = performance::student_performance(&pool, student, trimester, &year)
                .await?
                .with_context(|| format!("{} has no grades for this period", summary.full_name))?;
            let card = report::build_report_card(&summary, &result);
            std::fs::write(&out, card)?;
            println!("Report written to {}.", out.display());
        }
        Commands::ClassReport {
            class,
            trimester,
            year,
            out,
        } => {
            let overview = performance::class_overview(&pool, &class, trimester, &year).await?;
            let output = report::build_class_report(&class, trimester.as_str(), &year, &overview);
            std::fs::write(&out, output)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Progression {
            student,
            from,
            to,
            year,
        } => {
            let progression =
                performance::student_progression(&pool, student, from, to, &year).await?;
            println!(
                "{:.2}/20 -> {:.2}/20 ({:+.2}, {:?})",
                progression.previous_average,
                progression.current_average,
                progression.delta,
                progression.trend
            );
        }
    }

    Ok(())
}
