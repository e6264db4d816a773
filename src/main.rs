use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod auth;
mod config;
mod db;
mod error;
mod models;
mod points;
mod report;
mod standing;

use auth::{authorize, authorize_for_student, Action};
use config::{GlobalArgs, Settings};
use error::LedgerError;
use models::{index_categories, Category, RecordStatus, Sign};

#[derive(Parser)]
#[command(name = "sipma")]
#[command(about = "Student activity point ledger and graduation readiness", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for RecordStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => RecordStatus::Approved,
            Decision::Reject => RecordStatus::Rejected,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import activity records from a CSV file
    Import {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        csv: PathBuf,
    },
    /// List or maintain point categories
    Categories {
        #[command(subcommand)]
        command: CategoryCommand,
    },
    /// Submit an activity claim for review
    Submit {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        nim: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        occurred_on: NaiveDate,
        #[arg(long)]
        description: String,
    },
    /// List claims waiting for review, oldest first
    Pending {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Approve or reject a pending claim
    Review {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        record: Uuid,
        #[arg(long, value_enum)]
        decision: Decision,
        #[arg(long)]
        note: Option<String>,
    },
    /// Replace the reviewer note on a reviewed claim
    Annotate {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        record: Uuid,
        #[arg(long)]
        note: String,
    },
    /// Show one student's point summary and graduation standing
    Summary {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        nim: String,
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown recapitulation of every student's points
    Recap {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        cohort: Option<i32>,
        #[arg(long, default_value = "rekapitulasi.md")]
        out: PathBuf,
    },
}

#[derive(Subcommand)]
enum CategoryCommand {
    /// List all categories, retired ones included
    List,
    /// Define or update a category
    Add {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        name: String,
        #[arg(long, allow_negative_numbers = true)]
        weight: i64,
        #[arg(long)]
        sign: Sign,
        #[arg(long)]
        group: String,
    },
    /// Stop accepting new claims under a category
    Retire {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        name: String,
    },
    /// Accept new claims under a retired category again
    Restore {
        #[arg(long = "as", value_name = "EMAIL")]
        actor: String,
        #[arg(long)]
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::from_args(cli.global).context("invalid configuration")?;
    config::init_tracing(&settings)?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(settings.database_url()?)
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
        Commands::Import { actor, csv } => {
            let principal = db::resolve_principal(&pool, &actor).await?;
            let outcome = db::import_csv(&pool, &principal, &csv).await?;
            println!(
                "Inserted {} records from {} ({} duplicates, {} rejected).",
                outcome.inserted,
                csv.display(),
                outcome.duplicates,
                outcome.rejected
            );
        }
        Commands::Categories { command } => run_category_command(&pool, command).await?,
        Commands::Submit {
            actor,
            nim,
            category,
            occurred_on,
            description,
        } => {
            let principal = db::resolve_principal(&pool, &actor).await?;
            let student = db::find_student_by_nim(&pool, &nim).await?;
            authorize_for_student(&principal, student.as_ref().map(|s| s.id), |student_id| {
                Action::SubmitRecord { student_id }
            })?;
            let student = student.ok_or(LedgerError::UnknownStudent(nim))?;
            let record_id = db::submit_record(
                &pool,
                &principal,
                &student,
                &category,
                occurred_on,
                &description,
            )
            .await?;
            println!("Submitted record {record_id} for {} (pending review).", student.nim);
        }
        Commands::Pending { actor, limit } => {
            let principal = db::resolve_principal(&pool, &actor).await?;
            authorize(&principal, Action::ReviewRecord)?;
            let pending = db::fetch_pending(&pool, limit.max(1)).await?;

            if pending.is_empty() {
                println!("No claims waiting for review.");
                return Ok(());
            }

            println!("Claims waiting for review:");
            for item in pending.iter() {
                println!(
                    "- {} {} ({}) {} on {}: {} [submitted {}]",
                    item.record_id,
                    item.student_name,
                    item.nim,
                    item.category_name,
                    item.occurred_on,
                    item.description,
                    item.submitted_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Review {
            actor,
            record,
            decision,
            note,
        } => {
            let principal = db::resolve_principal(&pool, &actor).await?;
            let status = RecordStatus::from(decision);
            db::review_record(&pool, &principal, record, status, note.as_deref()).await?;
            println!("Record {record} {status}.");
        }
        Commands::Annotate { actor, record, note } => {
            let principal = db::resolve_principal(&pool, &actor).await?;
            db::annotate_record(&pool, &principal, record, &note).await?;
            println!("Note updated on record {record}.");
        }
        Commands::Summary { actor, nim, json } => {
            let principal = db::resolve_principal(&pool, &actor).await?;
            let student = db::find_student_by_nim(&pool, &nim).await?;
            authorize_for_student(&principal, student.as_ref().map(|s| s.id), |student_id| {
                Action::ViewSummary { student_id }
            })?;
            let student = student.ok_or(LedgerError::UnknownStudent(nim))?;

            let records = db::fetch_records_for_student(&pool, student.id).await?;
            let categories = index_categories(db::fetch_categories(&pool).await?);
            let aggregation = points::aggregate(&records, &categories);
            if !aggregation.skipped_records.is_empty() {
                tracing::warn!(
                    nim = %student.nim,
                    skipped = ?aggregation.skipped_records,
                    "approved records reference missing categories"
                );
            }

            let groups = report::known_groups(&categories);
            let doc = report::summary_document(&student, &aggregation, settings.target, &groups)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&doc)?);
            } else {
                println!(
                    "{} ({}, {} {}) total {} (+{} / -{}): {} at {}% of {}",
                    doc.nama,
                    doc.nim,
                    doc.prodi,
                    doc.angkatan,
                    doc.total_poin,
                    doc.total_poin_positif,
                    doc.total_poin_negatif,
                    doc.status_kelulusan,
                    doc.progress_percentage,
                    doc.target
                );
                for (group, total) in points::rollup_by_group(&records, &categories) {
                    println!("  {group}: {total}");
                }
            }
        }
        Commands::Recap { actor, cohort, out } => {
            let principal = db::resolve_principal(&pool, &actor).await?;
            authorize(&principal, Action::ViewRecap)?;

            let students = db::fetch_students(&pool, cohort).await?;
            let records = db::fetch_records(&pool, cohort).await?;
            let categories = index_categories(db::fetch_categories(&pool).await?);
            let recaps = report::build_recap(&students, &records, &categories, settings.target);

            let skipped: usize = recaps.iter().map(|r| r.skipped_records.len()).sum();
            if skipped > 0 {
                tracing::warn!(skipped, "approved records reference missing categories");
            }

            let groups = report::known_groups(&categories);
            let rendered = report::render_recap(cohort, settings.target, &recaps, &groups);
            std::fs::write(&out, rendered)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Recap for {} students written to {}.", recaps.len(), out.display());
        }
    }

    Ok(())
}

async fn run_category_command(pool: &sqlx::PgPool, command: CategoryCommand) -> anyhow::Result<()> {
    match command {
        CategoryCommand::List => {
            let categories = db::fetch_categories(pool).await?;
            if categories.is_empty() {
                println!("No categories defined.");
                return Ok(());
            }
            for category in categories.iter() {
                println!(
                    "- [{}] {} {}{} ({}){}",
                    category.group,
                    category.name,
                    if category.sign == Sign::Positive { "+" } else { "-" },
                    category.weight(),
                    category.sign,
                    if category.is_active { "" } else { " retired" }
                );
            }
        }
        CategoryCommand::Add {
            actor,
            name,
            weight,
            sign,
            group,
        } => {
            let principal = db::resolve_principal(pool, &actor).await?;
            let category = Category::new(Uuid::new_v4(), name, weight, sign, group)?;
            db::create_category(pool, &principal, &category).await?;
            println!("Category '{}' saved.", category.name);
        }
        CategoryCommand::Retire { actor, name } => {
            let principal = db::resolve_principal(pool, &actor).await?;
            db::set_category_active(pool, &principal, &name, false).await?;
            println!("Category '{name}' retired.");
        }
        CategoryCommand::Restore { actor, name } => {
            let principal = db::resolve_principal(pool, &actor).await?;
            db::set_category_active(pool, &principal, &name, true).await?;
            println!("Category '{name}' restored.");
        }
    }

    Ok(())
}
