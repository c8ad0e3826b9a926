use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};

mod catalog;
mod client;
mod config;
mod dataset;
mod error;
mod essay;
mod filter;
mod logging;
mod models;
mod orchestrator;
mod profiles;
mod report;

use catalog::{Catalog, CatalogLoader};
use client::{ApiClientConfig, HttpBackend};
use config::AppConfig;
use error::ErrorKind;
use essay::{EssayKind, SubmissionReceipt};
use filter::{AmountBucket, AmountRange, FilterState, SortKey, StatusFilter};
use models::{Scholarship, StudentProfile};
use orchestrator::{DetailView, Orchestrator, Stage};
use profiles::ProfileStore;

const SLOW_CATALOG_NOTICE: Duration = Duration::from_millis(500);

#[derive(Parser)]
#[command(name = "scholarship-match")]
#[command(
    about = "Browse scholarships, score student matches and draft application essays",
    long_about = None
)]
struct Cli {
    /// Backend base URL (overrides SCHOLARSHIP_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Treat this date as today when classifying deadlines (YYYY-MM-DD)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Case-insensitive text matched against name, description and tags
    #[arg(long, default_value = "")]
    search: String,
    #[arg(long, value_enum, default_value_t = StatusFilter::All)]
    status: StatusFilter,
    #[arg(long, value_enum, default_value_t = AmountRange::All)]
    amount: AmountRange,
    /// Keep scholarships carrying at least one of these tags (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,
}

impl FilterArgs {
    fn state(&self) -> FilterState {
        FilterState {
            search_text: self.search.clone(),
            status: self.status,
            amount_range: self.amount,
            tags: self.tags.iter().cloned().collect::<BTreeSet<_>>(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List scholarships matching the filters
    List {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value_t = SortKey::Catalog)]
        sort: SortKey,
        /// Also write the filtered list as CSV
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Show one scholarship
    Show { id: String },
    /// List the student profiles available for matching
    Profiles,
    /// Generate a markdown catalog report
    Report {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Analyze a scholarship, match a student and draft both essays
    Apply {
        id: String,
        #[arg(long)]
        student: String,
        /// Submit the chosen essay once drafted
        #[arg(long, value_enum)]
        submit: Option<EssayKind>,
    },
    /// Interactive detail view: pick profiles, edit and submit essays
    Session { id: String },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()
        .context("invalid configuration")?
        .with_api_url(cli.api_url.clone());
    logging::init_tracing(&config.log_level);

    let api = Arc::new(
        HttpBackend::new(ApiClientConfig::from(&config)).context("failed to build HTTP client")?,
    );
    tracing::debug!(base_url = api.base_url(), "using scholarship backend");
    let today = cli.today.unwrap_or_else(filter::today);

    match cli.command {
        Commands::List {
            filters,
            sort,
            csv,
        } => {
            let catalog = load_catalog(api.as_ref()).await;
            let mut matches =
                filter::filter_scholarships(&catalog.scholarships, &filters.state(), today);
            filter::sort_scholarships(&mut matches, sort);
            print_catalog(&catalog, &matches, today);

            if let Some(path) = csv {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                report::write_csv(file, &matches, today)?;
                println!("CSV written to {}.", path.display());
            }
        }
        Commands::Show { id } => {
            let scholarship = find_scholarship(api.as_ref(), &id).await?;
            print_scholarship(&scholarship, today);
        }
        Commands::Profiles => {
            let store = ProfileStore::with_default_roster();
            print_profiles(store.roster());
        }
        Commands::Report { filters, out } => {
            let catalog = load_catalog(api.as_ref()).await;
            let state = filters.state();
            let matches = filter::filter_scholarships(&catalog.scholarships, &state, today);
            let report = report::build_report(&catalog, &state, today, &matches);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Apply {
            id,
            student,
            submit,
        } => {
            let store = ProfileStore::with_default_roster();
            let scholarship = find_scholarship(api.as_ref(), &id).await?;
            store.select(&student)?;

            let orchestrator =
                Orchestrator::new(Arc::clone(&api), scholarship, config.submit_delay());
            tokio::join!(
                orchestrator.open(),
                orchestrator.select_student(store.selected())
            );
            print_detail(&orchestrator.snapshot(), today);

            if let Some(kind) = submit {
                let receipt = orchestrator.submit(kind).await?;
                print_receipt(&receipt);
                println!("{}", serde_json::to_string_pretty(&receipt)?);
                println!("Returning to catalog.");
                let catalog = load_catalog(api.as_ref()).await;
                print_catalog(&catalog, &catalog.scholarships, today);
            }
        }
        Commands::Session { id } => {
            let scholarship = find_scholarship(api.as_ref(), &id).await?;
            run_session(Arc::clone(&api), scholarship, &config, today).await?;
        }
    }

    Ok(())
}

async fn load_catalog(api: &HttpBackend) -> Catalog {
    let loader = CatalogLoader::new(api);
    let load = loader.load();
    tokio::pin!(load);

    let catalog = tokio::select! {
        catalog = &mut load => catalog,
        _ = tokio::time::sleep(SLOW_CATALOG_NOTICE) => {
            if loader.is_loading() {
                eprintln!("Loading scholarships...");
            }
            load.await
        }
    };
    tracing::debug!(
        count = catalog.scholarships.len(),
        source = catalog.source.label(),
        "catalog ready"
    );
    catalog
}

async fn find_scholarship(api: &HttpBackend, id: &str) -> anyhow::Result<Scholarship> {
    let loader = CatalogLoader::new(api);
    match loader.find(id).await {
        Ok(scholarship) => Ok(scholarship),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            anyhow::bail!(
                "scholarship {id} not found; run `scholarship-match list` to browse the catalog"
            )
        }
        Err(err) => Err(err).with_context(|| format!("failed to load scholarship {id}")),
    }
}

async fn run_session(
    api: Arc<HttpBackend>,
    scholarship: Scholarship,
    config: &AppConfig,
    today: NaiveDate,
) -> anyhow::Result<()> {
    let store = ProfileStore::with_default_roster();
    print_scholarship(&scholarship, today);

    let orchestrator = Orchestrator::new(Arc::clone(&api), scholarship, config.submit_delay());
    let follower = tokio::spawn(orchestrator.clone().follow_profiles(store.subscribe()));
    let opener = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.open().await })
    };

    print_session_help();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (None, _) => continue,
            (Some("student"), Some(id)) => match store.select(id) {
                Ok(profile) => println!("Selected {} ({}).", profile.name, profile.id),
                Err(err) => println!("{err}"),
            },
            (Some("clear"), _) => {
                store.clear();
                println!("Profile cleared.");
            }
            (Some("profiles"), _) => print_profiles(store.roster()),
            (Some("status"), _) => print_detail(&orchestrator.snapshot(), today),
            (Some("edit"), Some(kind)) => {
                let Ok(kind) = EssayKind::from_str(kind, true) else {
                    println!("Essay kind must be general or specific.");
                    continue;
                };
                println!("Type the new essay. Finish with a single line containing /end.");

                let mut text = Vec::new();
                while let Some(line) = lines.next_line().await? {
                    if line.trim().eq_ignore_ascii_case("/end") {
                        break;
                    }
                    text.push(line);
                }

                match orchestrator.edit_essay(kind, text.join("\n").trim().to_string()) {
                    Ok(()) => println!("{} essay updated.", kind.label()),
                    Err(err) => println!("{err}"),
                }
            }
            (Some("submit"), Some(kind)) => {
                let Ok(kind) = EssayKind::from_str(kind, true) else {
                    println!("Essay kind must be general or specific.");
                    continue;
                };

                match orchestrator.submit(kind).await {
                    Ok(receipt) => {
                        print_receipt(&receipt);
                        println!("Returning to catalog.");
                        let catalog = load_catalog(api.as_ref()).await;
                        print_catalog(&catalog, &catalog.scholarships, today);
                        break;
                    }
                    Err(err) => println!("{err}"),
                }
            }
            (Some("quit" | "exit"), _) => break,
            _ => print_session_help(),
        }
    }

    opener.abort();
    drop(store);
    let _ = follower.await;
    Ok(())
}

fn print_session_help() {
    println!("Commands:");
    println!("  student <id>              select a student profile");
    println!("  clear                     clear the selected profile");
    println!("  profiles                  list available profiles");
    println!("  status                    show analysis, match and essays");
    println!("  edit <general|specific>   rewrite an essay");
    println!("  submit <general|specific> submit an essay and return to the catalog");
    println!("  quit");
}

fn print_catalog(catalog: &Catalog, matches: &[Scholarship], today: NaiveDate) {
    println!(
        "Showing {} of {} scholarships ({} catalog):",
        matches.len(),
        catalog.scholarships.len(),
        catalog.source.label()
    );

    if matches.is_empty() {
        println!("No scholarships match these filters.");
    }

    for scholarship in matches {
        println!(
            "- {} {} ${} ({}) due {} [{}, {} days] tags: {}",
            scholarship.id,
            scholarship.name,
            scholarship.amount,
            AmountBucket::of(scholarship.amount).label(),
            scholarship.deadline,
            filter::classify(scholarship, today).label(),
            filter::days_until(scholarship.deadline, today),
            scholarship.tags.join(", ")
        );
    }

    println!(
        "Tags: {}",
        filter::available_tags(&catalog.scholarships).join(", ")
    );
}

fn print_scholarship(scholarship: &Scholarship, today: NaiveDate) {
    println!("{} ({})", scholarship.name, scholarship.id);
    println!(
        "Award ${} ({}), deadline {} ({}, {} days)",
        scholarship.amount,
        AmountBucket::of(scholarship.amount).label(),
        scholarship.deadline,
        filter::classify(scholarship, today).label(),
        filter::days_until(scholarship.deadline, today)
    );
    println!("Tags: {}", scholarship.tags.join(", "));
    println!();
    println!("{}", scholarship.description);
    println!("Eligibility: {}", scholarship.eligibility);
}

fn print_profiles(roster: &[StudentProfile]) {
    println!("Student profiles:");
    for profile in roster {
        println!(
            "- {} {}: {} {} ({}), GPA {:.2}{}",
            profile.id,
            profile.name,
            profile.degree_level,
            profile.field_of_study,
            profile.year,
            profile.gpa,
            if profile.financial_need {
                ", financial need"
            } else {
                ""
            }
        );
    }
}

fn stage_line<T>(label: &str, stage: &Stage<T>, ready: impl Fn(&T) -> String) -> String {
    if let Some(value) = stage.ready() {
        format!("{label}: {}", ready(value))
    } else if let Some(err) = stage.failure() {
        format!("{label} failed: {err}")
    } else if stage.is_idle() {
        format!("{label}: not started")
    } else {
        format!("{label}: in progress...")
    }
}

fn print_detail(view: &DetailView, today: NaiveDate) {
    print_scholarship(view.scholarship(), today);
    println!();
    println!("Phase: {:?}", view.phase());

    println!(
        "{}",
        stage_line("Analysis", view.analysis(), |a| a.priority_summary.clone())
    );
    if let Some(analysis) = view.analysis().ready() {
        for (name, weight) in analysis.weights.ranked() {
            println!("  {name:<18} {weight:.2}");
        }
        if !analysis.tone.is_empty() {
            println!("  tone: {}", analysis.tone.join(", "));
        }
        for snippet in &analysis.evidence_snippets {
            println!("  > {snippet}");
        }
    }

    match view.student() {
        Some(student) => println!("Student: {} ({})", student.name, student.id),
        None => println!("Student: none selected"),
    }

    println!(
        "{}",
        stage_line("Match", view.matching(), |m| format!("{}/100", m.match_score))
    );
    if let Some(matched) = view.matching().ready() {
        for reason in &matched.top_reasons {
            println!("  - {reason}");
        }
    }

    for kind in [EssayKind::General, EssayKind::Specific] {
        let label = format!("{} essay", kind.label());
        println!(
            "{}",
            stage_line(&label, view.essay(kind), |draft| format!(
                "{} words{}",
                draft.word_count(),
                if draft.edited { ", edited" } else { "" }
            ))
        );
        if let Some(draft) = view.essay(kind).ready() {
            println!();
            println!("{}", draft.content);
            println!();
        }
    }

    if let Some(receipt) = view.receipt() {
        print_receipt(receipt);
    }
}

fn print_receipt(receipt: &SubmissionReceipt) {
    println!(
        "Submitted {} essay for {} as {} at {} (receipt {}).",
        receipt.kind.label(),
        receipt.scholarship_id,
        receipt.student_id,
        receipt.submitted_at.format("%Y-%m-%d %H:%M UTC"),
        receipt.id
    );
}
