use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use fund_alloc::analyst::{ChatClient, NeutralAnalyst, TextAnalyst};
use fund_alloc::config::AppConfig;
use fund_alloc::error::AppError;
use fund_alloc::pipeline::AllocationRun;
use fund_alloc::project::load_projects;
use fund_alloc::scoring::{GeographicScope, RiskTolerance, TimeframePriority};
use fund_alloc::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "fund-alloc",
    about = "Score candidate funding projects and allocate a budget across them",
    version
)]
struct Cli {
    /// CSV export with Project Title, Funding Raised, Funding Goal, Project Summary columns
    projects: String,
    /// Total budget (defaults to FUND_ALLOC_BUDGET or 700000)
    #[arg(long)]
    budget: Option<f64>,
    /// low, medium or high
    #[arg(long, value_parser = parse_risk)]
    risk_tolerance: Option<RiskTolerance>,
    /// near-term, long-term or anything else
    #[arg(long)]
    timeframe: Option<String>,
    /// global, national, local or anything else
    #[arg(long)]
    scope: Option<String>,
    /// Request a qualitative description for every funded project
    #[arg(long)]
    narratives: bool,
    /// Skip the text collaborator and use the neutral impact seed
    #[arg(long)]
    offline: bool,
    /// Seed for the opportunity cost simulation
    #[arg(long)]
    seed: Option<u64>,
    /// Also write the report as JSON to this path
    #[arg(long)]
    json: Option<String>,
}

fn parse_risk(raw: &str) -> Result<RiskTolerance, String> {
    raw.parse()
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    if let Some(budget) = cli.budget {
        config.budget = budget;
    }
    if let Some(risk) = cli.risk_tolerance {
        config.policy.risk_tolerance = risk;
    }
    if let Some(raw) = cli.timeframe.as_deref() {
        config.policy.timeframe_priority = TimeframePriority::parse(raw);
    }
    if let Some(raw) = cli.scope.as_deref() {
        config.policy.geographic_scope = GeographicScope::parse(raw);
    }
    let seed = cli.seed.or(config.seed);

    let projects = load_projects(&cli.projects)?;

    let chat;
    let analyst: &dyn TextAnalyst = match (&config.service, cli.offline) {
        (Some(service), false) => {
            chat = ChatClient::new(service.clone())?;
            &chat
        }
        _ => {
            tracing::warn!(
                "text collaborator disabled, every project gets the neutral impact seed"
            );
            &NeutralAnalyst
        }
    };
    let narratives = cli.narratives && config.service.is_some() && !cli.offline;

    let run = AllocationRun::new(analyst)
        .with_retry(config.retry.clone())
        .with_narratives(narratives);

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let report = run
        .execute(projects, &config.policy, config.budget, &mut rng)
        .await?;

    print!("{}", report.render());

    if let Some(path) = cli.json.as_deref() {
        report.write_json(path)?;
        tracing::info!(path, "report written");
    }

    Ok(())
}
