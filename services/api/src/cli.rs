use crate::demo::{run_demo, DemoArgs};
use crate::server;
use admission_odds::config::AppConfig;
use admission_odds::error::AppError;
use admission_odds::workflows::admission::{Factors, ProbabilityEngine};
use chrono::{Datelike, Utc};
use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "Admission Odds",
    about = "Estimate childcare admission likelihood from the command line or over HTTP",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score a single set of factors and print the breakdown
    Score(ScoreArgs),
    /// Seed an in-memory population and run two recompute batches
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Applicant's position in the waiting list
    #[arg(long)]
    pub(crate) queue_position: i64,
    /// Total applicants waiting for the cohort
    #[arg(long)]
    pub(crate) total_waiting: i64,
    /// Seats in the cohort
    #[arg(long)]
    pub(crate) class_capacity: i64,
    /// Children currently enrolled
    #[arg(long)]
    pub(crate) current_enroll: i64,
    /// Seats freed per month over the last year
    #[arg(long, default_value_t = 0.0)]
    pub(crate) historical_to_rate: f64,
    /// Priority tier (1 = highest)
    #[arg(long, default_value_t = 1)]
    pub(crate) priority: i64,
    /// Bonus points awarded to the applicant
    #[arg(long, default_value_t = 0.0)]
    pub(crate) bonus_points: f64,
    /// Calendar month (1-12). Defaults to the current month.
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    pub(crate) month: Option<u32>,
    /// Reject out-of-range factors instead of clamping them
    #[arg(long)]
    pub(crate) strict: bool,
}

impl ScoreArgs {
    fn factors(&self) -> Factors {
        Factors {
            queue_position: self.queue_position,
            total_waiting: self.total_waiting,
            class_capacity: self.class_capacity,
            current_enroll: self.current_enroll,
            historical_to_rate: self.historical_to_rate,
            priority: self.priority,
            bonus_points: self.bonus_points,
        }
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Score(args) => run_score(args),
        Command::Demo(args) => run_demo(args),
    }
}

fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let factors = args.factors();
    if args.strict {
        factors.validate()?;
    }

    let month = args.month.unwrap_or_else(|| Utc::now().month());
    let engine = ProbabilityEngine::new(config.odds.scoring);
    let result = engine.calculate(&factors, month);
    let breakdown = &result.breakdown;

    println!(
        "Admission probability: {:.1}% (grade {}, {})",
        result.probability,
        result.grade,
        result.grade.label()
    );
    println!("  Month: {month}");
    println!("  Position score: {:.2}", breakdown.position_score);
    println!("  Vacancy score:  {:.2}", breakdown.vacancy_score);
    println!("  Turnover score: {:.2}", breakdown.to_score);
    println!("  Priority score: {:.2}", breakdown.priority_score);
    println!("  Bonus score:    {:.2}", breakdown.bonus_score);
    println!("  Raw total:      {:.2}", breakdown.raw_total());

    Ok(())
}
