use crate::infra::{demo_shifted_cohort, parse_timestamp, seed_demo_population, InMemoryStack};
use admission_odds::config::AppConfig;
use admission_odds::error::AppError;
use admission_odds::telemetry;
use admission_odds::workflows::admission::{Confidence, RecomputeReport};
use chrono::{DateTime, Duration, Utc};
use clap::Args;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Time of the first recompute batch (YYYY-MM-DD or RFC 3339). Defaults to now.
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) as_of: Option<DateTime<Utc>>,
    /// Days between the first and second batch.
    #[arg(long, default_value_t = 8)]
    pub(crate) days_between: i64,
    /// Children leaving the shifted cohort between batches.
    #[arg(long, default_value_t = 10)]
    pub(crate) departures: i64,
    /// Print each batch report as JSON as well.
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init_for_cli(&config.telemetry)?;

    let first_run = args.as_of.unwrap_or_else(Utc::now);
    let second_run = first_run + Duration::days(args.days_between);

    let stack = InMemoryStack::build(&config.odds);
    seed_demo_population(&stack, first_run);

    println!("=== Admission odds demo ===");
    println!(
        "Snapshots stay valid for {} days; batches recompute up to {} cohorts.",
        config.odds.recompute.validity_days, config.odds.recompute.batch_size
    );

    let report = stack.scheduler.run_batch(first_run)?;
    render_report("Initial batch", &report, args.json);

    let shifted = demo_shifted_cohort();
    stack.cohorts.adjust_enrollment(&shifted, -args.departures);
    println!();
    println!(
        "{} children leave {} before the next batch.",
        args.departures, shifted
    );

    let report = stack.scheduler.run_batch(second_run)?;
    render_report("Follow-up batch", &report, args.json);

    let alerts = stack.alerts.events();
    println!();
    if alerts.is_empty() {
        println!("Probability alerts: none dispatched");
    } else {
        println!("Probability alerts:");
        for alert in alerts {
            println!("  - {} -> {} [{}]", alert.user_id, alert.body, alert.action_url);
        }
    }

    Ok(())
}

fn render_report(title: &str, report: &RecomputeReport, as_json: bool) {
    println!();
    println!("{} at {}", title, report.as_of.format("%Y-%m-%d %H:%M UTC"));
    println!(
        "  Considered {} cohorts: {} fresh, {} recomputed, {} deferred, {} failed",
        report.considered,
        report.fresh,
        report.recomputed.len(),
        report.deferred,
        report.failures.len()
    );

    for cohort in &report.recomputed {
        let trend = match &cohort.trend {
            Some(trend) => format!(
                "{} {:+.1} over {}",
                trend.direction.label(),
                trend.delta,
                trend.period
            ),
            None => "first estimate".to_string(),
        };
        let confidence = match cohort.confidence {
            Confidence::Low => format!(", low confidence: {} turnover events", cohort.turnover_samples),
            Confidence::Normal => String::new(),
        };
        println!(
            "  - {}: {:.1}% grade {} ({}{})",
            cohort.key, cohort.probability, cohort.grade, trend, confidence
        );
    }
    if report.alerts_sent + report.alerts_failed > 0 {
        println!(
            "  Alerts: {} delivered, {} failed",
            report.alerts_sent, report.alerts_failed
        );
    }
    for failure in &report.failures {
        println!("  ! {}: {}", failure.key, failure.error);
    }

    if as_json {
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("  Report payload unavailable: {err}"),
        }
    }
}
