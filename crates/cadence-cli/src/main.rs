//! Cadence CLI
//!
//! Command-line interface for running the analytics engine over event logs.

mod input;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use cadence_core::{
    AggregateRange, AnalyticsEngine, CancellationToken, CycleReport, EngineConfig, EngineError,
    EventInput, Granularity, Insight, InsightKind, Pattern, PatternKind, Prediction, TimeBucket,
    aggregate::weekday_name,
};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::json;
use tracing::{Level, warn};
use tracing_subscriber::EnvFilter;

/// Cadence - Behavioral Pattern Analytics CLI
#[derive(Parser)]
#[command(name = "cadence")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find recurring patterns, insights and predictions in behavioral event logs")]
#[command(long_about = "Cadence aggregates timestamped events into day/week/month buckets, detects \
time-of-day and trigger-tag patterns, and projects them into expiring predictions.\n\n\
Events are read from JSON Lines files, one event per line.")]
struct Cli {
    /// Engine configuration file (JSON); CADENCE_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one analysis cycle over an event log
    Analyze {
        /// JSON Lines event file
        #[arg(long)]
        events: PathBuf,
        /// Evaluate as of this instant (RFC 3339) instead of now
        #[arg(long)]
        at: Option<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        /// Write the engine snapshot to this file
        #[arg(long)]
        snapshot_out: Option<PathBuf>,
    },

    /// Show the bucket containing a date
    Aggregate {
        /// JSON Lines event file
        #[arg(long)]
        events: PathBuf,
        /// Bucket granularity: day, week or month
        #[arg(long, default_value = "day")]
        granularity: String,
        /// Date inside the bucket (YYYY-MM-DD)
        #[arg(long)]
        date: String,
        /// Print the bucket as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score predictions learned from a history against actual events
    Evaluate {
        /// Events the predictions are learned from
        #[arg(long)]
        history: PathBuf,
        /// Events that actually happened afterwards
        #[arg(long)]
        actual: PathBuf,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    let config = input::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Analyze {
            events,
            at,
            json,
            snapshot_out,
        } => run_analyze(config, &events, at, json, snapshot_out).await,
        Commands::Aggregate {
            events,
            granularity,
            date,
            json,
        } => run_aggregate(config, &events, &granularity, &date, json),
        Commands::Evaluate {
            history,
            actual,
            json,
        } => run_evaluate(config, &history, &actual, json).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays clean for results
fn init_logging(json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(Level::WARN.into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.with_ansi(false).init();
    }
}

/// Submit every event, logging rejections; returns accepted count
fn ingest(engine: &AnalyticsEngine, events: Vec<EventInput>) -> anyhow::Result<usize> {
    let mut accepted = 0;
    for (index, event) in events.into_iter().enumerate() {
        match engine.submit(event) {
            Ok(_) => accepted += 1,
            Err(EngineError::Validation(e)) => {
                warn!(event = index + 1, error = %e, "Skipping invalid event");
            }
            Err(e) => return Err(e.into()),
        }
    }
    engine.flush()?;
    Ok(accepted)
}

fn parse_instant(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid instant '{}', expected RFC 3339", raw))?
        .with_timezone(&Utc))
}

// ============================================================================
// ANALYZE
// ============================================================================

async fn run_analyze(
    config: EngineConfig,
    events_path: &Path,
    at: Option<String>,
    json: bool,
    snapshot_out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let now = match at {
        Some(raw) => parse_instant(&raw)?,
        None => Utc::now(),
    };

    let engine = AnalyticsEngine::new(config)?;
    let submitted = input::load_events(events_path)?;
    let total = submitted.len();
    let accepted = ingest(&engine, submitted)?;

    let report = engine.run_cycle_at(&CancellationToken::new(), now).await?;
    let patterns = engine.current_patterns();
    let insights = engine.current_insights_at(now);
    let predictions = engine.current_predictions_at(now);

    if let Some(path) = snapshot_out {
        std::fs::write(&path, engine.snapshot().to_json()?)
            .with_context(|| format!("Cannot write snapshot to {}", path.display()))?;
    }

    if json {
        let out = json!({
            "report": report,
            "patterns": patterns,
            "insights": insights,
            "predictions": predictions,
            "predictionState": engine.prediction_state(),
            "stats": engine.stats(),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "=== Cadence Analysis ===".cyan().bold());
    println!();
    println!("{}: {} of {}", "Events Accepted".white().bold(), accepted, total);
    print_report(&report);

    println!();
    println!("{}", "=== Patterns ===".yellow().bold());
    if patterns.is_empty() {
        println!("{}", "No patterns survived this cycle.".dimmed());
    }
    for pattern in &patterns {
        print_pattern(pattern);
    }

    println!();
    println!("{}", "=== Insights ===".green().bold());
    if insights.is_empty() {
        println!("{}", "Not enough confident patterns for insights yet.".dimmed());
    }
    for insight in &insights {
        print_insight(insight);
    }

    println!();
    println!("{}", "=== Predictions ===".magenta().bold());
    if predictions.is_empty() {
        println!(
            "{} ({})",
            "No active predictions.".dimmed(),
            engine.prediction_state()
        );
    }
    for prediction in &predictions {
        print_prediction(prediction);
    }

    Ok(())
}

fn print_report(report: &CycleReport) {
    println!("{}: {}", "Patterns Updated".white().bold(), report.patterns_updated);
    println!("{}: {}", "Patterns Pruned".white().bold(), report.patterns_pruned);
    println!("{}: {}", "Insights Generated".white().bold(), report.insights_generated);
    println!("{}: {}", "Predictions Generated".white().bold(), report.predictions_generated);
    if report.events_skipped > 0 {
        println!("{}: {}", "Events Skipped".red().bold(), report.events_skipped);
    }
    println!("{}: {}ms", "Duration".white().bold(), report.duration_ms);
}

fn print_pattern(pattern: &Pattern) {
    let kind = match pattern.kind() {
        PatternKind::TimeBased { .. } => "time",
        PatternKind::TriggerBased { .. } => "trigger",
    };
    println!(
        "  {:8} {:28} [{}] {:>5.1}%  {} obs",
        kind,
        pattern.label(),
        confidence_bar(pattern.confidence()),
        pattern.confidence() * 100.0,
        pattern.observation_count()
    );
}

fn print_insight(insight: &Insight) {
    let title = match insight.kind {
        InsightKind::Warning => insight.title.red().bold(),
        InsightKind::TriggerCorrelation => insight.title.yellow().bold(),
        InsightKind::TimeOfDay => insight.title.white().bold(),
    };
    println!("  {} {}", title, format!("(relevance {:.2})", insight.relevance_score).dimmed());
    println!("    {}", insight.description);
}

fn print_prediction(prediction: &Prediction) {
    let tags = if prediction.expected_tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", prediction.expected_tags.join(", "))
    };
    println!(
        "  {} - {}  {:>5.1}%  intensity ~{:.1}{}",
        prediction.target_window_start.format("%Y-%m-%d %H:%M"),
        prediction.target_window_end.format("%H:%M"),
        prediction.confidence * 100.0,
        prediction.expected_intensity,
        tags
    );
}

fn confidence_bar(confidence: f64) -> String {
    let width: usize = 20;
    let filled = ((confidence.clamp(0.0, 1.0)) * width as f64).round() as usize;
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(width - filled));
    if confidence >= 0.6 {
        bar.green().to_string()
    } else if confidence >= 0.3 {
        bar.yellow().to_string()
    } else {
        bar.red().to_string()
    }
}

// ============================================================================
// AGGREGATE
// ============================================================================

fn run_aggregate(
    config: EngineConfig,
    events_path: &Path,
    granularity: &str,
    date: &str,
    json: bool,
) -> anyhow::Result<()> {
    let granularity: Granularity = granularity.parse().map_err(anyhow::Error::msg)?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", date))?;
    let Some(midnight) = date.and_hms_opt(0, 0, 0) else {
        bail!("Invalid date {}", date);
    };

    let engine = AnalyticsEngine::new(config)?;
    ingest(&engine, input::load_events(events_path)?)?;

    let snapshot = match engine.query_aggregate(granularity, AggregateRange::Containing(midnight.and_utc())) {
        Ok(snapshot) => snapshot,
        Err(EngineError::NoDataAvailable { .. }) => {
            if json {
                println!("null");
            } else {
                println!("{}", format!("No {} data for {}.", granularity, date).dimmed());
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    for bucket in &snapshot.buckets {
        print_bucket(bucket);
    }
    Ok(())
}

fn print_bucket(bucket: &TimeBucket) {
    println!(
        "{}",
        format!("=== {} of {} ===", bucket.granularity, bucket.start.format("%Y-%m-%d"))
            .cyan()
            .bold()
    );
    println!();
    println!("{}: {}", "Events".white().bold(), bucket.count);
    println!("{}: {:.2}", "Mean Intensity".white().bold(), bucket.mean_intensity());
    if let Some(hour) = bucket.peak_hour() {
        println!("{}: {:02}:00", "Peak Hour".white().bold(), hour);
    }
    if let Some(day) = bucket.peak_weekday() {
        println!("{}: {}", "Peak Weekday".white().bold(), weekday_name(day));
    }

    println!();
    println!("{}", "Time of Day".yellow().bold());
    for (hour, count) in &bucket.time_of_day_histogram {
        print_distribution_bar(&format!("{:02}:00", hour), *count, bucket.count);
    }

    if !bucket.tag_frequency.is_empty() {
        println!();
        println!("{}", "Tags".yellow().bold());
        let mut tags: Vec<(&String, &u64)> = bucket.tag_frequency.iter().collect();
        tags.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (tag, count) in tags {
            print_distribution_bar(tag, *count, bucket.count);
        }
    }
}

fn print_distribution_bar(label: &str, count: u64, total: u64) {
    let percentage = if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    };

    let bar_width: usize = 30;
    let filled = ((percentage / 100.0) * bar_width as f64) as usize;
    let empty = bar_width.saturating_sub(filled);
    let bar = format!("{}{}", "#".repeat(filled), "-".repeat(empty));

    println!(
        "  {:15} [{}] {:>4} ({:>5.1}%)",
        label,
        bar.green(),
        count,
        percentage
    );
}

// ============================================================================
// EVALUATE
// ============================================================================

async fn run_evaluate(
    config: EngineConfig,
    history_path: &Path,
    actual_path: &Path,
    json: bool,
) -> anyhow::Result<()> {
    let history = input::load_events(history_path)?;
    let Some(now) = history.iter().filter_map(|e| e.timestamp).max() else {
        bail!("{} contains no timestamped events", history_path.display());
    };

    let engine = AnalyticsEngine::new(config)?;
    ingest(&engine, history)?;
    engine.run_cycle_at(&CancellationToken::new(), now).await?;
    let predictions = engine.current_predictions_at(now);

    let mut actuals = Vec::new();
    for (index, raw) in input::load_events(actual_path)?.into_iter().enumerate() {
        match raw.validate() {
            Ok(event) => actuals.push(event),
            Err(e) => warn!(event = index + 1, error = %e, "Skipping invalid actual event"),
        }
    }

    let report = AnalyticsEngine::evaluate_predictions(predictions.clone(), actuals).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "=== Cadence Prediction Accuracy ===".cyan().bold());
    println!();
    if predictions.is_empty() {
        println!(
            "{} ({})",
            "No predictions to evaluate.".dimmed(),
            engine.prediction_state()
        );
        return Ok(());
    }
    println!("{}: {}", "Predictions".white().bold(), report.evaluated);
    println!(
        "{}: {} ({:.1}%)",
        "Window Hits".white().bold(),
        report.hits,
        report.hit_rate() * 100.0
    );
    println!("{}: {:.3}", "Mean Accuracy".white().bold(), report.mean_accuracy);
    println!();
    for (prediction, score) in predictions.iter().zip(&report.scores) {
        let marker = if score.hit { "hit".green() } else { "miss".red() };
        println!(
            "  {} - {}  {:>4}  score {:.3}",
            prediction.target_window_start.format("%Y-%m-%d %H:%M"),
            prediction.target_window_end.format("%H:%M"),
            marker,
            score.best_score
        );
    }
    Ok(())
}
