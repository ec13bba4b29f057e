//! metrics-runner: headless report runner for the call-center metrics engine.
//!
//! Usage:
//!   metrics-runner --config engine.json --region all --start 1403/01/01 --end 1403/01/31
//!   metrics-runner --db calls.db --region 8 --start 1403/01/01 --end 1403/01/07 --details
//!   metrics-runner --db calls.db --record 42
//!   metrics-runner --seed-demo --region all --start 1403/01/01 --end 1403/01/03 --export

use anyhow::Result;
use callstats_core::{
    analytics::RecordAnalytics,
    config::EngineConfig,
    counter::{CounterRow, Region},
    engine::MetricsEngine,
    feed::ExternalSeriesMerger,
    store::MetricsStore,
    types::{DateRange, RecordId, RegionScope, ReportDate},
};
use std::env;
use std::io::{self, Write};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config = match string_arg(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::from_env()?,
    };
    let db = string_arg(&args, "--db").unwrap_or(&config.database_path).to_string();

    let store = MetricsStore::open(&db)?;
    store.migrate()?;
    if has_flag(&args, "--seed-demo") {
        seed_demo(&store)?;
    }

    let engine = MetricsEngine::new(&store, ExternalSeriesMerger::from_config(&config.feed));
    let mut stdout = io::stdout();

    if let Some(record_id) = parse_arg::<RecordId>(&args, "--record") {
        let record = engine.record(record_id)?;
        writeln!(stdout, "{}", serde_json::to_string_pretty(&record)?)?;
        return Ok(());
    }

    let scope = RegionScope::parse(string_arg(&args, "--region").unwrap_or("all"))?;
    let range = DateRange::parse(
        string_arg(&args, "--start").ok_or_else(|| anyhow::anyhow!("missing --start"))?,
        string_arg(&args, "--end").ok_or_else(|| anyhow::anyhow!("missing --end"))?,
    )?;
    log::info!("metrics-runner db={db} scope={scope} range={}..{}", range.start, range.end);

    let json = if has_flag(&args, "--export") {
        serde_json::to_string_pretty(&engine.export(scope, &range)?)?
    } else if has_flag(&args, "--details") {
        let region_id = scope
            .region_id()
            .ok_or_else(|| anyhow::anyhow!("--details needs a single --region"))?;
        serde_json::to_string_pretty(&engine.daily_details(region_id, &range)?)?
    } else {
        serde_json::to_string_pretty(&engine.report(scope, &range)?)?
    };
    writeln!(stdout, "{json}")?;
    stdout.flush()?;
    Ok(())
}

/// Three regions, three days of traffic with a little per-record
/// analytics. For trying the runner without a production database.
fn seed_demo(store: &MetricsStore) -> Result<()> {
    let regions = [(1, "Tehran", 5400), (2, "Isfahan", 2100), (3, "Fars", 1800)];
    for (region_id, name, base) in regions {
        let mut region = Region::new(region_id, name);
        region.transfer_date = Some("1403/01/03".into());
        store.upsert_region(&region)?;

        for day in 1..=3i64 {
            let total = base + day * 37;
            let answered = total * 8 / 10;
            let row = CounterRow {
                region_id: Some(region_id),
                date: Some(ReportDate::parse(&format!("1403/01/{day:02}"))?),
                total_number: total,
                number_answered: answered,
                number_answered_operator: answered - 50,
                number_unanswered: total / 10,
                number_busy: total / 40,
                number_failed: total / 50,
                congestion: 5,
                mci: total / 2,
                irancell: total / 4,
                rightel: total / 20,
                fixed: total / 10,
                other: total / 10,
                abandoned_calls: total / 12,
                short_calls_under_5s: total / 15,
                duration_seconds: total * 95,
                duration_answered_seconds: answered * 110,
                total_wait_time: total * 3,
                call_completion_rate: Some(78.0 + day as f64),
                answer_rate: Some(80.0),
                service_level: Some(92.5),
                call_abandonment_rate: Some(8.3),
                average_handle_time: Some(110.0 - day as f64),
                average_wait_time: Some(2.4),
                average_speed_of_answer: Some(3.1),
                queue_calls: Some(40.0 + day as f64),
                ..CounterRow::default()
            };
            let record_id = store.insert_daily_row(&row)?;
            let analytics = RecordAnalytics {
                hourly_call_volume: Some(serde_json::json!([
                    total / 48, total / 24, total / 12, total / 8, total / 6
                ])),
                handled_calls_per_operator: Some(serde_json::json!({
                    "op-1": answered / 2,
                    "op-2": answered - answered / 2
                })),
                ..RecordAnalytics::default()
            };
            store.upsert_record_analytics(record_id, &analytics)?;
        }
    }
    log::info!("seeded demo data: {} regions, {} rows", store.region_count()?, store.daily_row_count()?);
    Ok(())
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    string_arg(args, flag).and_then(|v| v.parse().ok())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}
