use anyhow::{anyhow, Context};
use chrono::{DateTime, NaiveDateTime, Utc};
use core_types::{PricePoint, PriceSeries};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Deserialize)]
struct PriceRecord {
    timestamp: String,
    price: String,
}

/// Reads a `timestamp,price` CSV file with a header row.
///
/// Timestamps may be RFC 3339, `YYYY-mm-dd HH:MM:SS` (UTC) or Unix seconds.
pub fn load_prices(path: &Path) -> anyhow::Result<PriceSeries> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open price file {}", path.display()))?;

    let mut points = Vec::new();
    for (i, record) in reader.deserialize::<PriceRecord>().enumerate() {
        let line = i + 2;
        let record = record.with_context(|| format!("Malformed price row at line {line}"))?;
        let timestamp = parse_timestamp(&record.timestamp)
            .with_context(|| format!("Bad timestamp at line {line}"))?;
        let price = Decimal::from_str(record.price.trim())
            .with_context(|| format!("Bad price '{}' at line {line}", record.price))?;
        points.push(PricePoint { timestamp, price });
    }

    let series = PriceSeries::new(points)
        .with_context(|| format!("Invalid price series in {}", path.display()))?;
    tracing::info!(path = %path.display(), samples = series.len(), "loaded prices");
    Ok(series)
}

fn parse_timestamp(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).ok_or_else(|| anyhow!("{raw} is out of range"));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .with_context(|| format!("unrecognized timestamp '{raw}'"))?;
    Ok(naive.and_utc())
}
