//! `date,value` CSV input and prediction output.

use crate::domain::series::{HistoricalSeries, Observation, PredictionSeries, PredictionSource};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use tracing::info;

/// One input row. An empty `value` field is a missing observation.
#[derive(Debug, Deserialize)]
struct SeriesRecord {
    date: NaiveDate,
    value: Option<f64>,
}

#[derive(Debug, Serialize)]
struct PredictionRecord {
    date: NaiveDate,
    value: f64,
    source: String,
}

pub fn read_series<R: Read>(reader: R) -> Result<HistoricalSeries> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut observations = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        let record: SeriesRecord =
            result.with_context(|| format!("Failed to parse CSV record {}", i + 1))?;
        observations.push(Observation {
            date: record.date,
            value: record.value,
        });
    }

    HistoricalSeries::new(observations).context("Invalid historical series")
}

pub fn load_series(path: &Path) -> Result<HistoricalSeries> {
    let file =
        File::open(path).with_context(|| format!("Failed to open series file {}", path.display()))?;
    let series = read_series(BufReader::new(file))?;
    info!(
        "Loaded {} observations from {:?} (last date {})",
        series.len(),
        path,
        series.last_date()
    );
    Ok(series)
}

pub fn write_predictions<W: Write>(writer: W, predictions: &PredictionSeries) -> Result<()> {
    let source = match predictions.source() {
        PredictionSource::Model { name } => name.clone(),
        PredictionSource::HistoricalMean { .. } => "historical_mean".to_string(),
    };

    let mut wtr = csv::Writer::from_writer(writer);
    for point in predictions.points() {
        wtr.serialize(PredictionRecord {
            date: point.date,
            value: point.value,
            source: source.clone(),
        })
        .context("Failed to serialize prediction")?;
    }
    wtr.flush().context("Failed to flush CSV writer")?;
    Ok(())
}

pub fn save_predictions(path: &Path, predictions: &PredictionSeries) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create prediction file {}", path.display()))?;
    write_predictions(file, predictions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::{FallbackReason, PredictedPoint};

    #[test]
    fn test_read_series_with_missing_value() {
        let data = "date,value\n2024-01-01,10.5\n2024-01-02,\n2024-01-03,11.0\n";
        let series = read_series(data.as_bytes()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.observations()[1].value, None);
        assert_eq!(series.filled_values(), vec![10.5, 10.5, 11.0]);
    }

    #[test]
    fn test_read_series_rejects_unsorted_dates() {
        let data = "date,value\n2024-01-02,10.0\n2024-01-01,11.0\n";
        assert!(read_series(data.as_bytes()).is_err());
    }

    #[test]
    fn test_read_series_rejects_bad_date() {
        let data = "date,value\nyesterday,10.0\n";
        assert!(read_series(data.as_bytes()).is_err());
    }

    #[test]
    fn test_write_predictions() {
        let predictions = PredictionSeries::new(
            vec![PredictedPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 8).unwrap(),
                value: 12.0,
            }],
            PredictionSource::HistoricalMean {
                reason: FallbackReason::NoModel,
            },
        );
        let mut out = Vec::new();
        write_predictions(&mut out, &predictions).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "date,value,source\n2024-01-08,12.0,historical_mean\n");
    }
}
