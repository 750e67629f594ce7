use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Duration, NaiveDate};
use csv::Writer;

use crate::analysis::aggregation::DiurnalProfile;
use crate::analysis::reporting::StationSummary;

#[derive(Debug)]
pub enum ExportError {
    IoError(std::io::Error),
    CsvError(csv::Error),
    InvalidYear(String),
}

impl From<std::io::Error> for ExportError {
    fn from(err: std::io::Error) -> Self {
        ExportError::IoError(err)
    }
}

impl From<csv::Error> for ExportError {
    fn from(err: csv::Error) -> Self {
        ExportError::CsvError(err)
    }
}

impl std::fmt::Display for ExportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportError::IoError(e) => write!(f, "IO error: {}", e),
            ExportError::CsvError(e) => write!(f, "CSV error: {}", e),
            ExportError::InvalidYear(year) => write!(f, "'{}' is not a year", year),
        }
    }
}

impl std::error::Error for ExportError {}

/// Write hourly series side by side, one timestamped row per hour of the
/// simulation year.
pub fn export_hourly<P: AsRef<Path>>(
    path: P,
    year: &str,
    series: &BTreeMap<String, Vec<f64>>,
) -> Result<(), ExportError> {
    let year_number: i32 = year
        .trim()
        .parse()
        .map_err(|_| ExportError::InvalidYear(year.to_string()))?;
    let start = NaiveDate::from_ymd_opt(year_number, 1, 1)
        .ok_or_else(|| ExportError::InvalidYear(year.to_string()))?
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ExportError::InvalidYear(year.to_string()))?;

    let mut writer = Writer::from_path(path)?;
    let mut header = vec!["Time".to_string()];
    header.extend(series.keys().cloned());
    writer.write_record(&header)?;

    let hours = series.values().map(Vec::len).max().unwrap_or(0);
    for h in 0..hours {
        let mut row = vec![(start + Duration::hours(h as i64))
            .format("%Y-%m-%d %H:%M")
            .to_string()];
        for values in series.values() {
            row.push(values.get(h).map(|v| v.to_string()).unwrap_or_default());
        }
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Per-station summary table.
pub fn export_summaries<P: AsRef<Path>>(
    path: P,
    summaries: &[StationSummary],
) -> Result<(), ExportError> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record([
        "Station Name",
        "Technology",
        "Capacity (MW)",
        "Annual Energy (MWh)",
        "Capacity Factor",
        "Tail (km)",
        "Path (km)",
        "Line Class",
        "Line Cost ($)",
        "Substation Cost ($)",
        "Peak Loss (MW)",
        "Reachable",
    ])?;
    for s in summaries {
        writer.write_record([
            s.name.clone(),
            s.technology.clone(),
            s.capacity_mw.to_string(),
            s.annual_energy_mwh.to_string(),
            format!("{:.4}", s.capacity_factor),
            s.grid_len_km.to_string(),
            s.grid_path_len_km.to_string(),
            s.line_class.clone().unwrap_or_default(),
            s.line_cost.to_string(),
            s.substation_cost.to_string(),
            s.loss_mw.to_string(),
            if s.reachable { "yes" } else { "no" }.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Diurnal profiles, one row per (series, group) with 24 hourly means.
pub fn export_profiles<P: AsRef<Path>>(
    path: P,
    profiles: &BTreeMap<String, Vec<DiurnalProfile>>,
) -> Result<(), ExportError> {
    let mut writer = Writer::from_path(path)?;
    let mut header = vec!["Series".to_string(), "Group".to_string()];
    header.extend((0..24).map(|h| format!("{:02}:00", h)));
    writer.write_record(&header)?;

    for (name, groups) in profiles {
        for profile in groups {
            let mut row = vec![name.clone(), profile.label.clone()];
            row.extend(profile.hours.iter().map(|v| v.to_string()));
            writer.write_record(&row)?;
        }
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hourly_export_timestamps_from_january_first() {
        let mut series = BTreeMap::new();
        series.insert("Load".to_string(), vec![100.0, 110.0, 120.0]);
        series.insert("Shortfall".to_string(), vec![0.0, -10.0, -20.0]);

        let path = std::env::temp_dir().join("gridsite-hourly-test.csv");
        export_hourly(&path, "2012", &series).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "Time,Load,Shortfall");
        assert!(lines[1].starts_with("2012-01-01 00:00,100,0"));
        assert!(lines[2].starts_with("2012-01-01 01:00,110,-10"));
    }

    #[test]
    fn bad_year_is_rejected() {
        let series = BTreeMap::new();
        let path = std::env::temp_dir().join("gridsite-badyear-test.csv");
        assert!(matches!(
            export_hourly(&path, "someday", &series),
            Err(ExportError::InvalidYear(_))
        ));
    }

    #[test]
    fn profile_export_has_24_value_columns() {
        let mut profiles = BTreeMap::new();
        profiles.insert(
            "Shortfall".to_string(),
            vec![DiurnalProfile {
                label: "Summer".to_string(),
                hours: vec![1.5; 24],
            }],
        );
        let path = std::env::temp_dir().join("gridsite-profile-test.csv");
        export_profiles(&path, &profiles).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].split(',').count(), 26);
        assert_eq!(lines[1].split(',').count(), 26);
    }
}
