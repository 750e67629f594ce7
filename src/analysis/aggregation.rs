use std::collections::BTreeMap;

use crate::config::constants::{round2, HOURS_PER_DAY, MONTH_START_DAY};

/// Calendar month (1..=12) containing an hour index of a non-leap year.
pub fn month_of_hour(hour: usize) -> u32 {
    let day = (hour / HOURS_PER_DAY) as u32;
    MONTH_START_DAY
        .iter()
        .rposition(|&start| start <= day)
        .map(|idx| idx as u32 + 1)
        .unwrap_or(1)
}

/// Mean value per hour-of-day over the months in one labelled group.
#[derive(Debug, Clone, PartialEq)]
pub struct DiurnalProfile {
    pub label: String,
    /// 24 means, rounded to 2 decimals. All zeros when the group matched
    /// no hours.
    pub hours: Vec<f64>,
}

/// Reduce one hourly series to a diurnal profile per month group. Groups
/// come straight from the `season`/`period` configuration; overlapping
/// groups each see the shared hours.
pub fn diurnal_profiles(values: &[f64], groups: &[(String, Vec<u32>)]) -> Vec<DiurnalProfile> {
    groups
        .iter()
        .map(|(label, months)| {
            let mut sums = vec![0.0; HOURS_PER_DAY];
            let mut counts = vec![0usize; HOURS_PER_DAY];
            for (hour, value) in values.iter().enumerate() {
                if !months.contains(&month_of_hour(hour)) {
                    continue;
                }
                let slot = hour % HOURS_PER_DAY;
                sums[slot] += value;
                counts[slot] += 1;
            }
            let hours = sums
                .iter()
                .zip(&counts)
                .map(|(&sum, &count)| {
                    if count == 0 {
                        0.0
                    } else {
                        round2(sum / count as f64)
                    }
                })
                .collect();
            DiurnalProfile {
                label: label.clone(),
                hours,
            }
        })
        .collect()
}

/// Diurnal profiles for every series, keyed by series name.
pub fn aggregate_series(
    series: &BTreeMap<String, Vec<f64>>,
    groups: &[(String, Vec<u32>)],
) -> BTreeMap<String, Vec<DiurnalProfile>> {
    series
        .iter()
        .map(|(name, values)| (name.clone(), diurnal_profiles(values, groups)))
        .collect()
}

/// Sum of an hourly series per calendar month, rounded to 2 decimals.
pub fn monthly_totals(values: &[f64]) -> Vec<f64> {
    let mut totals = vec![0.0; 12];
    for (hour, value) in values.iter().enumerate() {
        totals[(month_of_hour(hour) - 1) as usize] += value;
    }
    totals.into_iter().map(round2).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::constants::HOURS_PER_YEAR;

    #[test]
    fn month_boundaries() {
        assert_eq!(month_of_hour(0), 1);
        assert_eq!(month_of_hour(743), 1); // 23:00 on 31 January
        assert_eq!(month_of_hour(744), 2);
        assert_eq!(month_of_hour(1416), 3); // 59 days in
        assert_eq!(month_of_hour(8759), 12);
    }

    #[test]
    fn diurnal_means_recover_hour_of_day() {
        // Every hour carries its hour-of-day, so the mean is exact
        let values: Vec<f64> = (0..HOURS_PER_YEAR).map(|h| (h % 24) as f64).collect();
        let groups = vec![
            ("Summer".to_string(), vec![12, 1, 2]),
            ("Winter".to_string(), vec![6, 7, 8]),
        ];
        let profiles = diurnal_profiles(&values, &groups);
        assert_eq!(profiles.len(), 2);
        for profile in &profiles {
            assert_eq!(profile.hours.len(), 24);
            for (slot, &mean) in profile.hours.iter().enumerate() {
                assert_eq!(mean, slot as f64);
            }
        }
    }

    #[test]
    fn empty_group_yields_zeros() {
        let values = vec![5.0; HOURS_PER_YEAR];
        let groups = vec![("None".to_string(), Vec::new())];
        let profiles = diurnal_profiles(&values, &groups);
        assert!(profiles[0].hours.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn monthly_totals_split_by_calendar() {
        let values = vec![1.0; HOURS_PER_YEAR];
        let totals = monthly_totals(&values);
        assert_eq!(totals[0], 744.0); // 31 days
        assert_eq!(totals[1], 672.0); // 28 days
        assert_eq!(totals[3], 720.0); // 30 days
        let year: f64 = totals.iter().sum();
        assert_eq!(year, HOURS_PER_YEAR as f64);
    }
}
