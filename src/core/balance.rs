use std::collections::BTreeMap;
use std::fmt;

use crate::config::constants::{round2, HOURS_PER_YEAR, MAX_SHORTFALL_ITERATIONS};
use crate::models::storage::StorageSystem;
use crate::utils::logging::StatusLog;
use crate::utils::progress::ProgressHooks;

#[derive(Debug)]
pub enum BalanceError {
    /// No series key beginning with `Load` was supplied.
    MissingLoad,
    /// More than one load series; the balance is ambiguous.
    MultipleLoad { keys: Vec<String> },
}

impl fmt::Display for BalanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceError::MissingLoad => {
                write!(f, "No load series found; one key must begin with 'Load'")
            }
            BalanceError::MultipleLoad { keys } => {
                write!(f, "Multiple load series found: {}", keys.join(", "))
            }
        }
    }
}

impl std::error::Error for BalanceError {}

/// Everything one balance run consumes. Series are keyed by station name
/// except the single load series, whose key begins with `Load`. Keys
/// beginning with `Storage`, `Excess` or `Shortfall` are residuals from an
/// earlier run and never count as generation.
#[derive(Debug, Clone, Default)]
pub struct BalanceInput {
    pub series: BTreeMap<String, Vec<f64>>,
    /// Elementwise scale per generation series; absent means 1.0.
    pub multipliers: BTreeMap<String, f64>,
    pub storage: Option<StorageSystem>,
    /// Repair short series by wrapping from hour zero instead of padding
    /// with zeros.
    pub wrap_series: bool,
}

impl BalanceInput {
    pub fn new(series: BTreeMap<String, Vec<f64>>) -> Self {
        Self {
            series,
            ..Default::default()
        }
    }
}

/// One balance pass over the year. Emitted series are rounded to 2
/// decimals; the summary totals are the unrounded accumulators.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceResult {
    pub series: BTreeMap<String, Vec<f64>>,
    pub total_load: f64,
    pub total_generation: f64,
    pub total_shortfall: f64,
    pub total_excess: f64,
    pub total_storage_used: f64,
    pub total_charge_in: f64,
    pub total_parasitic: f64,
    pub carry_initial: f64,
    pub carry_final: f64,
    /// Uniform MW added to every hour's generation by shortfall iteration.
    pub boost: f64,
    /// True when the run was cut short by cancellation.
    pub partial: bool,
}

fn is_load_key(key: &str) -> bool {
    key.starts_with("Load")
}

fn is_residual_key(key: &str) -> bool {
    key.starts_with("Storage") || key.starts_with("Excess") || key.starts_with("Shortfall")
}

/// Hourly supply/demand reconciliation with an optional single reservoir.
pub struct BalanceEngine<'a> {
    input: BalanceInput,
    hooks: ProgressHooks<'a>,
    log: StatusLog,
}

impl<'a> BalanceEngine<'a> {
    pub fn new(input: BalanceInput, hooks: ProgressHooks<'a>) -> Self {
        Self {
            input,
            hooks,
            log: StatusLog::new(),
        }
    }

    pub fn get_log(&self) -> &[String] {
        self.log.get_log()
    }

    /// Force every series to exactly one year of hours. Long series are
    /// truncated; short ones wrap from hour zero or pad with zeros. Each
    /// adjustment is reported once.
    fn repair_series(&mut self) {
        let wrap = self.input.wrap_series;
        for (name, series) in self.input.series.iter_mut() {
            let hours = series.len();
            if hours == HOURS_PER_YEAR {
                continue;
            }
            let action = if hours > HOURS_PER_YEAR {
                series.truncate(HOURS_PER_YEAR);
                "truncated"
            } else if wrap && hours > 0 {
                let mut h = 0;
                while series.len() < HOURS_PER_YEAR {
                    series.push(series[h]);
                    h += 1;
                }
                "wrapped"
            } else {
                series.resize(HOURS_PER_YEAR, 0.0);
                "padded with zeros"
            };
            self.log.push(format!(
                "Series '{}' has {} hours, expected {}; {}",
                name, hours, HOURS_PER_YEAR, action
            ));
        }
    }

    fn load_key(&self) -> Result<String, BalanceError> {
        let keys: Vec<String> = self
            .input
            .series
            .keys()
            .filter(|k| is_load_key(k))
            .cloned()
            .collect();
        match keys.len() {
            0 => Err(BalanceError::MissingLoad),
            1 => Ok(keys.into_iter().next().unwrap_or_default()),
            _ => Err(BalanceError::MultipleLoad { keys }),
        }
    }

    /// A single pass. `boost` is a uniform MW addition to every hour's
    /// generation, zero outside shortfall iteration.
    fn run_pass(&mut self, boost: f64) -> Result<BalanceResult, BalanceError> {
        self.repair_series();
        let load_key = self.load_key()?;
        let load = &self.input.series[&load_key];

        let mut generation = vec![boost; HOURS_PER_YEAR];
        for (name, series) in &self.input.series {
            if is_load_key(name) || is_residual_key(name) {
                continue;
            }
            let multiplier = self.input.multipliers.get(name).copied().unwrap_or(1.0);
            for (h, value) in series.iter().enumerate() {
                generation[h] += value * multiplier;
            }
        }

        let mut excess_series = Vec::with_capacity(HOURS_PER_YEAR);
        let mut shortfall_series = Vec::with_capacity(HOURS_PER_YEAR);
        let mut used_series = Vec::with_capacity(HOURS_PER_YEAR);
        let mut level_series = Vec::with_capacity(HOURS_PER_YEAR);

        let mut total_load = 0.0;
        let mut total_generation = 0.0;
        let mut total_shortfall = 0.0;
        let mut total_excess = 0.0;
        let mut total_storage_used = 0.0;
        let mut total_charge_in = 0.0;
        let mut total_parasitic = 0.0;

        let storage = self.input.storage.clone();
        let carry_initial = storage
            .as_ref()
            .map(|s| s.initial_level.clamp(0.0, s.capacity))
            .unwrap_or(0.0);
        let mut carry = carry_initial;

        for h in 0..HOURS_PER_YEAR {
            let raw_gap = generation[h] - load[h];
            total_load += load[h];
            total_generation += generation[h];

            let mut used = 0.0;
            let mut excess = 0.0;
            if let Some(storage) = &storage {
                total_parasitic += storage.decay(&mut carry);
                if raw_gap >= 0.0 {
                    let drawn = storage.charge(&mut carry, raw_gap);
                    total_charge_in += drawn;
                    excess = raw_gap - drawn;
                } else {
                    used = storage.discharge(&mut carry, -raw_gap);
                    total_storage_used += used;
                }
            } else {
                excess = raw_gap.max(0.0);
            }
            let shortfall = (raw_gap + used - excess).min(0.0);

            total_excess += excess;
            total_shortfall += shortfall;
            excess_series.push(round2(excess));
            shortfall_series.push(round2(shortfall));
            if storage.is_some() {
                used_series.push(round2(used));
                level_series.push(round2(carry));
            }
        }

        let mut series = BTreeMap::new();
        series.insert(
            "Generation".to_string(),
            generation.iter().map(|&g| round2(g)).collect(),
        );
        series.insert("Excess".to_string(), excess_series);
        series.insert("Shortfall".to_string(), shortfall_series);
        if storage.is_some() {
            series.insert("Storage Used".to_string(), used_series);
            series.insert("Storage Level".to_string(), level_series);
        }

        Ok(BalanceResult {
            series,
            total_load,
            total_generation,
            total_shortfall,
            total_excess,
            total_storage_used,
            total_charge_in,
            total_parasitic,
            carry_initial,
            carry_final: carry,
            boost,
            partial: false,
        })
    }

    pub fn run(&mut self) -> Result<BalanceResult, BalanceError> {
        self.hooks.report(0, 1);
        let result = self.run_pass(0.0);
        self.hooks.report(1, 1);
        result
    }

    /// Re-solve with a uniform generation boost grown each pass by the
    /// negative mean of the latest shortfall series. Stops early once the
    /// shortfall clears or the caller cancels; every pass's result is
    /// reported and the station series are never altered.
    pub fn run_shortfall_iterations(&mut self) -> Result<Vec<BalanceResult>, BalanceError> {
        let mut results = Vec::new();
        let mut boost = 0.0;

        for pass in 0..MAX_SHORTFALL_ITERATIONS {
            self.hooks.report(pass, MAX_SHORTFALL_ITERATIONS);
            let mut result = self.run_pass(boost)?;
            if self.hooks.cancelled() {
                result.partial = true;
                results.push(result);
                return Ok(results);
            }
            let mean_shortfall = result.total_shortfall / HOURS_PER_YEAR as f64;
            let cleared = result.total_shortfall >= 0.0;
            results.push(result);
            if cleared {
                break;
            }
            boost += -mean_shortfall;
        }
        self.hooks
            .report(MAX_SHORTFALL_ITERATIONS, MAX_SHORTFALL_ITERATIONS);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_input(load_mw: f64, generation_mw: f64) -> BalanceInput {
        let mut series = BTreeMap::new();
        series.insert("Load".to_string(), vec![load_mw; HOURS_PER_YEAR]);
        series.insert(
            "Flat Plant".to_string(),
            vec![generation_mw; HOURS_PER_YEAR],
        );
        BalanceInput::new(series)
    }

    fn alternating_input() -> BalanceInput {
        let mut series = BTreeMap::new();
        series.insert("Load".to_string(), vec![100.0; HOURS_PER_YEAR]);
        let generation: Vec<f64> = (0..HOURS_PER_YEAR)
            .map(|h| if h % 2 == 0 { 150.0 } else { 50.0 })
            .collect();
        series.insert("Swing Plant".to_string(), generation);
        BalanceInput::new(series)
    }

    #[test]
    fn constant_deficit_without_storage() {
        let mut engine = BalanceEngine::new(flat_input(100.0, 80.0), ProgressHooks::none());
        let result = engine.run().unwrap();

        assert_eq!(result.series["Shortfall"][0], -20.0);
        assert_eq!(result.series["Shortfall"][8759], -20.0);
        assert_eq!(result.series["Excess"][0], 0.0);
        assert!((result.total_shortfall - -175_200.0).abs() < 1e-6);
        assert!((result.total_load - 876_000.0).abs() < 1e-6);
        assert!(!result.series.contains_key("Storage Level"));
    }

    #[test]
    fn alternating_surplus_charges_and_discharges() {
        let mut input = alternating_input();
        input.storage = Some(StorageSystem::new(200.0, 0.0, 100.0, 0.9, 100.0, 0.9, 0.0));
        let mut engine = BalanceEngine::new(input, ProgressHooks::none());
        let result = engine.run().unwrap();

        // Hour 0: surplus 50 charges at 0.9 efficiency
        assert_eq!(result.series["Excess"][0], 0.0);
        assert_eq!(result.series["Storage Level"][0], 45.0);
        // Hour 1: 45 MWh discharges, delivering 40.5 against the 50 gap
        assert_eq!(result.series["Storage Used"][1], 40.5);
        assert_eq!(result.series["Storage Level"][1], 0.0);
        assert_eq!(result.series["Shortfall"][1], -9.5);
        // Steady state repeats every two hours
        assert_eq!(result.series["Shortfall"][101], -9.5);
        assert_eq!(result.series["Shortfall"][100], 0.0);
        assert!((result.total_shortfall - -9.5 * 4380.0).abs() < 1e-6);
    }

    #[test]
    fn load_balances_against_used_generation_and_shortfall() {
        let mut input = alternating_input();
        input.storage = Some(StorageSystem::new(200.0, 0.0, 100.0, 0.9, 100.0, 0.9, 0.0));
        let mut engine = BalanceEngine::new(input, ProgressHooks::none());
        let result = engine.run().unwrap();

        // Over the year: load = generation actually used + unmet load
        let generation = &result.series["Generation"];
        let used = &result.series["Storage Used"];
        let shortfall = &result.series["Shortfall"];
        let mut used_generation = 0.0;
        let mut unmet = 0.0;
        for h in 0..HOURS_PER_YEAR {
            used_generation += (generation[h] + used[h]).min(100.0);
            unmet += -shortfall[h];
        }
        assert!((result.total_load - (used_generation + unmet)).abs() < 1e-6);
    }

    #[test]
    fn storage_conservation_holds() {
        let mut input = alternating_input();
        let storage = StorageSystem::new(300.0, 120.0, 80.0, 0.85, 90.0, 0.92, 0.01);
        input.storage = Some(storage.clone());
        let mut engine = BalanceEngine::new(input, ProgressHooks::none());
        let result = engine.run().unwrap();

        let balance = result.total_charge_in * storage.recharge_eff
            - result.total_storage_used / storage.discharge_eff
            - result.total_parasitic
            - (result.carry_final - result.carry_initial);
        assert!(balance.abs() < 1e-6 * storage.capacity);
    }

    #[test]
    fn carry_stays_within_reservoir_bounds() {
        let mut input = alternating_input();
        input.storage = Some(StorageSystem::new(60.0, 50.0, 100.0, 0.9, 100.0, 0.9, 0.02));
        let mut engine = BalanceEngine::new(input, ProgressHooks::none());
        let result = engine.run().unwrap();

        for &level in &result.series["Storage Level"] {
            assert!((0.0..=60.0).contains(&level));
        }
    }

    #[test]
    fn multipliers_scale_generation_elementwise() {
        let mut input = flat_input(100.0, 80.0);
        input.multipliers.insert("Flat Plant".to_string(), 1.25);
        let mut engine = BalanceEngine::new(input, ProgressHooks::none());
        let result = engine.run().unwrap();

        assert_eq!(result.series["Generation"][0], 100.0);
        assert_eq!(result.total_shortfall, 0.0);
    }

    #[test]
    fn identical_inputs_give_identical_outputs() {
        let mut first = BalanceEngine::new(alternating_input(), ProgressHooks::none());
        let mut second = BalanceEngine::new(alternating_input(), ProgressHooks::none());
        assert_eq!(first.run().unwrap(), second.run().unwrap());
    }

    #[test]
    fn missing_load_is_an_error() {
        let mut series = BTreeMap::new();
        series.insert("Plant".to_string(), vec![1.0; HOURS_PER_YEAR]);
        let mut engine = BalanceEngine::new(BalanceInput::new(series), ProgressHooks::none());
        assert!(matches!(engine.run(), Err(BalanceError::MissingLoad)));
    }

    #[test]
    fn residual_keys_are_not_generation() {
        let mut input = flat_input(100.0, 80.0);
        input
            .series
            .insert("Excess".to_string(), vec![500.0; HOURS_PER_YEAR]);
        input
            .series
            .insert("Storage Used".to_string(), vec![500.0; HOURS_PER_YEAR]);
        let mut engine = BalanceEngine::new(input, ProgressHooks::none());
        let result = engine.run().unwrap();
        assert_eq!(result.series["Generation"][0], 80.0);
    }

    #[test]
    fn short_series_pads_or_wraps() {
        let mut series = BTreeMap::new();
        series.insert("Load".to_string(), vec![10.0; HOURS_PER_YEAR]);
        series.insert("Short Plant".to_string(), vec![1.0, 2.0]);
        let mut input = BalanceInput::new(series.clone());
        let mut engine = BalanceEngine::new(input, ProgressHooks::none());
        let result = engine.run().unwrap();
        // Padded with zeros past hour 1
        assert_eq!(result.series["Generation"][2], 0.0);
        assert!(!engine.get_log().is_empty());

        input = BalanceInput::new(series);
        input.wrap_series = true;
        let mut engine = BalanceEngine::new(input, ProgressHooks::none());
        let result = engine.run().unwrap();
        // Wrapped: 1, 2, 1, 2, ...
        assert_eq!(result.series["Generation"][2], 1.0);
        assert_eq!(result.series["Generation"][3], 2.0);
    }

    #[test]
    fn shortfall_iterations_boost_until_clear() {
        let mut engine = BalanceEngine::new(flat_input(100.0, 80.0), ProgressHooks::none());
        let results = engine.run_shortfall_iterations().unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].boost, 0.0);
        assert!((results[0].total_shortfall - -175_200.0).abs() < 1e-6);
        // Second pass adds the 20 MW mean shortfall and clears it
        assert!((results[1].boost - 20.0).abs() < 1e-9);
        assert_eq!(results[1].total_shortfall, 0.0);
    }

    #[test]
    fn cancellation_marks_partial_result() {
        let cancel = || true;
        let hooks = ProgressHooks {
            progress: None,
            cancel: Some(&cancel),
        };
        let mut engine = BalanceEngine::new(flat_input(100.0, 80.0), hooks);
        let results = engine.run_shortfall_iterations().unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].partial);
    }
}
