use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::config::expression::{parse_cost_table, parse_price_list, CostRow};
use crate::core::geodesy::Coordinate;
use crate::models::station::{LoadCentre, Technology};
use crate::models::storage::StorageSystem;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError { line: usize, message: String },
    InvalidValue { key: String, message: String },
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError { line, message } => {
                write!(f, "Config parse error at line {}: {}", line, message)
            }
            ConfigError::InvalidValue { key, message } => {
                write!(f, "Invalid value for '{}': {}", key, message)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Resolved run options. Built once by `Config::load` and handed to every
/// component explicitly; nothing in the core reads configuration globally.
#[derive(Debug, Clone)]
pub struct Config {
    pub year: String,
    pub upper_left: Option<Coordinate>,
    pub lower_right: Option<Coordinate>,
    pub projection: String,
    /// Map bounding ring derived from the corner pair; empty = unbounded.
    pub map_polygon: Vec<Coordinate>,
    pub substation_costs: HashMap<String, f64>,
    /// Single-circuit table: all requested capacity non-dispatchable.
    pub s_lines: Vec<CostRow>,
    /// Double-circuit / dispatchable table.
    pub d_lines: Vec<CostRow>,
    pub dispatchable: Vec<Technology>,
    /// Fraction per km per MW transmitted.
    pub line_loss: f64,
    pub load_centres: Vec<LoadCentre>,
    pub trace_existing: bool,
    /// Opt-in planar point-to-segment fallback.
    pub dummy_fix: bool,
    /// Short hourly series wrap from their own start instead of padding
    /// with zeros.
    pub wrap_series: bool,
    pub storage: Option<StorageSystem>,
    pub seasons: Vec<(String, Vec<u32>)>,
    pub periods: Vec<(String, Vec<u32>)>,
    pub technologies: Vec<Technology>,
    pub fossil_technologies: Vec<Technology>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            year: "2012".to_string(),
            upper_left: None,
            lower_right: None,
            projection: String::new(),
            map_polygon: Vec::new(),
            substation_costs: HashMap::new(),
            s_lines: Vec::new(),
            d_lines: Vec::new(),
            dispatchable: vec![
                Technology::Biomass,
                Technology::Geothermal,
                Technology::PumpedHydro,
            ],
            line_loss: crate::config::constants::DEFAULT_LINE_LOSS,
            load_centres: Vec::new(),
            trace_existing: false,
            dummy_fix: false,
            wrap_series: false,
            storage: None,
            seasons: Vec::new(),
            periods: Vec::new(),
            technologies: Vec::new(),
            fossil_technologies: Vec::new(),
        }
    }
}

impl Config {
    /// Fossil stations are schedulable whatever the configured list says;
    /// the list only needs to name the renewable dispatchables.
    pub fn is_dispatchable(&self, technology: &Technology) -> bool {
        technology.is_fossil() || self.dispatchable.contains(technology)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse sectioned `key=value` text. Unknown keys are ignored so a
    /// config file shared with outer tooling still loads.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current = String::new();

        for (idx, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                current = name.trim().to_string();
                continue;
            }
            let (key, value) = line.split_once('=').ok_or(ConfigError::ParseError {
                line: idx + 1,
                message: format!("expected key=value, got '{}'", line),
            })?;
            sections
                .entry(current.clone())
                .or_default()
                .insert(key.trim().to_string(), value.trim().to_string());
        }

        Self::resolve(&sections)
    }

    fn resolve(
        sections: &HashMap<String, HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        let get = |section: &str, key: &str| -> Option<&String> {
            sections.get(section).and_then(|s| s.get(key))
        };

        if let Some(year) = get("Base", "year") {
            config.year = year.clone();
        }

        if let Some(text) = get("Map", "upper_left") {
            config.upper_left = Some(parse_coordinate("upper_left", text)?);
        }
        if let Some(text) = get("Map", "lower_right") {
            config.lower_right = Some(parse_coordinate("lower_right", text)?);
        }
        if let Some(projection) = get("Map", "projection") {
            config.projection = projection.clone();
        }
        if let (Some(ul), Some(lr)) = (config.upper_left, config.lower_right) {
            config.map_polygon = vec![
                ul,
                Coordinate::new(ul.lat, lr.lon),
                lr,
                Coordinate::new(lr.lat, ul.lon),
            ];
        }

        let line_prices = match get("Grid", "line_costs") {
            Some(text) => parse_price_list(text).map_err(|e| ConfigError::InvalidValue {
                key: "line_costs".to_string(),
                message: e.to_string(),
            })?,
            None => HashMap::new(),
        };
        if let Some(text) = get("Grid", "substation_costs") {
            config.substation_costs =
                parse_price_list(text).map_err(|e| ConfigError::InvalidValue {
                    key: "substation_costs".to_string(),
                    message: e.to_string(),
                })?;
        }
        if let Some(text) = get("Grid", "s_lines") {
            config.s_lines =
                parse_cost_table(text, &line_prices).map_err(|e| ConfigError::InvalidValue {
                    key: "s_lines".to_string(),
                    message: e.to_string(),
                })?;
        }
        if let Some(text) = get("Grid", "d_lines") {
            config.d_lines =
                parse_cost_table(text, &line_prices).map_err(|e| ConfigError::InvalidValue {
                    key: "d_lines".to_string(),
                    message: e.to_string(),
                })?;
        }
        if let Some(text) = get("Grid", "dispatchable") {
            config.dispatchable = parse_technology_words(text)?;
        }
        if let Some(text) = get("Grid", "line_loss") {
            config.line_loss = parse_line_loss(text)?;
        }
        if let Some(text) = get("Grid", "load_centre") {
            config.load_centres = parse_load_centres(text)?;
        }
        if let Some(text) = get("Grid", "trace_existing") {
            config.trace_existing = parse_bool("trace_existing", text)?;
        }
        if let Some(text) = get("Grid", "dummy_fix") {
            config.dummy_fix = parse_bool("dummy_fix", text)?;
        }

        if let Some(text) = get("Power", "wrap_series") {
            config.wrap_series = parse_bool("wrap_series", text)?;
        }
        if let Some(text) = get("Power", "technologies") {
            config.technologies = parse_technology_list(text)?;
        }
        if let Some(text) = get("Power", "fossil_technologies") {
            config.fossil_technologies = parse_technology_list(text)?;
        }
        if let Some(section) = sections.get("Power") {
            config.seasons = parse_month_groups(section, "season")?;
            config.periods = parse_month_groups(section, "period")?;
        }

        if let Some(section) = sections.get("Storage") {
            config.storage = parse_storage(section)?;
        }

        Ok(config)
    }
}

fn parse_coordinate(key: &str, text: &str) -> Result<Coordinate, ConfigError> {
    let (lat, lon) = text.split_once(',').ok_or_else(|| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected 'lat, lon', got '{}'", text),
    })?;
    let parse = |part: &str| -> Result<f64, ConfigError> {
        part.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}' is not a number", part.trim()),
        })
    };
    Ok(Coordinate::new(parse(lat)?, parse(lon)?))
}

pub fn parse_bool(key: &str, text: &str) -> Result<bool, ConfigError> {
    match text.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}' is not a boolean", other),
        }),
    }
}

/// Numbers accept K (x10^3) and M (x10^6) suffixes.
pub fn parse_scaled(key: &str, text: &str) -> Result<f64, ConfigError> {
    let text = text.trim();
    let (digits, scale) = match text.chars().last() {
        Some('K') | Some('k') => (&text[..text.len() - 1], 1e3),
        Some('M') | Some('m') => (&text[..text.len() - 1], 1e6),
        _ => (text, 1.0),
    };
    digits
        .trim()
        .parse::<f64>()
        .map(|v| v * scale)
        .map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}' is not a number", text),
        })
}

/// `x%` and a bare `x` both mean x/1000; the suffix only marks intent in
/// the file.
fn parse_line_loss(text: &str) -> Result<f64, ConfigError> {
    let text = text.trim();
    let digits = text.strip_suffix('%').unwrap_or(text);
    let value: f64 = digits.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: "line_loss".to_string(),
        message: format!("'{}' is not a number", text),
    })?;
    Ok(value / 1000.0)
}

fn parse_load_centres(text: &str) -> Result<Vec<LoadCentre>, ConfigError> {
    let mut centres = Vec::new();
    for group in text.split(')') {
        let group = group.trim().trim_start_matches(',').trim();
        let Some(body) = group.strip_prefix('(') else {
            continue;
        };
        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(ConfigError::InvalidValue {
                key: "load_centre".to_string(),
                message: format!("expected '(name, lat, lon)', got '({})'", body),
            });
        }
        let lat: f64 = parts[1].parse().map_err(|_| ConfigError::InvalidValue {
            key: "load_centre".to_string(),
            message: format!("'{}' is not a latitude", parts[1]),
        })?;
        let lon: f64 = parts[2].parse().map_err(|_| ConfigError::InvalidValue {
            key: "load_centre".to_string(),
            message: format!("'{}' is not a longitude", parts[2]),
        })?;
        centres.push(LoadCentre::new(parts[0].to_string(), Coordinate::new(lat, lon)));
    }
    Ok(centres)
}

/// Whitespace-separated tags; underscores stand in for spaces inside a tag
/// (`Pumped_Hydro`).
fn parse_technology_words(text: &str) -> Result<Vec<Technology>, ConfigError> {
    text.split_whitespace()
        .map(|word| {
            let name = word.replace('_', " ");
            Technology::from_str(&name).map_err(|message| ConfigError::InvalidValue {
                key: "dispatchable".to_string(),
                message,
            })
        })
        .collect()
}

fn parse_technology_list(text: &str) -> Result<Vec<Technology>, ConfigError> {
    text.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|name| {
            Technology::from_str(name).map_err(|message| ConfigError::InvalidValue {
                key: "technologies".to_string(),
                message,
            })
        })
        .collect()
}

/// `season1 = Summer,12,1,2` style month groupings, numbered from 1.
fn parse_month_groups(
    section: &HashMap<String, String>,
    prefix: &str,
) -> Result<Vec<(String, Vec<u32>)>, ConfigError> {
    let mut groups = Vec::new();
    for n in 1.. {
        let key = format!("{}{}", prefix, n);
        let Some(text) = section.get(&key) else {
            break;
        };
        let mut parts = text.split(',').map(str::trim);
        let label = parts
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| ConfigError::InvalidValue {
                key: key.clone(),
                message: "missing label".to_string(),
            })?
            .to_string();
        let months: Result<Vec<u32>, ConfigError> = parts
            .map(|m| {
                m.parse::<u32>()
                    .ok()
                    .filter(|m| (1..=12).contains(m))
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: key.clone(),
                        message: format!("'{}' is not a month", m),
                    })
            })
            .collect();
        groups.push((label, months?));
    }
    Ok(groups)
}

fn parse_storage(section: &HashMap<String, String>) -> Result<Option<StorageSystem>, ConfigError> {
    let Some(text) = section.get("storage") else {
        return Ok(None);
    };
    let mut parts = text.split(',').map(str::trim);
    let capacity = parse_scaled("storage", parts.next().unwrap_or_default())?;
    let initial = match parts.next() {
        Some(level) => parse_scaled("storage", level)?,
        None => 0.0,
    };
    if capacity <= 0.0 {
        return Ok(None);
    }

    let number = |key: &str, default: f64| -> Result<f64, ConfigError> {
        match section.get(key) {
            Some(text) => parse_scaled(key, text),
            None => Ok(default),
        }
    };

    Ok(Some(StorageSystem::new(
        capacity,
        initial,
        number("recharge_max", capacity)?,
        number(
            "recharge_eff",
            crate::config::constants::DEFAULT_RECHARGE_EFFICIENCY,
        )?,
        number("discharge_max", capacity)?,
        number(
            "discharge_eff",
            crate::config::constants::DEFAULT_DISCHARGE_EFFICIENCY,
        )?,
        number("parasitic", 0.0)?,
    )))
}
