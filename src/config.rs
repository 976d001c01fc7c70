use crate::error::{ReportError, Result};
use crate::types::TextColumn;
use chrono::NaiveDate;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CONFIG_ENV: &str = "CNC_REPORT_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "cnc_report.toml";

/// Static settings read once at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub records_path: PathBuf,
    pub page_size: usize,
    pub business_lines: Vec<String>,
    /// Column the monthly filter matches business lines against.
    pub line_column: TextColumn,
    /// Column/value pair the aggregator keeps (progress reports only).
    pub progress_column: TextColumn,
    pub progress_value: String,
    /// First month with data, `dd/mm/yyyy`.
    pub tracking_start: String,
    pub default_budget: f64,
    pub default_reference_cost: f64,
    pub default_breakpoints: String,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            records_path: PathBuf::from("mecanizado_close.jsonl"),
            page_size: 100,
            business_lines: vec!["sabimet".to_string(), "steelk".to_string()],
            line_column: TextColumn::Negocio,
            progress_column: TextColumn::Origen,
            progress_value: "Progreso".to_string(),
            tracking_start: "01/08/2024".to_string(),
            default_budget: 15_000_000.0,
            default_reference_cost: 160.0,
            default_breakpoints: "12, 32".to_string(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl Settings {
    /// Load from `$CNC_REPORT_CONFIG`, else `cnc_report.toml`, else defaults.
    pub fn load() -> Result<Self> {
        match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)
            }
            Err(_) => {
                info!("no config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let settings = Self::from_toml(&text)?;
        info!(path = %path.as_ref().display(), "loaded config");
        Ok(settings)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.business_lines.is_empty() {
            return Err(ReportError::InvalidConfig("business_lines is empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(ReportError::InvalidConfig("page_size must be positive".to_string()));
        }
        self.tracking_start_date()?;
        check_amount("default_budget", self.default_budget)
            .and_then(|_| check_amount("default_reference_cost", self.default_reference_cost))
            .map_err(|e| ReportError::InvalidConfig(e.to_string()))?;
        parse_breakpoints(&self.default_breakpoints)
            .map_err(|e| ReportError::InvalidConfig(format!("default_breakpoints: {}", e)))?;
        Ok(())
    }

    pub fn tracking_start_date(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(self.tracking_start.trim(), "%d/%m/%Y").map_err(|e| {
            ReportError::InvalidConfig(format!("tracking_start `{}`: {}", self.tracking_start, e))
        })
    }
}

/// What the user picked for one report run.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub year: i32,
    pub month: u32,
    pub budget: f64,
    pub reference_cost: f64,
    pub breakpoints: Vec<i64>,
}

impl Selection {
    pub fn new(
        year: i32,
        month: u32,
        budget: f64,
        reference_cost: f64,
        breakpoints: Vec<i64>,
    ) -> Result<Self> {
        let s = Self {
            year,
            month,
            budget,
            reference_cost,
            breakpoints,
        };
        s.validate()?;
        Ok(s)
    }

    /// Defaults from `settings` for the given period.
    pub fn defaults(settings: &Settings, year: i32, month: u32) -> Result<Self> {
        Self::new(
            year,
            month,
            settings.default_budget,
            settings.default_reference_cost,
            parse_breakpoints(&settings.default_breakpoints)?,
        )
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.month) {
            return Err(ReportError::InvalidSelection(format!(
                "month {} is not in 1..=12",
                self.month
            )));
        }
        check_amount("budget", self.budget)?;
        check_amount("reference cost", self.reference_cost)?;
        if self.breakpoints.is_empty() {
            return Err(ReportError::EmptyBreakpoints);
        }
        Ok(())
    }
}

fn check_amount(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ReportError::InvalidSelection(format!(
            "{} must be a non-negative number, got {}",
            name, value
        )));
    }
    Ok(())
}

/// Parse comma-separated integer breakpoints, e.g. `"15, 20, 30"`.
pub fn parse_breakpoints(input: &str) -> Result<Vec<i64>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(ReportError::EmptyBreakpoints);
    }
    input
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<i64>().map_err(|_| {
                ReportError::InvalidBreakpoint(format!("`{}` is not an integer", part))
            })
        })
        .collect()
}
