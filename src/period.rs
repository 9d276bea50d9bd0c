//! Period generation.
//!
//! A [`PeriodConfig`] (time unit, horizon length, offset) and a "today" date
//! produce an ordered list of contiguous, non-overlapping half-open periods
//! `[start_date, end_date)`. Period 0 is the bucket containing today; the
//! offset slides the whole horizon into the past or the future.

use crate::error::{Result, TreasuryError};
use crate::utils::{
    checked_date_from_month_index, checked_shift_months, first_of_month, month_index,
    short_month_name, shift_months, start_of_fortnight, start_of_week,
};
use chrono::{Datelike, Duration, NaiveDate};
use log::debug;
use schemars::JsonSchema;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeUnit {
    Day,
    Week,
    Fortnightly,
    Month,
    Bimonthly,
    Quarterly,
    Semiannually,
    Annually,
}

impl TimeUnit {
    pub const ALL: [TimeUnit; 8] = [
        TimeUnit::Day,
        TimeUnit::Week,
        TimeUnit::Fortnightly,
        TimeUnit::Month,
        TimeUnit::Bimonthly,
        TimeUnit::Quarterly,
        TimeUnit::Semiannually,
        TimeUnit::Annually,
    ];

    /// Width in months for the month-aligned units.
    fn months(self) -> Option<u32> {
        match self {
            TimeUnit::Month => Some(1),
            TimeUnit::Bimonthly => Some(2),
            TimeUnit::Quarterly => Some(3),
            TimeUnit::Semiannually => Some(6),
            TimeUnit::Annually => Some(12),
            TimeUnit::Day | TimeUnit::Week | TimeUnit::Fortnightly => None,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Fortnightly => "fortnight",
            TimeUnit::Month => "month",
            TimeUnit::Bimonthly => "bimester",
            TimeUnit::Quarterly => "quarter",
            TimeUnit::Semiannually => "semester",
            TimeUnit::Annually => "year",
        }
    }

    /// Start of the bucket of this unit that contains `today`.
    pub fn truncate(self, today: NaiveDate) -> NaiveDate {
        match self {
            TimeUnit::Day => today,
            TimeUnit::Week => start_of_week(today),
            TimeUnit::Fortnightly => start_of_fortnight(today),
            TimeUnit::Annually => first_of_month(today.year(), 1),
            unit => {
                let width = unit.months().unwrap_or(1);
                let start_month0 = (today.month0() / width) * width;
                first_of_month(today.year(), start_month0 + 1)
            }
        }
    }

    /// Moves a bucket start by `steps` buckets of this unit. `None` when the
    /// result falls outside the supported calendar.
    pub fn advance(self, start: NaiveDate, steps: i64) -> Option<NaiveDate> {
        match self {
            TimeUnit::Day => start.checked_add_signed(Duration::try_days(steps)?),
            TimeUnit::Week => start.checked_add_signed(Duration::try_days(steps.checked_mul(7)?)?),
            TimeUnit::Fortnightly => {
                let half = if start.day() >= 16 { 1 } else { 0 };
                let target = (month_index(start.year(), start.month()) * 2 + half).checked_add(steps)?;
                let day = if target.rem_euclid(2) == 0 { 1 } else { 16 };
                checked_date_from_month_index(target.div_euclid(2), day)
            }
            unit => checked_shift_months(start, steps.checked_mul(unit.months().unwrap_or(1) as i64)?),
        }
    }

    pub fn label(self, start: NaiveDate) -> String {
        let year = start.year().rem_euclid(100);
        match self {
            TimeUnit::Day => format!("{:02} {}", start.day(), short_month_name(start.month())),
            TimeUnit::Week => format!("W {:02}/{:02}", start.day(), start.month()),
            TimeUnit::Fortnightly => {
                let half = if start.day() == 1 { 1 } else { 2 };
                format!("{}H-{} '{:02}", half, short_month_name(start.month()), year)
            }
            TimeUnit::Month => format!("{} '{:02}", short_month_name(start.month()), year),
            TimeUnit::Bimonthly => format!(
                "{}-{}",
                short_month_name(start.month()),
                short_month_name(start.month() % 12 + 1)
            ),
            TimeUnit::Quarterly => format!("Q{} '{:02}", start.month0() / 3 + 1, year),
            TimeUnit::Semiannually => format!("H{} '{:02}", start.month0() / 6 + 1, year),
            TimeUnit::Annually => start.year().to_string(),
        }
    }
}

impl FromStr for TimeUnit {
    type Err = TreasuryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "day" => Ok(TimeUnit::Day),
            "week" => Ok(TimeUnit::Week),
            "fortnightly" => Ok(TimeUnit::Fortnightly),
            "month" => Ok(TimeUnit::Month),
            "bimonthly" => Ok(TimeUnit::Bimonthly),
            "quarterly" => Ok(TimeUnit::Quarterly),
            "semiannually" => Ok(TimeUnit::Semiannually),
            "annually" => Ok(TimeUnit::Annually),
            _ => Err(TreasuryError::UnknownTimeUnit(s.to_string())),
        }
    }
}

impl fmt::Display for TimeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TimeUnit::Day => "day",
            TimeUnit::Week => "week",
            TimeUnit::Fortnightly => "fortnightly",
            TimeUnit::Month => "month",
            TimeUnit::Bimonthly => "bimonthly",
            TimeUnit::Quarterly => "quarterly",
            TimeUnit::Semiannually => "semiannually",
            TimeUnit::Annually => "annually",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Period {
    pub label: String,
    pub start_date: NaiveDate,
    /// Exclusive.
    pub end_date: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date < self.end_date
    }

    pub fn num_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days()
    }
}

/// Horizon settings. Deserialization goes through [`PeriodConfig::parse`],
/// so unknown units and negative horizons are rejected on load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub struct PeriodConfig {
    pub time_unit: TimeUnit,
    #[serde(default = "default_horizon_length")]
    pub horizon_length: i64,
    #[serde(default)]
    pub period_offset: i64,
}

fn default_horizon_length() -> i64 {
    6
}

/// The stored shape of a [`PeriodConfig`], before the unit is parsed.
#[derive(Deserialize)]
struct PeriodConfigRecord {
    time_unit: String,
    #[serde(default = "default_horizon_length")]
    horizon_length: i64,
    #[serde(default)]
    period_offset: i64,
}

impl TryFrom<PeriodConfigRecord> for PeriodConfig {
    type Error = TreasuryError;

    fn try_from(record: PeriodConfigRecord) -> Result<Self> {
        Self::parse(&record.time_unit, record.horizon_length, record.period_offset)
    }
}

impl<'de> Deserialize<'de> for PeriodConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let record = PeriodConfigRecord::deserialize(deserializer)?;
        Self::try_from(record).map_err(de::Error::custom)
    }
}

impl Default for PeriodConfig {
    fn default() -> Self {
        Self {
            time_unit: TimeUnit::Month,
            horizon_length: default_horizon_length(),
            period_offset: 0,
        }
    }
}

impl PeriodConfig {
    pub fn new(time_unit: TimeUnit, horizon_length: i64, period_offset: i64) -> Self {
        Self {
            time_unit,
            horizon_length,
            period_offset,
        }
    }

    /// Loads a configuration, reporting a bad unit or horizon as the
    /// matching configuration error rather than a serialization error.
    pub fn from_json(json: &str) -> Result<Self> {
        let record: PeriodConfigRecord = serde_json::from_str(json)?;
        Self::try_from(record)
    }

    /// Builds a configuration from an untyped time unit name, rejecting
    /// unknown units and negative horizons before any period is produced.
    pub fn parse(time_unit: &str, horizon_length: i64, period_offset: i64) -> Result<Self> {
        let config = Self::new(time_unit.parse()?, horizon_length, period_offset);
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon_length < 0 {
            return Err(TreasuryError::NegativeHorizon(self.horizon_length));
        }
        Ok(())
    }

    pub fn shifted(&self, direction: i64) -> Self {
        Self {
            period_offset: self.period_offset.saturating_add(direction),
            ..*self
        }
    }

    /// Short navigation caption: "Current", "+2 months", "-1 week".
    pub fn offset_label(&self) -> String {
        if self.period_offset == 0 {
            return "Current".to_string();
        }
        let plural = if self.period_offset.unsigned_abs() > 1 { "s" } else { "" };
        format!(
            "{:+} {}{}",
            self.period_offset,
            self.time_unit.noun(),
            plural
        )
    }
}

pub fn generate_periods(config: &PeriodConfig, today: NaiveDate) -> Result<Vec<Period>> {
    config.validate()?;

    let unit = config.time_unit;
    let base_date = unit.truncate(today);

    let out_of_range = || TreasuryError::HorizonOutOfRange {
        unit: unit.to_string(),
        offset: config.period_offset,
    };

    let periods = (0..config.horizon_length)
        .map(|i| -> Result<Period> {
            let steps = i.checked_add(config.period_offset).ok_or_else(out_of_range)?;
            let start_date = unit.advance(base_date, steps).ok_or_else(out_of_range)?;
            let end_date = unit.advance(start_date, 1).ok_or_else(out_of_range)?;
            Ok(Period {
                label: unit.label(start_date),
                start_date,
                end_date,
            })
        })
        .collect::<Result<Vec<Period>>>()?;

    debug!(
        "Generated {} {} periods from base {} (offset {})",
        periods.len(),
        unit,
        base_date,
        config.period_offset
    );

    Ok(periods)
}

/// Index of the period containing `today`.
///
/// `None` when today precedes every period (or there are none). When today
/// is at or after the end of the last period the index is clamped to the
/// last period, so the whole horizon counts as realized.
pub fn today_index(periods: &[Period], today: NaiveDate) -> Option<usize> {
    let first = periods.first()?;
    if let Some(index) = periods.iter().position(|p| p.contains(today)) {
        return Some(index);
    }
    if today < first.start_date {
        None
    } else {
        Some(periods.len() - 1)
    }
}

/// Preset horizons offered next to the manual period controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuickSelect {
    Today,
    Week,
    Month,
    Quarter,
    Year,
    ShortTerm,
    MediumTerm,
    LongTerm,
}

impl QuickSelect {
    pub fn to_config(self, today: NaiveDate) -> PeriodConfig {
        match self {
            QuickSelect::Today => PeriodConfig::new(TimeUnit::Day, 1, 0),
            QuickSelect::Week => {
                let to_monday = today.weekday().num_days_from_monday() as i64;
                PeriodConfig::new(TimeUnit::Day, 7, -to_monday)
            }
            QuickSelect::Month => {
                let first = first_of_month(today.year(), today.month());
                let last = shift_months(first, 1).pred_opt().unwrap_or(first);
                let first_week = start_of_week(first);
                let horizon = (start_of_week(last) - first_week).num_days() / 7 + 1;
                let offset = (first_week - start_of_week(today)).num_days() / 7;
                PeriodConfig::new(TimeUnit::Week, horizon, offset)
            }
            QuickSelect::Quarter => {
                let quarter_start = TimeUnit::Quarterly.truncate(today);
                let months = month_index(today.year(), today.month())
                    - month_index(quarter_start.year(), quarter_start.month());
                let second_half = if today.day() > 15 { 1 } else { 0 };
                PeriodConfig::new(TimeUnit::Fortnightly, 6, -months * 2 - second_half)
            }
            QuickSelect::Year => PeriodConfig::new(TimeUnit::Month, 12, -(today.month0() as i64)),
            QuickSelect::ShortTerm => PeriodConfig::new(TimeUnit::Annually, 3, 0),
            QuickSelect::MediumTerm => PeriodConfig::new(TimeUnit::Annually, 5, 0),
            QuickSelect::LongTerm => PeriodConfig::new(TimeUnit::Annually, 10, 0),
        }
    }
}
