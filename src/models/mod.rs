// Option pricing models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub mod american;
pub mod bs_mod;
pub mod engine;
pub mod implied_vol;

/// Option contract type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptionType {
    Call,
    Put,
}

/// Option exercise style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExerciseStyle {
    European, // Cannot exercise early
    American, // Can exercise early
}

/// A listed option contract, as returned by a chain lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionContract {
    pub underlying: String,
    pub strike: f64,
    pub expiry: NaiveDate,
    pub option_type: OptionType,
    pub style: ExerciseStyle,
}

impl OptionContract {
    /// Intrinsic value against the given spot.
    pub fn intrinsic(&self, spot: f64) -> f64 {
        match self.option_type {
            OptionType::Call => (spot - self.strike).max(0.0),
            OptionType::Put => (self.strike - spot).max(0.0),
        }
    }

    /// Year fraction until expiry (ACT/365); zero once expired.
    pub fn time_to_expiry(&self, today: NaiveDate) -> f64 {
        ((self.expiry - today).num_days() as f64 / 365.0).max(0.0)
    }
}
