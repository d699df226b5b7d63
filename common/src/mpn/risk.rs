use crate::mpn::mpn_value::MpnValue;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const SAFE_CEILING: f64 = 3.0;
pub const LOW_CEILING: f64 = 20.0;
pub const MEDIUM_CEILING: f64 = 110.0;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// `Safe` below 3, `Low` up to 20, `Medium` up to 110, `High` above.
    /// Range markers classify by their side of the table.
    pub fn classify(mpn: &MpnValue) -> Self {
        match mpn {
            MpnValue::BelowRange(_) => RiskLevel::Safe,
            MpnValue::AboveRange(_) => RiskLevel::High,
            MpnValue::Bounded(value) => {
                let value = *value;
                if value < SAFE_CEILING {
                    RiskLevel::Safe
                } else if value <= LOW_CEILING {
                    RiskLevel::Low
                } else if value <= MEDIUM_CEILING {
                    RiskLevel::Medium
                } else {
                    RiskLevel::High
                }
            }
        }
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskLevel::Safe => "Safe",
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
        };
        write!(f, "{name}")
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Safe" => Ok(RiskLevel::Safe),
            "Low" => Ok(RiskLevel::Low),
            "Medium" => Ok(RiskLevel::Medium),
            "High" => Ok(RiskLevel::High),
            other => Err(format!("Unknown risk level {other:?}.")),
        }
    }
}
