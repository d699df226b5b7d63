use crate::mpn::reference_table::TableError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// MPN per gram. The range variants carry the limit the table reports,
/// rendered as `<3.0` and `>1100`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[serde(into = "String", try_from = "String")]
pub enum MpnValue {
    Bounded(f64),
    BelowRange(f64),
    AboveRange(f64),
}

impl MpnValue {
    pub fn magnitude(&self) -> f64 {
        match self {
            MpnValue::Bounded(value) | MpnValue::BelowRange(value) | MpnValue::AboveRange(value) => *value,
        }
    }
}

impl Display for MpnValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MpnValue::Bounded(value) => write!(f, "{value}"),
            MpnValue::BelowRange(limit) => write!(f, "<{limit:.1}"),
            MpnValue::AboveRange(limit) => write!(f, ">{limit}"),
        }
    }
}

impl FromStr for MpnValue {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(rest) = trimmed.strip_prefix('<') {
            Ok(MpnValue::BelowRange(parse_number(rest)?))
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            Ok(MpnValue::AboveRange(parse_number(rest)?))
        } else {
            Ok(MpnValue::Bounded(parse_number(trimmed)?))
        }
    }
}

impl From<MpnValue> for String {
    fn from(value: MpnValue) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for MpnValue {
    type Error = TableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Confidence-interval endpoint. `Unbounded` renders as `-`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
#[serde(into = "String", try_from = "String")]
pub enum CiBound {
    Value(f64),
    Unbounded,
}

impl Display for CiBound {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CiBound::Value(value) => write!(f, "{value}"),
            CiBound::Unbounded => write!(f, "-"),
        }
    }
}

impl FromStr for CiBound {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "-" => Ok(CiBound::Unbounded),
            value => Ok(CiBound::Value(parse_number(value)?)),
        }
    }
}

impl From<CiBound> for String {
    fn from(value: CiBound) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for CiBound {
    type Error = TableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn parse_number(text: &str) -> Result<f64, TableError> {
    match text.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        _ => Err(TableError::MalformedValue(text.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_forms_match_the_table() {
        assert_eq!(MpnValue::BelowRange(3.0).to_string(), "<3.0");
        assert_eq!(MpnValue::AboveRange(1100.0).to_string(), ">1100");
        assert_eq!(MpnValue::Bounded(3.6).to_string(), "3.6");
        assert_eq!(MpnValue::Bounded(11.0).to_string(), "11");
        assert_eq!(CiBound::Unbounded.to_string(), "-");
        assert_eq!(CiBound::Value(0.15).to_string(), "0.15");
    }

    #[test]
    fn parses_range_markers() {
        assert_eq!("<3.0".parse::<MpnValue>().unwrap(), MpnValue::BelowRange(3.0));
        assert_eq!(">1100".parse::<MpnValue>().unwrap(), MpnValue::AboveRange(1100.0));
        assert_eq!(" 23 ".parse::<MpnValue>().unwrap(), MpnValue::Bounded(23.0));
        assert_eq!("-".parse::<CiBound>().unwrap(), CiBound::Unbounded);
    }

    #[test]
    fn rejects_non_numbers() {
        assert!("NaN".parse::<MpnValue>().is_err());
        assert!("abc".parse::<MpnValue>().is_err());
        assert!("<".parse::<MpnValue>().is_err());
        assert!("inf".parse::<CiBound>().is_err());
    }

    #[test]
    fn serializes_as_text() {
        assert_eq!(serde_json::to_value(MpnValue::BelowRange(3.0)).unwrap(), serde_json::json!("<3.0"));
        assert_eq!(serde_json::to_value(CiBound::Unbounded).unwrap(), serde_json::json!("-"));
        let parsed: MpnValue = serde_json::from_str("\">1100\"").unwrap();
        assert_eq!(parsed, MpnValue::AboveRange(1100.0));
    }
}
