use crate::mpn::reference_table::TableError;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const GROUP_COUNT: usize = 3;
pub const REPLICATES: usize = 3;
pub const SLOT_COUNT: usize = GROUP_COUNT * REPLICATES;

/// Positive-tube count per dilution group, rendered as `P<d0><d1><d2>`.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(into = "String", try_from = "String")]
pub struct PatternKey([u8; GROUP_COUNT]);

impl PatternKey {
    pub const COMBINATIONS: usize = (REPLICATES + 1).pow(GROUP_COUNT as u32);

    pub fn new(digits: [u8; GROUP_COUNT]) -> Result<Self, TableError> {
        match digits.iter().find(|&&digit| digit as usize > REPLICATES) {
            Some(&digit) => Err(TableError::DigitOutOfRange(digit)),
            None => Ok(Self(digits)),
        }
    }

    /// Sums each run of `REPLICATES` slots. Any non-zero slot counts as positive.
    pub fn from_slots(slots: &[u8; SLOT_COUNT]) -> Self {
        let mut digits = [0_u8; GROUP_COUNT];
        for (digit, group) in digits.iter_mut().zip(slots.chunks(REPLICATES)) {
            *digit = group.iter().filter(|&&slot| slot != 0).count() as u8;
        }
        Self(digits)
    }

    pub fn digits(&self) -> [u8; GROUP_COUNT] {
        self.0
    }

    pub fn positives(&self) -> usize {
        self.0.iter().map(|&digit| digit as usize).sum()
    }

    pub fn index(&self) -> usize {
        self.0.iter().fold(0, |index, &digit| index * (REPLICATES + 1) + digit as usize)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        if index >= Self::COMBINATIONS {
            return None;
        }
        let base = REPLICATES + 1;
        let mut digits = [0_u8; GROUP_COUNT];
        let mut rest = index;
        for digit in digits.iter_mut().rev() {
            *digit = (rest % base) as u8;
            rest /= base;
        }
        Some(Self(digits))
    }

    pub fn all() -> impl Iterator<Item = PatternKey> {
        (0..Self::COMBINATIONS).filter_map(Self::from_index)
    }
}

impl Display for PatternKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}{}{}", self.0[0], self.0[1], self.0[2])
    }
}

impl FromStr for PatternKey {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits_str = trimmed.strip_prefix('P').unwrap_or(trimmed);
        if digits_str.len() != GROUP_COUNT {
            return Err(TableError::MalformedKey(s.to_string()));
        }
        let mut digits = [0_u8; GROUP_COUNT];
        for (digit, character) in digits.iter_mut().zip(digits_str.chars()) {
            *digit = character.to_digit(10).ok_or_else(|| TableError::MalformedKey(s.to_string()))? as u8;
        }
        Self::new(digits)
    }
}

impl From<PatternKey> for String {
    fn from(value: PatternKey) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for PatternKey {
    type Error = TableError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
