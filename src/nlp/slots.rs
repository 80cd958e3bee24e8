//! Slot universe and the fixed-shape slot record threaded through the pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel stored in a normalized slot whose raw value could not be canonicalized
pub const UNKNOWN: &str = "unknown";

/// Named piece of structured meaning that can be extracted from a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    /// Which data table the question is about
    Table,
    /// Admission year
    Year,
    /// University
    School,
    /// Major or faculty
    Major,
    /// Province or region
    District,
    /// Subject category (文科/理科 ...)
    Classy,
}

impl Slot {
    /// Every slot, in display order
    pub const ALL: [Slot; 6] = [
        Slot::Table,
        Slot::Year,
        Slot::School,
        Slot::Major,
        Slot::District,
        Slot::Classy,
    ];

    /// Slot name as used in templates and column names
    pub fn name(&self) -> &'static str {
        match self {
            Slot::Table => "table",
            Slot::Year => "year",
            Slot::School => "school",
            Slot::Major => "major",
            Slot::District => "district",
            Slot::Classy => "classy",
        }
    }

    /// Looks up a slot by its name
    pub fn from_name(name: &str) -> Option<Slot> {
        Slot::ALL.into_iter().find(|slot| slot.name() == name)
    }

    /// Whether this slot maps onto a column of the admissions tables
    pub fn is_column(&self) -> bool {
        !matches!(self, Slot::Table)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Slot {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Slot::from_name(s.trim())
            .ok_or_else(|| crate::error::Error::InvalidInput(format!("unknown slot: {}", s)))
    }
}

/// Value (or unset) for every slot of one question.
///
/// All six slots are always present; an unset slot holds the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSet {
    pub table: String,
    pub year: String,
    pub school: String,
    pub major: String,
    pub district: String,
    pub classy: String,
}

impl SlotSet {
    /// Creates a slot set with every slot unset
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with one slot replaced
    pub fn with(mut self, slot: Slot, value: impl Into<String>) -> Self {
        self.set(slot, value);
        self
    }

    pub(crate) fn set(&mut self, slot: Slot, value: impl Into<String>) {
        *self.slot_mut(slot) = value.into();
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut String {
        match slot {
            Slot::Table => &mut self.table,
            Slot::Year => &mut self.year,
            Slot::School => &mut self.school,
            Slot::Major => &mut self.major,
            Slot::District => &mut self.district,
            Slot::Classy => &mut self.classy,
        }
    }

    /// Value of a slot, empty when unset
    pub fn get(&self, slot: Slot) -> &str {
        match slot {
            Slot::Table => &self.table,
            Slot::Year => &self.year,
            Slot::School => &self.school,
            Slot::Major => &self.major,
            Slot::District => &self.district,
            Slot::Classy => &self.classy,
        }
    }

    /// Whether the slot holds any value (including the unknown sentinel)
    pub fn is_set(&self, slot: Slot) -> bool {
        !self.get(slot).is_empty()
    }

    /// Whether the slot holds a usable value
    pub fn is_known(&self, slot: Slot) -> bool {
        self.is_set(slot) && self.get(slot) != UNKNOWN
    }

    /// Slots holding a value, in display order
    pub fn present(&self) -> impl Iterator<Item = Slot> + '_ {
        Slot::ALL.into_iter().filter(|slot| self.is_set(*slot))
    }

    /// All slots with their values, in display order
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &str)> + '_ {
        Slot::ALL.into_iter().map(|slot| (slot, self.get(slot)))
    }

    /// True when no slot is set
    pub fn is_empty(&self) -> bool {
        self.present().next().is_none()
    }
}

impl fmt::Display for SlotSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (slot, value) in self.iter() {
            writeln!(f, "  {:<9}{}", format!("{}:", slot), value)?;
        }
        Ok(())
    }
}
