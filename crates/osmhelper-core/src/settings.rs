//! In-memory capacity and age-cutoff overrides.
//!
//! Overrides live for the life of the process only.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

use crate::constants::{default_capacity, AgeBand};

/// Where an applicant of a given age belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Placement {
    TooYoung,
    Band(AgeBand),
}

impl Placement {
    pub fn display_name(&self) -> &'static str {
        match self {
            Placement::TooYoung => "Too Young",
            Placement::Band(band) => band.display_name(),
        }
    }
}

/// Minimum joining age, in fractional years, for each age band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgeCutoffs {
    values: [f64; 5],
}

impl Default for AgeCutoffs {
    fn default() -> Self {
        Self {
            values: AgeBand::ALL.map(|band| band.default_cutoff()),
        }
    }
}

impl AgeCutoffs {
    pub fn get(&self, band: AgeBand) -> f64 {
        self.values[band as usize]
    }

    pub fn set(&mut self, band: AgeBand, years: f64) {
        self.values[band as usize] = years;
    }

    /// Oldest band whose cutoff `age_years` has reached.
    pub fn placement(&self, age_years: f64) -> Placement {
        AgeBand::ALL
            .into_iter()
            .rev()
            .find(|band| age_years >= self.get(*band))
            .map_or(Placement::TooYoung, Placement::Band)
    }

    /// Cutoff split into whole years and months for display.
    pub fn years_months(&self, band: AgeBand) -> (u32, u32) {
        let value = self.get(band).max(0.0);
        let mut years = value.floor() as u32;
        let mut months = ((value - value.floor()) * 12.0).round() as u32;
        if months == 12 {
            years += 1;
            months = 0;
        }
        (years, months)
    }
}

/// Convert a years + months entry into fractional years.
pub fn cutoff_from_parts(years: u32, months: u32) -> f64 {
    f64::from(years) + f64::from(months) / 12.0
}

#[derive(Debug, Default)]
pub struct SettingsStore {
    capacities: RwLock<HashMap<String, u32>>,
    cutoffs: RwLock<AgeCutoffs>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capacity for a section: override, then the default for its type.
    pub fn capacity(&self, section_id: &str, section_type: &str) -> Option<u32> {
        let capacities = self.capacities.read().unwrap_or_else(PoisonError::into_inner);
        capacities
            .get(section_id)
            .copied()
            .or_else(|| default_capacity(section_type))
    }

    pub fn set_capacity(&self, section_id: impl Into<String>, capacity: u32) {
        let mut capacities = self.capacities.write().unwrap_or_else(PoisonError::into_inner);
        capacities.insert(section_id.into(), capacity);
    }

    pub fn clear_capacity(&self, section_id: &str) {
        let mut capacities = self.capacities.write().unwrap_or_else(PoisonError::into_inner);
        capacities.remove(section_id);
    }

    pub fn cutoffs(&self) -> AgeCutoffs {
        *self.cutoffs.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_cutoff(&self, band: AgeBand, years: u32, months: u32) {
        let mut cutoffs = self.cutoffs.write().unwrap_or_else(PoisonError::into_inner);
        cutoffs.set(band, cutoff_from_parts(years, months));
    }

    pub fn reset_cutoffs(&self) {
        *self.cutoffs.write().unwrap_or_else(PoisonError::into_inner) = AgeCutoffs::default();
    }
}
