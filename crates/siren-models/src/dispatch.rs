//! Emergency service dispatch records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{AlertId, SourceId};

/// Kind of emergency service responding to an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Ambulance,
    Police,
    Fire,
}

impl ServiceKind {
    pub const ALL: [ServiceKind; 3] = [ServiceKind::Ambulance, ServiceKind::Police, ServiceKind::Fire];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Ambulance => "ambulance",
            ServiceKind::Police => "police",
            ServiceKind::Fire => "fire",
        }
    }

    /// Relative selection weight, in percent.
    pub fn weight(&self) -> u32 {
        match self {
            ServiceKind::Ambulance => 50,
            ServiceKind::Police => 30,
            ServiceKind::Fire => 20,
        }
    }

    /// Response centres able to send a unit.
    pub fn centres(&self) -> &'static [&'static str] {
        match self {
            ServiceKind::Ambulance => &[
                "City General Hospital",
                "Memorial Medical Center",
                "St. Mary's Hospital",
            ],
            ServiceKind::Police => &[
                "Downtown Police Station",
                "North District Police",
                "Highway Patrol",
            ],
            ServiceKind::Fire => &[
                "Central Fire Department",
                "Industrial Area Fire Station",
                "Suburban Fire Brigade",
            ],
        }
    }

    /// Estimated response time range in minutes (min, max).
    pub fn eta_range_minutes(&self) -> (f64, f64) {
        match self {
            ServiceKind::Ambulance => (2.0, 8.0),
            ServiceKind::Police => (3.0, 10.0),
            ServiceKind::Fire => (4.0, 12.0),
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress of a dispatched unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStage {
    #[default]
    Dispatched,
    EnRoute,
    Approaching,
    Arrived,
}

impl DispatchStage {
    pub const SEQUENCE: [DispatchStage; 4] = [
        DispatchStage::Dispatched,
        DispatchStage::EnRoute,
        DispatchStage::Approaching,
        DispatchStage::Arrived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStage::Dispatched => "dispatched",
            DispatchStage::EnRoute => "en_route",
            DispatchStage::Approaching => "approaching",
            DispatchStage::Arrived => "arrived",
        }
    }

    pub fn next(&self) -> Option<DispatchStage> {
        match self {
            DispatchStage::Dispatched => Some(DispatchStage::EnRoute),
            DispatchStage::EnRoute => Some(DispatchStage::Approaching),
            DispatchStage::Approaching => Some(DispatchStage::Arrived),
            DispatchStage::Arrived => None,
        }
    }
}

impl fmt::Display for DispatchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A simulated emergency response to one alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DispatchRecord {
    pub alert_id: AlertId,
    pub source_id: SourceId,
    pub location_name: String,
    pub service: ServiceKind,
    pub responding_unit: String,
    pub eta_minutes: f64,
    pub stage: DispatchStage,
    pub dispatched_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed: bool,
}

impl DispatchRecord {
    /// Move to the given stage; reaching `Arrived` completes the record.
    pub fn advance_to(&mut self, stage: DispatchStage, at: DateTime<Utc>) {
        self.stage = stage;
        self.updated_at = at;
        if stage == DispatchStage::Arrived {
            self.completed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_sum_to_hundred() {
        let total: u32 = ServiceKind::ALL.iter().map(|k| k.weight()).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn test_stage_sequence() {
        let mut stage = DispatchStage::Dispatched;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen, DispatchStage::SEQUENCE.to_vec());
    }
}
