//! Slot-balance descriptor handed over by the slot-balancing planner

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Number of hash slots in a Redis Cluster
pub const CLUSTER_SLOTS: u16 = 16384;

/// A set of hash slots to move onto one node: either a contiguous inclusive
/// range or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlotRange {
    Range { start: u16, end: u16 },
    Slots { slots: Vec<u16> },
}

impl SlotRange {
    pub fn range(start: u16, end: u16) -> Self {
        SlotRange::Range { start, end }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            SlotRange::Range { start, end } => {
                if start > end {
                    return Err(AppError::ValidationError(format!(
                        "Slot range start {} is greater than end {}",
                        start, end
                    )));
                }
                if *end >= CLUSTER_SLOTS {
                    return Err(out_of_bounds(*end));
                }
            }
            SlotRange::Slots { slots } => {
                if slots.is_empty() {
                    return Err(AppError::ValidationError(
                        "Slot list is empty".to_string(),
                    ));
                }
                if let Some(slot) = slots.iter().find(|slot| **slot >= CLUSTER_SLOTS) {
                    return Err(out_of_bounds(*slot));
                }
            }
        }
        Ok(())
    }

    /// Sorted, de-duplicated slots
    pub fn slots(&self) -> Vec<u16> {
        let mut slots: Vec<u16> = match self {
            SlotRange::Range { start, end } => (*start..=*end).collect(),
            SlotRange::Slots { slots } => slots.clone(),
        };
        slots.sort_unstable();
        slots.dedup();
        slots
    }
}

fn out_of_bounds(slot: u16) -> AppError {
    AppError::ValidationError(format!(
        "Slot {} is outside 0..{}",
        slot, CLUSTER_SLOTS
    ))
}
