//! Hydrological analysis algorithms
//!
//! Single-flow-direction drainage modeling from Digital Elevation Models:
//! - Priority-Flood: optimal O(n log n) depression filling (Barnes 2014)
//! - Flow direction: D8 steepest descent
//! - Flow accumulation: contributing cell count, self included

mod flow_accumulation;
mod flow_direction;
mod priority_flood;

pub use flow_accumulation::flow_accumulation;
pub use flow_direction::flow_direction;
pub use priority_flood::{priority_flood, PriorityFloodParams};
