///! Spot deduplication and change detection
///!
///! Turns the re-polled, overlapping feed snapshots into "notify now"
///! decisions, one per incoming spot, and expires idle activators.

mod tracker;

pub use tracker::{SpotChange, SpotTracker, TrackedState};
