//! Well-known label keys injected onto every expanded child object.

/// Names the grid that owns a child object.
pub const GRID_SELECTOR_LABEL: &str = "sitegrid.io/grid-selector";

/// Carries the grid value a child object was expanded for.
pub const GRID_UNIQ_KEY_LABEL: &str = "sitegrid.io/grid-uniq-key";
