// Domain-specific error types
pub mod errors;

// Feature layout and numeric helpers
pub mod ml;

// Observations, predictions and the business-day calendar
pub mod series;
