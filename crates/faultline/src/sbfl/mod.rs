//! Spectrum-Based Fault Localization
//!
//! Ranks source lines by how strongly their execution correlates with test
//! failure. For every line four counters are taken over the recorded test
//! cases:
//!
//! | counter | meaning |
//! |---------|---------|
//! | `ef` | failing tests that execute the line |
//! | `ep` | passing tests that execute the line |
//! | `nf` | failing tests that do not execute it |
//! | `np` | passing tests that do not execute it |
//!
//! and a [`Metric`] turns them into a score. The metric is picked once per
//! [`SbflLocalizer`]; changing it means building a new localizer, so scores
//! are never mixed across formulas.

mod localizer;
mod matrix;
mod metric;

pub use localizer::{format_ranking, SbflLocalizer, SuspiciousnessScore};
pub use matrix::{CoverageMatrix, Spectrum};
pub use metric::{Metric, DEFAULT_DSTAR};
