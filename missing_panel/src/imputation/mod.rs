//! Treatment-stratified imputation.
//!
//! [`engine::StratifiedImputer`] splits the frame by treatment arm, fills each
//! arm with one of the strategies below and writes the arms back in row order.

pub mod distance;
pub mod engine;
pub mod knn;
pub mod univariate;
