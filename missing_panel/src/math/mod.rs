pub mod descriptive;
pub mod hypothesis;
pub mod logit;
pub mod ols;
