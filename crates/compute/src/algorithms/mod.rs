pub mod cusum;
pub mod entropy;
pub mod regression;
pub mod stats;
