// Portfolio performance and risk analytics

pub mod correlation;
pub mod monte_carlo;
pub mod performance;
pub mod risk;
pub mod stats;
pub mod stress;
