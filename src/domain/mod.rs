pub mod models;
pub mod prediction;
pub mod session_analysis;
