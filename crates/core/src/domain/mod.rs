pub mod chart;
pub mod trend;
