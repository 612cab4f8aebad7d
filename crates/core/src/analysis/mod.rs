pub mod stats;
pub mod themes;
pub mod timeseries;
pub mod trends;
