// Module declarations for the gridsite siting and dispatch core

// Core routing and balance engines
pub mod core {
    pub mod geodesy;
    pub mod grid;
    pub mod connector;
    pub mod router;
    pub mod balance;
}

// Configuration modules
pub mod config {
    pub mod constants;
    pub mod expression;
    pub mod settings;
}

// Model definitions
pub mod models {
    pub mod station;
    pub mod segment;
    pub mod storage;
}

// Data loaders
pub mod data {
    pub mod grid_loader;
    pub mod stations_loader;
    pub mod series_loader;
}

// Analysis and summary tables
pub mod analysis {
    pub mod aggregation;
    pub mod reporting;
}

// Utility functions
pub mod utils {
    pub mod logging;
    pub mod progress;
    pub mod csv_export;
}

// CLI interface
pub mod cli {
    pub mod cli;
}

// Re-export commonly used types
pub use crate::core::balance::{BalanceEngine, BalanceInput, BalanceResult};
pub use crate::core::geodesy::Coordinate;
pub use crate::core::grid::Grid;
pub use crate::config::settings::Config;
pub use crate::models::station::{Station, Technology};
