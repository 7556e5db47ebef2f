pub mod api;
pub mod climate;
pub mod config;
pub mod db;
pub mod lighting;
pub mod presence;
pub mod state;
pub mod telemetry;
