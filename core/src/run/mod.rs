pub mod config;
pub mod manager;
pub mod selection;
pub mod state;
