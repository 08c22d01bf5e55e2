pub mod heuristics;
pub mod logs;
pub mod signals;
