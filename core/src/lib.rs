pub mod audit;
pub mod citations;
pub mod determinism;
pub mod documents;
pub mod evidence;
pub mod oracle;
pub mod policy;
pub mod report;
pub mod run;
pub mod stages;

pub mod error;
