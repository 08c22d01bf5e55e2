pub mod model;
pub mod resolver;
pub mod similarity;
pub mod verifier;
