pub mod interface;
pub mod normalize;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod scripted;
