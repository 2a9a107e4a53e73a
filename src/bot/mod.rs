//! Bot-facing contract: inputs in, observations and events out

pub mod protocol;
