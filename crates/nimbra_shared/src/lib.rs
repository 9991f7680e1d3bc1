//! Shared text infrastructure for the Nimbra engine crates: source locations,
//! copy-on-write lexemes and the owned error surface used by the façade
//! layers.

pub mod errors;
pub mod lexeme;
pub mod location;
