// Domain module - Descriptors and error taxonomy
pub mod descriptor;
pub mod error;
