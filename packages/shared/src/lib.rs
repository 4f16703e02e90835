//! Utilities shared by the quizsync packages.

pub mod logger;
