//! Utility modules

pub mod normalize;

pub use normalize::FieldAliases;
