//! HTTP route groups

pub mod qa;
