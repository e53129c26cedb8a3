//! Helpers shared by unit, integration and documentation tests.

pub mod support;
