//! Calendar object model and recurrence expansion.

pub mod core;
pub mod expand;
