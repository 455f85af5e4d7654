//! API route modules.

pub mod fallback;
pub mod status;
