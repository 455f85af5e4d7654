//! # pgpulse-common
//!
//! Configuration assembly and the generic error responder shared by the
//! pgpulse crates. No database or routing logic lives here.

pub mod config;
pub mod error;
