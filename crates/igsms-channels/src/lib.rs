//! # igsms-channels
//!
//! SMS gateway integration for igsms.

pub mod twilio;
pub mod utils;
