#![forbid(unsafe_code)]

//! Core domain model and business logic for the Pillbox medication reminder.
//!
//! This crate provides:
//! - Domain types (regimens, dose instances)
//! - Regimen store and its storage collaborators
//! - Today's schedule generator and the dose ledger
//! - Alert scheduler, poll timer and the `Reminder` controller
//! - Adherence reports over recent days, with CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod store;
pub mod schedule;
pub mod ledger;
pub mod alerts;
pub mod collaborators;
pub mod timer;
pub mod reminder;
pub mod adherence;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use store::{JsonFileStorage, MemoryStorage, RegimenStorage, RegimenStore};
pub use schedule::{generate_today_schedule, schedule_for_day};
pub use alerts::{AlertScheduler, AlertState};
pub use collaborators::{AlertSurface, Chime, Notifier, Permission};
pub use timer::{PollTimer, Tick};
pub use reminder::Reminder;
pub use adherence::{adherence_report, AdherenceReport, DoseStatus};
