//! Admission-likelihood scoring for childcare facility waitlists.
//!
//! The scoring engine under [`workflows::admission::scoring`] is a pure function of its
//! inputs. Everything around it (factor extraction, snapshot persistence, batch recompute,
//! change alerts, HTTP routing) lives alongside it behind collaborator traits.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
