//! Patient risk assessment for MoodMate clinicians.
//!
//! The scoring core lives in [`risk`] and [`trends`] and is pure; [`db`]
//! loads patient activity from Postgres for the `moodmate-risk` CLI.

pub mod alert;
pub mod config;
pub mod db;
pub mod models;
pub mod report;
pub mod risk;
pub mod trends;
