//! Processing pipeline for authorization requests.

pub mod requests;
