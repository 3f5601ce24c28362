//! # classtally
//!
//! Collects per-student autograder results for a GitHub Classroom
//! assignment: downloads the classroom submission export, pulls each
//! student's published log files, extracts scores, and maintains the
//! JSON snapshot the ranking dashboard reads. Runs are incremental:
//! students whose stored data is current are skipped to conserve API
//! quota.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Folding parsed logs into per-student and run-wide tallies
pub mod aggregate;
/// Environment-backed runtime configuration
pub mod config;
/// Classroom export parsing
pub mod export;
/// Retrieval and decoding of per-student repository files
pub mod fetch;
/// Autograder log parsing
pub mod logs;
/// The decide-fetch-merge pass over the persisted report
pub mod reconcile;
/// The external classroom and repository capabilities
pub mod remote;
/// The persisted dashboard snapshot
pub mod store;
