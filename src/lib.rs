// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava-Komoot sync: copy recorded activities from Strava to Komoot.
//!
//! This crate exports each activity as GPX (falling back to rebuilding the
//! track from raw streams), maps the Strava type to a Komoot sport, uploads
//! the tour and records the outcome in a ledger so re-runs never upload an
//! activity twice.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod gpx;
pub mod models;
pub mod services;
pub mod time_utils;
