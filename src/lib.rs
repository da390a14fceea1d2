//! Petcare - client-side care controller for a virtual pet backend.
//!
//! # Overview
//!
//! Petcare keeps the client's picture of one pet in step with the server. It
//! sends care actions (feed, play, bathe, rest), folds every response back
//! into cached state, and derives the feedback a view needs: which stats moved
//! and by how much, whether the pet grew into a new evolution stage, how the
//! coin balance changed, and which errors to show.
//!
//! The server is always the source of truth. Nothing here predicts stats
//! locally; the controller only compares snapshots the server returned.
//!
//! # Modules
//!
//! - [`model`]: Pet stats, care actions and response types
//! - [`stats`]: Derived happiness and per-stat deltas
//! - [`evolution`]: Level to stage mapping and evolution detection
//! - [`controller`]: The care controller (dispatch, reconciliation, refresh)
//! - [`transient`]: Self-expiring feedback queues
//! - [`validation`]: Input checks run before any request leaves
//! - [`remote`]: Backend service clients
//! - [`storage`]: SQLite telemetry journal
//! - [`config`]: Environment configuration
//! - [`api`]: HTTP gateway handlers

pub mod api;
pub mod config;
pub mod controller;
pub mod error;
pub mod evolution;
pub mod model;
pub mod remote;
pub mod stats;
pub mod storage;
pub mod transient;
pub mod validation;
