// ABOUTME: Multi-tenant knowledge chat server with retrieval-augmented answers
// ABOUTME: Streams assistant turns over SSE and scopes every read by membership
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! # Nova Server
//!
//! A multi-tenant knowledge chat backend. Users belong to organizations,
//! organizations contain knowledge groups, and every conversation is pinned
//! to one group. Assistant answers come from a pluggable retrieval backend
//! and stream to the browser as Server-Sent Events.
//!
//! ## Layout
//!
//! - [`config`] / [`logging`]: environment-driven setup
//! - [`database`]: `SQLite` persistence and access-control checks
//! - [`rag`]: answer backends (managed retrieval API or chat completions)
//! - [`services`]: the chat-turn orchestrator
//! - [`routes`]: the HTTP surface
//! - [`client`]: a Rust consumer for the streaming chat endpoint

#![warn(missing_docs)]

pub mod auth;
pub mod client;
pub mod config;
pub mod constants;
pub mod database;
pub mod errors;
pub mod invites;
pub mod logging;
pub mod models;
pub mod rag;
pub mod resources;
pub mod routes;
pub mod services;
pub mod storage;
