// ABOUTME: Application services sitting between routes and the database layer
// ABOUTME: Currently hosts the chat-turn streaming orchestrator
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Nova Contributors

//! Application services.

pub mod chat_turn;
