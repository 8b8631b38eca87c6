//! Sage Chat - Conversation Orchestration Core
//!
//! This crate implements the orchestration service behind the Sage
//! guided-chat application: session lifecycle, domain-context routing,
//! context retrieval, plugin hooks, an LLM provider registry with health
//! checks and failover, and a streaming conversation pipeline exposed
//! over REST, SSE, and WebSocket.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
