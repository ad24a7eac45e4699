//! Propal - AI assistant for a sales-proposal editor
//!
//! The document side ([`document`], [`actors`], [`tools`], [`bridge`],
//! [`conversation`]) runs next to the live editor and applies the model's
//! tool calls. The server side ([`agent`], [`llm`], [`api`]) streams turns
//! from the language model.

pub mod actors;
pub mod agent;
pub mod api;
pub mod app_state;
pub mod bridge;
pub mod config;
pub mod conversation;
pub mod document;
pub mod llm;
pub mod sse;
pub mod tools;
