//! GrantFlow - multi-agent runtime that turns research papers into grant proposals
//!
//! Independent agents run on their own threads and talk only through a
//! shared, priority-ordered mailbox. A supervisor tracks tasks, and four role
//! agents (analyst, evaluator, innovator, writer) turn a paper into a
//! proposal with the help of a language model.
//!
//! # Architecture
//!
//! - **mail**: Messages and the priority mailbox
//! - **swarm**: Agent contract, worker runtime, supervisor, system façade
//! - **roles**: The four workflow roles behind one table-driven agent
//! - **pipeline**: Paper-to-proposal workflow and conflict detection
//! - **llm**: Language model trait, Groq backend, retry
//! - **document**: Paper text extraction
//! - **config**: YAML configuration and validation

// Core modules
pub mod config;
pub mod error;
pub mod logging;
pub mod mail;
pub mod swarm;

// Collaborators and workflow
pub mod document;
pub mod llm;
pub mod pipeline;
pub mod roles;

// Re-exports
pub use error::{GrantFlowError, Result};
