//! # DSMate
//!
//! Document-scoped question answering over a fixed corpus of course material.
//!
//! Every supported file under the corpus root gets its own semantic index.
//! A question is answered against exactly one selected document: the most
//! similar segments of that document become the context of a grounded prompt,
//! and the generation model's reply is returned as is.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌───────────────────┐
//! │  files/  │──▶│ Loader       │──▶│ Registry          │
//! │ pdf/txt/ │   │ extract+chunk│   │ path → DocIndex   │
//! │ docx/... │   └──────────────┘   └─────────┬─────────┘
//! └──────────┘                                │ select one
//!                                             ▼
//!                 ┌──────────┐  prompt  ┌────────────┐
//!                 │Generator │◀─────────│ Synthesizer│◀── question
//!                 └──────────┘          └────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`extract`] | Per-format text extraction |
//! | [`chunk`] | Text chunking |
//! | [`loader`] | File → segments |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`generation`] | Generation provider abstraction |
//! | [`index`] | Per-document similarity index |
//! | [`registry`] | Corpus discovery and index cache |
//! | [`answer`] | Prompt assembly and answering |
//! | [`session`] | Conversation history |
//! | [`error`] | Error types |
//! | [`logging`] | Subscriber setup |

pub mod answer;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
mod http;
pub mod index;
pub mod loader;
pub mod logging;
pub mod models;
pub mod registry;
pub mod session;
