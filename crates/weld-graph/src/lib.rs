//! The declaration-bundler / dependency-graph engine.
//!
//! [`GraphModel::scan`] turns a source file's emitted declaration text into
//! a [`GraphNode`]: cleaned declaration text (imports/exports stripped) plus
//! structured import/export maps. [`Emitter`] writes per-file `.d.ts`
//! output; [`Bundler`] traverses the internal dependency graph from entry
//! points and assembles a single bundled artifact per entry.

pub mod bundler;
pub mod emitter;
pub mod model;
pub mod node;
pub mod parse;

pub use bundler::Bundler;
pub use emitter::Emitter;
pub use model::GraphModel;
pub use node::{ExternalExports, ExternalImports, GraphNode, InternalExports};
