//! Core graph types
//!
//! This module contains the fundamental types:
//! - `Op` - the closed operator set and its evaluation semantics
//! - `Node` / `NodeId` / `VarId` - graph nodes and handles
//! - `Context` - node arena, hash-consing cache and epoch
//! - Typed builders with incidental identity rules
//! - Topological traversal and the visitor trait

mod constructors;
pub(crate) mod context;
pub(crate) mod node;
pub(crate) mod op;
pub(crate) mod visitor;

pub use context::Context;
pub use node::{Node, NodeId, Operands, VarId};
pub use op::Op;
pub use visitor::{GraphVisitor, walk_graph};
