//! DAG Module - job dependency graph
//!
//! - `job_graph`: JobGraph built from a workflow's `needs`/`after` edges
//!
//! The graph is immutable after construction and used for ordering and
//! cycle analysis only; lowering keeps declaration order.

mod job_graph;

pub use job_graph::{DepVec, JobGraph};
