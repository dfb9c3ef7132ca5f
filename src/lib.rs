//! Contract Sweeper library surface.
//!
//! Follows a chain through an explorer's proxy API, classifies every address seen in
//! new blocks, and hands fresh contract bytecode to a sandboxed static analyzer.
//! The concurrent core lives in [`coordinator`], [`worker`] and [`supervisor`].

pub mod analyzer;
pub mod coordinator;
pub mod error;
pub mod explorer;
pub mod runtime;
pub mod storage;
pub mod supervisor;
pub mod utils;
pub mod work_queue;
pub mod worker;
