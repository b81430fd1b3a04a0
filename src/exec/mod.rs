//! Sequential command execution
//!
//! Rendered commands run one at a time as OS subprocesses: output is streamed
//! line by line while the process runs, a non-zero exit stops the remainder
//! of the queue, and a stop request kills the active process group. Only one
//! process is ever alive at a time; that is an invariant of the pipeline, not
//! a scheduling accident.

pub mod cleanup;
pub mod messages;
pub mod pipeline;
pub mod process;
