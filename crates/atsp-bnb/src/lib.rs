//! Branch-and-bound search for the asymmetric TSP across threads and
//! processes.
//!
//! Each process runs `threads` depth-first workers that split their stacks
//! with idle siblings, plus a listener exchanging best tours and completion
//! notices with the other processes over a [`Transport`].

mod best;
mod config;
mod coordinator;
mod error;
mod partition;
mod process;
mod report;
mod solver;
mod steal;
pub mod transport;
mod worker;

pub use best::BestTour;
pub use config::SearchConfig;
pub use coordinator::{Listener, ListenerStats, Peer};
pub use error::{Error, Result};
pub use partition::{block_range, build_initial_queue, queue_bound, Partitioner};
pub use process::run_process;
pub use report::SearchReport;
pub use solver::{solve, solve_cluster};
pub use steal::{WorkRequest, WorkShare};
pub use transport::{LocalCluster, Message, TcpTransport, Transport};
pub use worker::WorkerStats;
