//! Message passing between the processes of a distributed run.
//!
//! Rank [`ROOT`] tallies completion and relays best tours; every other rank
//! only talks to the root. Implementations must deliver the messages of any
//! one sender in the order they were sent.

mod local;
mod tcp;

use atsp_core::City;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use local::{LocalCluster, LocalEndpoint};
pub use tcp::TcpTransport;

pub const ROOT: usize = 0;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// An improved tour as its `n` cities, home first and not repeated at
    /// the end. The receiver recomputes the cost.
    BestTour(Vec<City>),
    /// The sending rank has no work left.
    Done(usize),
    /// Root has seen every rank finish.
    Terminate,
    /// A fatal error on `rank`; every process stops.
    Abort { rank: usize, reason: String },
}

pub trait Transport: Send + Sync {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Point-to-point send. Sending to one's own rank is allowed and lands
    /// in the local inbox.
    fn send(&self, dest: usize, message: Message) -> Result<()>;

    /// Sends `message` to every rank except the caller.
    fn broadcast(&self, message: Message) -> Result<()>;

    /// Blocks for the next message.
    fn recv(&self) -> Result<Message>;

    /// Non-blocking probe; `None` when nothing is pending.
    fn try_recv(&self) -> Result<Option<Message>>;

    fn is_root(&self) -> bool {
        self.rank() == ROOT
    }
}
