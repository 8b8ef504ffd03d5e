use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};

use super::{Message, Transport};
use crate::{Error, Result};

/// Builds in-process endpoints, one per simulated process.
pub struct LocalCluster;

impl LocalCluster {
    pub fn new(size: usize) -> Vec<LocalEndpoint> {
        let (senders, receivers): (Vec<Sender<Message>>, Vec<Receiver<Message>>) =
            (0..size).map(|_| unbounded()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, inbox)| LocalEndpoint {
                rank,
                inbox,
                peers: senders.clone(),
            })
            .collect()
    }
}

#[derive(Debug)]
pub struct LocalEndpoint {
    rank: usize,
    inbox: Receiver<Message>,
    peers: Vec<Sender<Message>>,
}

impl Transport for LocalEndpoint {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, dest: usize, message: Message) -> Result<()> {
        let peer = self
            .peers
            .get(dest)
            .ok_or_else(|| Error::transport(format!("no process with rank {dest}")))?;
        peer.send(message)
            .map_err(|_| Error::transport(format!("rank {dest} hung up")))
    }

    fn broadcast(&self, message: Message) -> Result<()> {
        for dest in (0..self.peers.len()).filter(|&r| r != self.rank) {
            self.send(dest, message.clone())?;
        }
        Ok(())
    }

    fn recv(&self) -> Result<Message> {
        self.inbox
            .recv()
            .map_err(|_| Error::transport("inbox disconnected"))
    }

    fn try_recv(&self) -> Result<Option<Message>> {
        match self.inbox.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(Error::transport("inbox disconnected")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_to_point_and_broadcast() {
        let eps = LocalCluster::new(3);
        assert_eq!(eps[2].size(), 3);
        assert!(eps[0].is_root());

        eps[1].send(0, Message::Done(1)).unwrap();
        eps[1].send(0, Message::BestTour(vec![0, 2, 1])).unwrap();
        assert_eq!(eps[0].recv().unwrap(), Message::Done(1));
        assert_eq!(eps[0].try_recv().unwrap(), Some(Message::BestTour(vec![0, 2, 1])));
        assert_eq!(eps[0].try_recv().unwrap(), None);

        eps[0].broadcast(Message::Terminate).unwrap();
        assert_eq!(eps[0].try_recv().unwrap(), None);
        assert_eq!(eps[1].recv().unwrap(), Message::Terminate);
        assert_eq!(eps[2].recv().unwrap(), Message::Terminate);

        eps[2].send(2, Message::Done(2)).unwrap();
        assert_eq!(eps[2].recv().unwrap(), Message::Done(2));
        assert!(eps[0].send(5, Message::Terminate).is_err());
    }
}
