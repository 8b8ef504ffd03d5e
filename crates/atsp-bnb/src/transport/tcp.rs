use std::{
    io::{BufRead, BufReader, BufWriter, Write},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    sync::Mutex,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use serde::{Deserialize, Serialize};

use super::{Message, Transport, ROOT};
use crate::{Error, Result};

const CONNECT_RETRY: Duration = Duration::from_millis(100);

/// One line of JSON per frame.
#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    Hello { rank: usize, size: usize },
    Message(Message),
}

/// Star topology over TCP: every rank keeps one connection to the root.
///
/// Each connection gets a reader thread that feeds a shared inbox, so
/// `recv`/`try_recv` behave like the in-process transport.
pub struct TcpTransport {
    rank: usize,
    size: usize,
    inbox_tx: Sender<Message>,
    inbox: Receiver<Message>,
    // Indexed by rank: every non-root rank on the root, only the root elsewhere.
    links: Vec<Option<Mutex<BufWriter<TcpStream>>>>,
}

impl TcpTransport {
    /// Root side: accepts one connection from every other rank.
    pub fn bind_root(listener: TcpListener, size: usize) -> Result<Self> {
        let (inbox_tx, inbox) = unbounded();
        let mut links: Vec<Option<Mutex<BufWriter<TcpStream>>>> =
            (0..size).map(|_| None).collect();

        log::info!(
            "root waiting for {} peers on {}",
            size.saturating_sub(1),
            listener.local_addr()?
        );
        let mut connected = 1;
        while connected < size {
            let (stream, addr) = listener.accept()?;
            stream.set_nodelay(true)?;
            let mut reader = BufReader::new(stream.try_clone()?);
            let rank = match read_frame(&mut reader)? {
                Some(Frame::Hello { rank, size: theirs }) if theirs == size => rank,
                Some(Frame::Hello { size: theirs, .. }) => {
                    return Err(Error::transport(format!(
                        "peer {addr} expects {theirs} processes, root has {size}"
                    )))
                }
                _ => return Err(Error::transport(format!("peer {addr} sent no hello"))),
            };
            if rank == ROOT || rank >= size || links[rank].is_some() {
                return Err(Error::transport(format!("peer {addr} claims invalid rank {rank}")));
            }
            log::debug!("rank {rank} connected from {addr}");
            spawn_reader(rank, reader, inbox_tx.clone())?;
            links[rank] = Some(Mutex::new(BufWriter::new(stream)));
            connected += 1;
        }

        Ok(Self {
            rank: ROOT,
            size,
            inbox_tx,
            inbox,
            links,
        })
    }

    /// Non-root side: connects to the root, retrying until `timeout` while
    /// the root is still starting up.
    pub fn connect(
        addr: impl ToSocketAddrs,
        rank: usize,
        size: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if rank == ROOT || rank >= size {
            return Err(Error::invalid_config(format!(
                "rank {rank} can't connect to a root of {size} processes"
            )));
        }
        let addrs: Vec<_> = addr.to_socket_addrs()?.collect();
        let deadline = Instant::now() + timeout;
        let stream = loop {
            match TcpStream::connect(addrs.as_slice()) {
                Ok(stream) => break stream,
                Err(e) if Instant::now() < deadline => {
                    log::trace!("root not reachable yet: {e}");
                    thread::sleep(CONNECT_RETRY);
                }
                Err(e) => return Err(e.into()),
            }
        };
        stream.set_nodelay(true)?;

        let mut writer = BufWriter::new(stream.try_clone()?);
        write_frame(&mut writer, &Frame::Hello { rank, size })?;

        let (inbox_tx, inbox) = unbounded();
        spawn_reader(ROOT, BufReader::new(stream), inbox_tx.clone())?;

        let mut links: Vec<Option<Mutex<BufWriter<TcpStream>>>> =
            (0..size).map(|_| None).collect();
        links[ROOT] = Some(Mutex::new(writer));
        log::info!("rank {rank} connected to root");

        Ok(Self {
            rank,
            size,
            inbox_tx,
            inbox,
            links,
        })
    }
}

fn spawn_reader(
    peer: usize,
    mut reader: BufReader<TcpStream>,
    inbox: Sender<Message>,
) -> Result<()> {
    thread::Builder::new()
        .name(format!("atsp-link-{peer}"))
        .spawn(move || {
            let reason = loop {
                match read_frame(&mut reader) {
                    Ok(Some(Frame::Message(message))) => {
                        if inbox.send(message).is_err() {
                            return;
                        }
                    }
                    Ok(Some(Frame::Hello { .. })) => {
                        log::warn!("unexpected hello from rank {peer}")
                    }
                    Ok(None) => {
                        log::debug!("link to rank {peer} closed");
                        break "link closed".to_owned();
                    }
                    Err(e) => {
                        log::warn!("dropping link to rank {peer}: {e}");
                        break format!("link failed: {e}");
                    }
                }
            };
            // A listener still waiting on this peer must not block forever.
            // After Terminate nobody reads the inbox, so this is a no-op.
            let _ = inbox.send(Message::Abort { rank: peer, reason });
        })?;
    Ok(())
}

fn read_frame(reader: &mut impl BufRead) -> Result<Option<Frame>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line.trim_end())?))
}

fn write_frame(writer: &mut impl Write, frame: &Frame) -> Result<()> {
    serde_json::to_writer(&mut *writer, frame)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

impl Transport for TcpTransport {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn send(&self, dest: usize, message: Message) -> Result<()> {
        if dest == self.rank {
            return self
                .inbox_tx
                .send(message)
                .map_err(|_| Error::transport("inbox disconnected"));
        }
        let link = self
            .links
            .get(dest)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::transport(format!("no link from {} to {dest}", self.rank)))?;
        let mut writer = link.lock()?;
        write_frame(&mut *writer, &Frame::Message(message))
    }

    fn broadcast(&self, message: Message) -> Result<()> {
        if self.rank != ROOT {
            return Err(Error::transport("only the root broadcasts"));
        }
        // Keep going past a dead link so the remaining ranks still hear it.
        let mut first_error = None;
        for dest in 1..self.size {
            if let Err(e) = self.send(dest, message.clone()) {
                log::warn!("broadcast to rank {dest} failed: {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
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
