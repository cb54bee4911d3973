//! Link from the manager to one storage node
//!
//! Each accepted node connection is owned by a single [`NodeConnection`]
//! task. Everything else talks to it through a cloneable [`NodeHandle`],
//! so request/response exchanges on the socket never interleave. While idle
//! the task watches the socket: the node never speaks first, so readable
//! data or EOF outside an exchange means the node is gone.

use crate::common::codec::{read_message, write_message};
use crate::common::{Command, Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};

pub type NodeId = u64;

/// Requests queued per node before senders wait
const REQUEST_QUEUE: usize = 64;

/// One command awaiting the node's reply
pub struct NodeRequest {
    pub command: Command,
    pub respond_to: oneshot::Sender<Result<String>>,
}

#[derive(Debug, Clone)]
pub struct NodeHandle {
    id: NodeId,
    addr: SocketAddr,
    tx: mpsc::Sender<NodeRequest>,
}

impl NodeHandle {
    /// Handle plus the receiving end its owner must serve
    pub fn channel(id: NodeId, addr: SocketAddr) -> (Self, mpsc::Receiver<NodeRequest>) {
        let (tx, rx) = mpsc::channel(REQUEST_QUEUE);
        (Self { id, addr, tx }, rx)
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send a command and wait for the node's reply.
    ///
    /// Any failure to deliver or to get an answer is reported as
    /// [`Error::NodeUnavailable`] or the underlying transport error.
    pub async fn request(&self, command: Command) -> Result<String> {
        let (respond_to, response) = oneshot::channel();
        self.tx
            .send(NodeRequest {
                command,
                respond_to,
            })
            .await
            .map_err(|_| Error::NodeUnavailable(self.id))?;

        response
            .await
            .map_err(|_| Error::NodeUnavailable(self.id))?
    }
}

pub struct NodeConnection {
    id: NodeId,
    stream: TcpStream,
    requests: mpsc::Receiver<NodeRequest>,
    timeout: Duration,
}

/// Wrap an accepted storage connection
pub fn connect(
    id: NodeId,
    addr: SocketAddr,
    stream: TcpStream,
    timeout: Duration,
) -> (NodeHandle, NodeConnection) {
    let (handle, requests) = NodeHandle::channel(id, addr);
    let connection = NodeConnection {
        id,
        stream,
        requests,
        timeout,
    };
    (handle, connection)
}

impl NodeConnection {
    /// Serve queued requests until `stop` resolves, the node disconnects,
    /// or an exchange fails. Returns `Ok` only when stopped deliberately.
    pub async fn run<F>(self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let NodeConnection {
            id,
            stream,
            mut requests,
            timeout,
        } = self;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => {
                    tracing::debug!(node_id = id, "node connection released");
                    return Ok(());
                }
                request = requests.recv() => {
                    let Some(request) = request else {
                        return Ok(());
                    };
                    let result = exchange(&mut reader, &mut writer, &request.command, timeout).await;
                    let failure = result.as_ref().err().map(|e| e.to_string());
                    let _ = request.respond_to.send(result);
                    if let Some(reason) = failure {
                        return Err(Error::ConnectionFailed(format!("node {}: {}", id, reason)));
                    }
                }
                idle = idle_read(&mut reader) => {
                    let reason = match idle {
                        Ok(0) => "closed by peer".to_string(),
                        Ok(n) => format!("{} unsolicited bytes", n),
                        Err(e) => e.to_string(),
                    };
                    return Err(Error::ConnectionFailed(format!("node {}: {}", id, reason)));
                }
            }
        }
    }
}

/// One request/response round trip, bounded by `timeout`
async fn exchange<R, W>(
    reader: &mut R,
    writer: &mut W,
    command: &Command,
    timeout: Duration,
) -> Result<String>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let round_trip = async {
        write_message(writer, command).await?;
        match read_message::<_, String>(reader).await? {
            Some(response) => Ok(response),
            None => Err(Error::ConnectionFailed("closed during request".into())),
        }
    };

    tokio::time::timeout(timeout, round_trip)
        .await
        .map_err(|_| Error::Timeout(format!("no reply within {:?}", timeout)))?
}

/// Resolves once the idle socket has data or reached EOF. Cancel safe.
async fn idle_read<R>(reader: &mut R) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    Ok(reader.fill_buf().await?.len())
}
