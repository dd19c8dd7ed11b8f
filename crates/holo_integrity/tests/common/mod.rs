//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use holo_integrity::{Anomaly, Connection, Connector, Reply, Request};
use redis_protocol::codec::Resp2;
use redis_protocol::resp2::types::BytesFrame;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::Receiver;
use tokio_util::codec::Framed;

/// Misbehavior injected by the in-memory store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    None,
    /// Acknowledge SETs without storing them.
    DropWrites,
    /// Return a different value than the one stored.
    CorruptReads,
    /// Reject every SET with an error reply.
    RejectWrites,
    /// Refuse to open connections.
    RefuseConnect,
}

/// In-memory store shared by every connection the connector opens.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    pub data: Arc<Mutex<HashMap<String, String>>>,
    pub fault: Fault,
}

impl MemoryConnector {
    pub fn with_fault(fault: Fault) -> Self {
        Self {
            fault,
            ..Self::default()
        }
    }

    pub fn stored(&self) -> usize {
        self.data.lock().expect("store lock").len()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Conn = MemoryConnection;

    async fn connect(&self) -> anyhow::Result<MemoryConnection> {
        anyhow::ensure!(self.fault != Fault::RefuseConnect, "connection refused");
        Ok(MemoryConnection {
            data: self.data.clone(),
            fault: self.fault,
            buffered: Vec::new(),
            replies: VecDeque::new(),
        })
    }
}

/// Applies requests on flush and answers them in submission order.
pub struct MemoryConnection {
    data: Arc<Mutex<HashMap<String, String>>>,
    fault: Fault,
    buffered: Vec<Request>,
    replies: VecDeque<Reply>,
}

impl MemoryConnection {
    fn apply(&self, req: Request) -> Reply {
        let mut data = self.data.lock().expect("store lock");
        match (req, self.fault) {
            (Request::Set { .. }, Fault::RejectWrites) => Reply::Error("ERR read only".into()),
            (Request::Set { .. }, Fault::DropWrites) => Reply::Status("OK".into()),
            (Request::Set { key, value }, _) => {
                data.insert(key, value);
                Reply::Status("OK".into())
            }
            (Request::Get { key }, fault) => match data.get(&key) {
                Some(v) if fault == Fault::CorruptReads => Reply::Value(format!("{v}!").into()),
                Some(v) => Reply::Value(v.clone().into()),
                None => Reply::Nil,
            },
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn submit(&mut self, req: &Request) -> anyhow::Result<()> {
        self.buffered.push(req.clone());
        Ok(())
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        for req in std::mem::take(&mut self.buffered) {
            let reply = self.apply(req);
            self.replies.push_back(reply);
        }
        Ok(())
    }

    async fn receive_next(&mut self) -> anyhow::Result<Reply> {
        self.replies
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("no outstanding request"))
    }
}

/// Drain every report already sent on the channel.
pub fn drain(rx: &mut Receiver<Anomaly>) -> Vec<Anomaly> {
    let mut out = Vec::new();
    while let Ok(anomaly) = rx.try_recv() {
        out.push(anomaly);
    }
    out
}

/// Behavior of the test RESP server.
#[derive(Clone, Copy, Debug, Default)]
pub struct ServerOptions {
    /// Answer every GET with nil.
    pub forget_writes: bool,
    /// Close each connection after answering this many commands.
    pub close_after: Option<usize>,
}

/// Start a minimal GET/SET RESP server on an ephemeral local port.
pub async fn spawn_resp_server(options: ServerOptions) -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let data: Arc<Mutex<HashMap<Vec<u8>, Bytes>>> = Arc::default();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let data = data.clone();
            tokio::spawn(async move {
                let _ = serve_conn(socket, data, options).await;
            });
        }
    });
    Ok(addr)
}

async fn serve_conn(
    socket: TcpStream,
    data: Arc<Mutex<HashMap<Vec<u8>, Bytes>>>,
    options: ServerOptions,
) -> anyhow::Result<()> {
    let mut framed = Framed::new(socket, Resp2::default());
    let mut answered = 0usize;
    while let Some(frame) = framed.next().await {
        if options.close_after == Some(answered) {
            break;
        }
        let resp = match command_parts(frame?) {
            Some(parts) if parts.len() == 3 && parts[0].eq_ignore_ascii_case(b"SET") => {
                data.lock()
                    .expect("server lock")
                    .insert(parts[1].to_vec(), parts[2].clone());
                BytesFrame::SimpleString(Bytes::from_static(b"OK"))
            }
            Some(parts) if parts.len() == 2 && parts[0].eq_ignore_ascii_case(b"GET") => {
                let stored = data.lock().expect("server lock").get(&parts[1][..]).cloned();
                match stored {
                    Some(value) if !options.forget_writes => BytesFrame::BulkString(value),
                    _ => BytesFrame::Null,
                }
            }
            _ => BytesFrame::Error("ERR unknown command".into()),
        };
        answered += 1;
        framed.feed(resp).await?;
        <Framed<TcpStream, Resp2> as SinkExt<BytesFrame>>::flush(&mut framed).await?;
    }
    Ok(())
}

fn command_parts(frame: BytesFrame) -> Option<Vec<Bytes>> {
    let BytesFrame::Array(parts) = frame else {
        return None;
    };
    parts
        .into_iter()
        .map(|part| match part {
            BytesFrame::BulkString(b) | BytesFrame::SimpleString(b) => Some(b),
            _ => None,
        })
        .collect()
}
