//! Connection seam between the pipeline runner and the store.
//!
//! The runner only relies on one property of a connection: replies come back
//! in the order requests were submitted, one per request. `RespConnection`
//! gets that from a single TCP stream speaking RESP2.

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use redis_protocol::codec::Resp2;
use redis_protocol::resp2::types::BytesFrame;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::command::Request;
use crate::reply::Reply;

/// One ordered request/response channel to the store.
#[async_trait]
pub trait Connection: Send + 'static {
    /// Queue a request without waiting for its reply.
    async fn submit(&mut self, req: &Request) -> anyhow::Result<()>;

    /// Push every queued request onto the wire.
    async fn flush(&mut self) -> anyhow::Result<()>;

    /// Wait for the reply to the oldest request that has not been answered yet.
    async fn receive_next(&mut self) -> anyhow::Result<Reply>;
}

/// Opens connections for workers during setup.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection;

    async fn connect(&self) -> anyhow::Result<Self::Conn>;
}

/// Connects to a RESP endpoint (`host:port`) over TCP.
#[derive(Clone, Debug)]
pub struct RespConnector {
    endpoint: String,
}

impl RespConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Connector for RespConnector {
    type Conn = RespConnection;

    async fn connect(&self) -> anyhow::Result<RespConnection> {
        RespConnection::connect(&self.endpoint).await
    }
}

/// RESP2 connection backed by a framed TCP stream.
pub struct RespConnection {
    framed: Framed<TcpStream, Resp2>,
    closed: bool,
}

impl RespConnection {
    pub async fn connect(node: &str) -> anyhow::Result<Self> {
        let socket = TcpStream::connect(node)
            .await
            .with_context(|| format!("connect to {node}"))?;
        socket.set_nodelay(true).ok();
        Ok(Self {
            framed: Framed::new(socket, Resp2::default()),
            closed: false,
        })
    }
}

#[async_trait]
impl Connection for RespConnection {
    async fn submit(&mut self, req: &Request) -> anyhow::Result<()> {
        anyhow::ensure!(!self.closed, "connection closed");
        self.framed
            .feed(request_frame(req))
            .await
            .with_context(|| format!("queue {}", req.key()))?;
        Ok(())
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.closed, "connection closed");
        <Framed<TcpStream, Resp2> as SinkExt<BytesFrame>>::flush(&mut self.framed)
            .await
            .context("flush pipeline")?;
        Ok(())
    }

    async fn receive_next(&mut self) -> anyhow::Result<Reply> {
        anyhow::ensure!(!self.closed, "connection closed");
        match self.framed.next().await {
            Some(Ok(frame)) => Ok(Reply::from(frame)),
            Some(Err(err)) => {
                // A decode error leaves the stream position unknown.
                self.closed = true;
                Err(anyhow::Error::new(err).context("recv failed"))
            }
            None => {
                self.closed = true;
                anyhow::bail!("connection closed")
            }
        }
    }
}

/// Encode a request as a RESP command array.
pub fn request_frame(req: &Request) -> BytesFrame {
    match req {
        Request::Get { key } => BytesFrame::Array(vec![
            BytesFrame::BulkString(Bytes::from_static(b"GET")),
            BytesFrame::BulkString(Bytes::from(key.as_bytes().to_vec())),
        ]),
        Request::Set { key, value } => BytesFrame::Array(vec![
            BytesFrame::BulkString(Bytes::from_static(b"SET")),
            BytesFrame::BulkString(Bytes::from(key.as_bytes().to_vec())),
            BytesFrame::BulkString(Bytes::from(value.as_bytes().to_vec())),
        ]),
    }
}
