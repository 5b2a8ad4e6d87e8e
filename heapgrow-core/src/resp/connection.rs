use super::{Command, RespCodec, Value};
use crate::error::{HeapgrowError, Result};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// One client connection; pipelining is `send` several times, `flush`, then `receive` as many
pub struct Connection {
    framed: Framed<TcpStream, RespCodec>,
    addr: String,
}

impl Connection {
    pub async fn open(addr: &str, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| HeapgrowError::ConnectTimeout(addr.to_string()))?
            .map_err(|source| HeapgrowError::Connect { addr: addr.to_string(), source })?;
        stream.set_nodelay(true)?;

        log::debug!("Connected to {}", addr);
        Ok(Self { framed: Framed::new(stream, RespCodec), addr: addr.to_string() })
    }

    /// Reuse the connection parked in `slot`, or open a fresh one
    ///
    /// Callers park it back only after a successful exchange, so a failed
    /// connection is dropped and the next call reconnects.
    pub async fn take_or_open(
        slot: &mut Option<Connection>,
        addr: &str,
        timeout: Duration,
    ) -> Result<Self> {
        match slot.take() {
            Some(conn) => Ok(conn),
            None => Self::open(addr, timeout).await,
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Queue a command without flushing
    pub async fn send(&mut self, cmd: Command) -> Result<()> {
        self.framed.feed(cmd).await
    }

    pub async fn flush(&mut self) -> Result<()> {
        SinkExt::<Command>::flush(&mut self.framed).await
    }

    /// Next reply; server error replies become [`HeapgrowError::Server`]
    pub async fn receive(&mut self) -> Result<Value> {
        match self.receive_raw().await? {
            Value::Error(msg) => Err(HeapgrowError::Server(msg)),
            value => Ok(value),
        }
    }

    /// Next reply exactly as the server sent it
    pub async fn receive_raw(&mut self) -> Result<Value> {
        match self.framed.next().await {
            Some(frame) => frame,
            None => Err(HeapgrowError::ConnectionClosed),
        }
    }

    /// Send one command and wait for its reply
    pub async fn query(&mut self, cmd: Command) -> Result<Value> {
        log::trace!("{} <- {}", self.addr, cmd);
        self.send(cmd).await?;
        self.flush().await?;
        self.receive().await
    }

    /// Like [`Connection::query`], for commands that answer `+OK`
    pub async fn query_ok(&mut self, cmd: Command) -> Result<()> {
        let name = cmd.name();
        match self.query(cmd).await? {
            Value::Simple(s) if s.eq_ignore_ascii_case("OK") => Ok(()),
            other => Err(HeapgrowError::UnexpectedReply { command: name, reply: other.to_string() }),
        }
    }

    pub async fn close(mut self) -> Result<()> {
        SinkExt::<Command>::close(&mut self.framed).await
    }
}
