use arrayref::array_ref;
use byteorder::{ByteOrder, LittleEndian};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::Error;

/// On-the-wire size of a [`Request`].
pub const REQUEST_LEN: usize = 8;
/// On-the-wire size of a [`Response`].
pub const RESPONSE_LEN: usize = 16;

/// What a client wants done to the shared counter. The discriminants are
/// part of the wire format.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Write = 0,
    Read = 1,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "writer",
            Self::Read => "reader",
        }
    }
}

impl TryFrom<i32> for Operation {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Error> {
        match value {
            0 => Ok(Self::Write),
            1 => Ok(Self::Read),
            other => Err(Error::UnknownOperation(other)),
        }
    }
}

/// One round trip's question: `operation | requester`, little-endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    pub requester: u32,
}

impl Request {
    pub fn encode(&self) -> [u8; REQUEST_LEN] {
        let mut buf = [0u8; REQUEST_LEN];
        LittleEndian::write_i32(&mut buf[0..4], self.operation as i32);
        LittleEndian::write_u32(&mut buf[4..8], self.requester);
        buf
    }

    pub fn decode(buf: &[u8; REQUEST_LEN]) -> Result<Self, Error> {
        let operation =
            Operation::try_from(LittleEndian::read_i32(array_ref![buf, 0, 4]))?;
        let requester = LittleEndian::read_u32(array_ref![buf, 4, 4]);
        Ok(Self {
            operation,
            requester,
        })
    }
}

/// One round trip's answer: `operation | counter | latency_nanos`,
/// little-endian. `counter` is `-1` when the store operation failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Response {
    pub operation: Operation,
    pub counter: i32,
    pub latency_nanos: i64,
}

impl Response {
    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        let mut buf = [0u8; RESPONSE_LEN];
        LittleEndian::write_i32(&mut buf[0..4], self.operation as i32);
        LittleEndian::write_i32(&mut buf[4..8], self.counter);
        LittleEndian::write_i64(&mut buf[8..16], self.latency_nanos);
        buf
    }

    pub fn decode(buf: &[u8; RESPONSE_LEN]) -> Result<Self, Error> {
        let operation =
            Operation::try_from(LittleEndian::read_i32(array_ref![buf, 0, 4]))?;
        Ok(Self {
            operation,
            counter: LittleEndian::read_i32(array_ref![buf, 4, 4]),
            latency_nanos: LittleEndian::read_i64(array_ref![buf, 8, 8]),
        })
    }
}

/// A byte stream speaking the fixed-size request/response protocol.
///
/// Messages need no framing beyond their fixed length. A zero-length read
/// before the first byte of a message is a graceful peer close and surfaces
/// as `Ok(None)`; running dry mid-message is a transport error.
pub struct MessageStream<S>(S);

impl<S> MessageStream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self(stream)
    }

    pub async fn send_request(&mut self, req: &Request) -> Result<(), Error> {
        self.0.write_all(&req.encode()).await?;
        Ok(())
    }

    pub async fn send_response(&mut self, resp: &Response) -> Result<(), Error> {
        self.0.write_all(&resp.encode()).await?;
        Ok(())
    }

    pub async fn recv_request(&mut self) -> Result<Option<Request>, Error> {
        let mut buf = [0u8; REQUEST_LEN];
        if !self.fill(&mut buf).await? {
            return Ok(None);
        }
        Request::decode(&buf).map(Some)
    }

    pub async fn recv_response(&mut self) -> Result<Option<Response>, Error> {
        let mut buf = [0u8; RESPONSE_LEN];
        if !self.fill(&mut buf).await? {
            return Ok(None);
        }
        Response::decode(&buf).map(Some)
    }

    /// Fills `buf` completely, returning `false` on a clean close before
    /// the first byte.
    async fn fill(&mut self, buf: &mut [u8]) -> Result<bool, Error> {
        let n = self.0.read(buf).await?;
        if n == 0 {
            return Ok(false);
        }
        self.0.read_exact(&mut buf[n..]).await?;
        Ok(true)
    }
}
