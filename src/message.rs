use bytes::{Buf, BufMut, BytesMut};

use crate::error::BenchError;

/// The size of the request header.
pub const REQ_HEADER_SIZE: u64 = 17;
/// The size of the response header.
pub const RESP_HEADER_SIZE: u64 = 17;

/// The Encode trait is used to encode a data structure into a byte buffer.
pub trait Encode {
    fn encode(&self) -> Vec<u8>;
}

/// The Decode trait is used to decode a byte buffer into a data structure.
pub trait Decode {
    fn decode(buf: &[u8]) -> Result<Self, BenchError>
    where
        Self: Sized;
}

fn utf8(bytes: &[u8], what: &str) -> Result<String, BenchError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| BenchError::Protocol(format!("{} is not valid UTF-8", what)))
}

/// Header preceding every request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqHeader {
    /// The sequence number of the request, echoed by the response.
    pub seq: u64,
    /// The operation type of the request.
    pub req_type: ReqType,
    /// The length of the request body.
    pub len: u64,
}

/// The request type of the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReqType {
    Get,
    Put,
}

impl ReqType {
    pub fn from_u8(op: u8) -> Result<Self, BenchError> {
        match op {
            0 => Ok(Self::Get),
            1 => Ok(Self::Put),
            _ => Err(BenchError::Protocol(format!(
                "Invalid request type: {}",
                op
            ))),
        }
    }

    pub fn to_u8(&self) -> u8 {
        match self {
            Self::Get => 0,
            Self::Put => 1,
        }
    }
}

impl Encode for ReqHeader {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = BytesMut::with_capacity(REQ_HEADER_SIZE as usize);
        bytes.put_u64(self.seq);
        bytes.put_u8(self.req_type.to_u8());
        bytes.put_u64(self.len);
        bytes.to_vec()
    }
}

impl Decode for ReqHeader {
    fn decode(mut buf: &[u8]) -> Result<Self, BenchError> {
        if (buf.len() as u64) < REQ_HEADER_SIZE {
            return Err(BenchError::Protocol("Insufficient header bytes".to_string()));
        }
        let seq = buf.get_u64();
        let req_type = ReqType::from_u8(buf.get_u8())?;
        let len = buf.get_u64();
        Ok(Self { seq, req_type, len })
    }
}

/// Header preceding every response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RespHeader {
    /// The sequence number of the request being answered.
    pub seq: u64,
    /// The outcome of the request.
    pub resp_type: RespType,
    /// The length of the response body.
    pub len: u64,
}

/// The outcome carried by a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RespType {
    /// Body holds the value of the requested key.
    Value,
    /// The requested key does not exist.
    NotFound,
    /// The put was applied.
    Stored,
    /// Body holds an error message.
    Error,
}

impl RespType {
    pub fn from_u8(op: u8) -> Result<Self, BenchError> {
        match op {
            0 => Ok(Self::Value),
            1 => Ok(Self::NotFound),
            2 => Ok(Self::Stored),
            3 => Ok(Self::Error),
            _ => Err(BenchError::Protocol(format!(
                "Invalid response type: {}",
                op
            ))),
        }
    }

    pub fn to_u8(&self) -> u8 {
        match self {
            Self::Value => 0,
            Self::NotFound => 1,
            Self::Stored => 2,
            Self::Error => 3,
        }
    }
}

impl Encode for RespHeader {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = BytesMut::with_capacity(RESP_HEADER_SIZE as usize);
        bytes.put_u64(self.seq);
        bytes.put_u8(self.resp_type.to_u8());
        bytes.put_u64(self.len);
        bytes.to_vec()
    }
}

impl Decode for RespHeader {
    fn decode(mut buf: &[u8]) -> Result<Self, BenchError> {
        if (buf.len() as u64) < RESP_HEADER_SIZE {
            return Err(BenchError::Protocol("Insufficient header bytes".to_string()));
        }
        let seq = buf.get_u64();
        let resp_type = RespType::from_u8(buf.get_u8())?;
        let len = buf.get_u64();
        Ok(Self {
            seq,
            resp_type,
            len,
        })
    }
}

/// Body of a get request: the raw key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetRequest {
    pub key: String,
}

impl Encode for GetRequest {
    fn encode(&self) -> Vec<u8> {
        self.key.as_bytes().to_vec()
    }
}

impl Decode for GetRequest {
    fn decode(buf: &[u8]) -> Result<Self, BenchError> {
        Ok(Self {
            key: utf8(buf, "key")?,
        })
    }
}

/// Body of a put request: `u32` key length, key, then the value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
}

impl Encode for PutRequest {
    fn encode(&self) -> Vec<u8> {
        let mut bytes = BytesMut::with_capacity(4 + self.key.len() + self.value.len());
        bytes.put_u32(self.key.len() as u32);
        bytes.put_slice(self.key.as_bytes());
        bytes.put_slice(self.value.as_bytes());
        bytes.to_vec()
    }
}

impl Decode for PutRequest {
    fn decode(mut buf: &[u8]) -> Result<Self, BenchError> {
        if buf.len() < 4 {
            return Err(BenchError::Protocol("Insufficient put bytes".to_string()));
        }
        let key_len = buf.get_u32() as usize;
        if buf.len() < key_len {
            return Err(BenchError::Protocol(format!(
                "Put key length {} exceeds body of {} bytes",
                key_len,
                buf.len()
            )));
        }
        let (key, value) = buf.split_at(key_len);
        Ok(Self {
            key: utf8(key, "key")?,
            value: utf8(value, "value")?,
        })
    }
}

/// Build a complete request frame: header followed by body.
pub fn request_frame(seq: u64, req_type: ReqType, body: &[u8]) -> Vec<u8> {
    let mut frame = ReqHeader {
        seq,
        req_type,
        len: body.len() as u64,
    }
    .encode();
    frame.extend_from_slice(body);
    frame
}

/// Build a complete response frame: header followed by body.
pub fn response_frame(seq: u64, resp_type: RespType, body: &[u8]) -> Vec<u8> {
    let mut frame = RespHeader {
        seq,
        resp_type,
        len: body.len() as u64,
    }
    .encode();
    frame.extend_from_slice(body);
    frame
}

/// Decode a response body that carries text (a value or an error message).
pub fn decode_text(buf: &[u8]) -> Result<String, BenchError> {
    utf8(buf, "response body")
}
