use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::{net::TcpStream, sync::Mutex, time::timeout};
use tracing::debug;

use crate::{
    common::{recv_len, send_data, TimeoutOptions},
    error::BenchError,
    message::{
        decode_text, request_frame, Decode, Encode, GetRequest, PutRequest, ReqType, RespHeader,
        RespType, RESP_HEADER_SIZE,
    },
    store::KvStore,
};

/// Client for a remote key-value server.
///
/// Requests are sent one at a time over a single connection and each
/// response must echo the sequence number of its request.
pub struct RemoteClient {
    /// The TCP stream for the connection.
    stream: Mutex<TcpStream>,
    /// Options for the timeout of the connection
    timeout_options: TimeoutOptions,
    /// Next request sequence number
    seq: AtomicU64,
}

impl RemoteClient {
    /// Connect to the server at `addr`.
    pub async fn connect(addr: &str, timeout_options: TimeoutOptions) -> Result<Self, BenchError> {
        let stream = match timeout(timeout_options.write_timeout, TcpStream::connect(addr)).await {
            Ok(result) => result.map_err(|err| {
                BenchError::Io(format!("Failed to connect to {}: {}", addr, err))
            })?,
            Err(_) => {
                return Err(BenchError::Timeout(format!(
                    "Timeout to connect to {}",
                    addr
                )))
            }
        };
        stream.set_nodelay(true)?;
        debug!("Connected to {}", addr);

        Ok(Self {
            stream: Mutex::new(stream),
            timeout_options,
            seq: AtomicU64::new(0),
        })
    }

    /// Send one request and wait for its response.
    async fn call(
        &self,
        req_type: ReqType,
        body: &[u8],
    ) -> Result<(RespType, Vec<u8>), BenchError> {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let frame = request_frame(seq, req_type, body);

        let mut stream = self.stream.lock().await;
        send_data(&mut *stream, &frame, self.timeout_options.write_timeout).await?;

        let header_buffer = recv_len(
            &mut *stream,
            RESP_HEADER_SIZE,
            self.timeout_options.read_timeout,
        )
        .await?;
        let header = RespHeader::decode(&header_buffer)?;
        debug!("Received response header: {:?}", header);
        if header.seq != seq {
            return Err(BenchError::Protocol(format!(
                "Response sequence mismatch: {} != {}",
                header.seq, seq
            )));
        }

        let resp_body =
            recv_len(&mut *stream, header.len, self.timeout_options.read_timeout).await?;
        Ok((header.resp_type, resp_body))
    }
}

#[async_trait]
impl KvStore for RemoteClient {
    async fn put(&self, key: &str, value: &str) -> Result<(), BenchError> {
        let body = PutRequest {
            key: key.to_string(),
            value: value.to_string(),
        }
        .encode();
        match self.call(ReqType::Put, &body).await? {
            (RespType::Stored, _) => Ok(()),
            (RespType::Error, msg) => Err(BenchError::Store(decode_text(&msg)?)),
            (other, _) => Err(BenchError::Protocol(format!(
                "Unexpected response to put: {:?}",
                other
            ))),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, BenchError> {
        let body = GetRequest {
            key: key.to_string(),
        }
        .encode();
        match self.call(ReqType::Get, &body).await? {
            (RespType::Value, value) => Ok(Some(decode_text(&value)?)),
            (RespType::NotFound, _) => Ok(None),
            (RespType::Error, msg) => Err(BenchError::Store(decode_text(&msg)?)),
            (other, _) => Err(BenchError::Protocol(format!(
                "Unexpected response to get: {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::{io::AsyncWriteExt, net::TcpListener};

    use super::*;
    use crate::message::{response_frame, ReqHeader, REQ_HEADER_SIZE};

    /// Accept one connection and answer every request with `reply(header)`.
    async fn scripted_server<F>(reply: F) -> String
    where
        F: Fn(&ReqHeader) -> Vec<u8> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let read_timeout = std::time::Duration::from_secs(5);
            while let Ok(buf) = recv_len(&mut stream, REQ_HEADER_SIZE, read_timeout).await {
                let header = ReqHeader::decode(&buf).unwrap();
                let _ = recv_len(&mut stream, header.len, read_timeout).await.unwrap();
                stream.write_all(&reply(&header)).await.unwrap();
            }
        });
        addr
    }

    #[tokio::test]
    async fn test_store_error_is_surfaced() {
        let addr =
            scripted_server(|h| response_frame(h.seq, RespType::Error, b"read only")).await;
        let client = RemoteClient::connect(&addr, TimeoutOptions::default())
            .await
            .unwrap();
        assert_eq!(
            client.put("k", "v").await,
            Err(BenchError::Store("read only".to_string()))
        );
    }

    #[tokio::test]
    async fn test_sequence_mismatch() {
        let addr = scripted_server(|h| response_frame(h.seq + 1, RespType::Stored, &[])).await;
        let client = RemoteClient::connect(&addr, TimeoutOptions::default())
            .await
            .unwrap();
        assert!(matches!(
            client.put("k", "v").await,
            Err(BenchError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_unexpected_response_type() {
        let addr = scripted_server(|h| response_frame(h.seq, RespType::Stored, &[])).await;
        let client = RemoteClient::connect(&addr, TimeoutOptions::default())
            .await
            .unwrap();
        assert!(matches!(client.get("k").await, Err(BenchError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(RemoteClient::connect(&addr, TimeoutOptions::default())
            .await
            .is_err());
    }
}
