use std::{net::SocketAddr, sync::Arc};

use tokio::{
    net::{TcpListener, TcpStream},
    task,
};
use tracing::{debug, error, info};

use crate::{
    common::{recv_len, send_data, TimeoutOptions},
    error::BenchError,
    message::{
        response_frame, Decode, GetRequest, PutRequest, ReqHeader, ReqType, RespType,
        REQ_HEADER_SIZE,
    },
    store::KvStore,
};

/// Apply one decoded request to `store` and build the response frame.
pub async fn handle_request<S>(store: &S, header: &ReqHeader, body: &[u8]) -> Vec<u8>
where
    S: KvStore + ?Sized,
{
    let result = match header.req_type {
        ReqType::Get => match GetRequest::decode(body) {
            Ok(req) => store.get(&req.key).await.map(|value| match value {
                Some(value) => (RespType::Value, value.into_bytes()),
                None => (RespType::NotFound, Vec::new()),
            }),
            Err(err) => Err(err),
        },
        ReqType::Put => match PutRequest::decode(body) {
            Ok(req) => store
                .put(&req.key, &req.value)
                .await
                .map(|_| (RespType::Stored, Vec::new())),
            Err(err) => Err(err),
        },
    };

    match result {
        Ok((resp_type, resp_body)) => response_frame(header.seq, resp_type, &resp_body),
        Err(err) => {
            debug!("Request {} failed: {}", header.seq, err);
            response_frame(header.seq, RespType::Error, err.to_string().as_bytes())
        }
    }
}

/// The connection for the key-value server.
pub struct KvServerConnection<S>
where
    S: KvStore + 'static,
{
    /// The TCP stream for the connection.
    stream: TcpStream,
    /// The store requests are applied to.
    store: Arc<S>,
    /// Options for the timeout of the connection
    timeout_options: TimeoutOptions,
}

impl<S> KvServerConnection<S>
where
    S: KvStore + 'static,
{
    pub fn new(stream: TcpStream, store: Arc<S>, timeout_options: TimeoutOptions) -> Self {
        Self {
            stream,
            store,
            timeout_options,
        }
    }

    /// Receive the next request header, waiting at most the idle timeout.
    async fn recv_header(&mut self) -> Result<ReqHeader, BenchError> {
        let buffer = recv_len(
            &mut self.stream,
            REQ_HEADER_SIZE,
            self.timeout_options.idle_timeout,
        )
        .await?;
        let header = ReqHeader::decode(&buffer)?;
        debug!("Received request header: {:?}", header);
        Ok(header)
    }

    /// Serve requests until the peer goes away or misbehaves.
    pub async fn run(mut self) {
        debug!("KvServerConnection::run");
        loop {
            let header = match self.recv_header().await {
                Ok(header) => header,
                Err(err) => {
                    debug!("Closing connection: {}", err);
                    return;
                }
            };
            let body =
                match recv_len(&mut self.stream, header.len, self.timeout_options.read_timeout)
                    .await
                {
                    Ok(body) => body,
                    Err(err) => {
                        error!("Failed to receive request body: {}", err);
                        return;
                    }
                };

            let resp = handle_request(self.store.as_ref(), &header, &body).await;
            if let Err(err) =
                send_data(&mut self.stream, &resp, self.timeout_options.write_timeout).await
            {
                error!("Failed to send response: {}", err);
                return;
            }
        }
    }
}

/// A TCP key-value server backed by any [`KvStore`].
pub struct KvServer<S>
where
    S: KvStore + 'static,
{
    /// Options for the timeout of the server connection
    timeout_options: TimeoutOptions,
    /// The store shared by all connections.
    store: Arc<S>,
    /// Main worker for the server
    main_worker: Option<task::JoinHandle<()>>,
}

impl<S> KvServer<S>
where
    S: KvStore + 'static,
{
    /// Create a new key-value server.
    pub fn new(store: Arc<S>, timeout_options: TimeoutOptions) -> Self {
        Self {
            timeout_options,
            store,
            main_worker: None,
        }
    }

    /// Bind `addr` and start accepting connections. Returns the bound address.
    pub async fn listen(&mut self, addr: &str) -> Result<SocketAddr, BenchError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|err| BenchError::Io(format!("Failed to bind {}: {}", addr, err)))?;
        let local_addr = listener.local_addr()?;
        info!("listening on {}", local_addr);

        let timeout_options = self.timeout_options.clone();
        let store = self.store.clone();
        let handle = task::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, peer)) => {
                        debug!("Accepted connection from {}", peer);
                        if let Err(err) = stream.set_nodelay(true) {
                            debug!("Failed to set nodelay: {}", err);
                        }
                        let conn =
                            KvServerConnection::new(stream, store.clone(), timeout_options.clone());
                        task::spawn(conn.run());
                    }
                    Err(err) => {
                        debug!("Failed to accept connection: {:?}", err);
                        continue;
                    }
                }
            }
        });

        self.main_worker = Some(handle);
        Ok(local_addr)
    }

    /// Stop accepting connections. Connections already open keep being served.
    pub async fn stop(&mut self) {
        if let Some(handle) = self.main_worker.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        message::{Encode, RespHeader, RESP_HEADER_SIZE},
        store::MemoryStore,
    };

    fn header(seq: u64, req_type: ReqType, len: usize) -> ReqHeader {
        ReqHeader {
            seq,
            req_type,
            len: len as u64,
        }
    }

    #[tokio::test]
    async fn test_handle_put_then_get() {
        let store = MemoryStore::new();
        let body = PutRequest {
            key: "a".to_string(),
            value: "b".to_string(),
        }
        .encode();
        let resp = handle_request(&store, &header(1, ReqType::Put, body.len()), &body).await;
        let resp_header = RespHeader::decode(&resp).unwrap();
        assert_eq!(resp_header.seq, 1);
        assert_eq!(resp_header.resp_type, RespType::Stored);

        let resp = handle_request(&store, &header(2, ReqType::Get, 1), b"a").await;
        let resp_header = RespHeader::decode(&resp).unwrap();
        assert_eq!(resp_header.resp_type, RespType::Value);
        assert_eq!(&resp[RESP_HEADER_SIZE as usize..], b"b");

        let resp = handle_request(&store, &header(3, ReqType::Get, 1), b"z").await;
        assert_eq!(
            RespHeader::decode(&resp).unwrap().resp_type,
            RespType::NotFound
        );
    }

    #[tokio::test]
    async fn test_handle_malformed_put() {
        let store = MemoryStore::new();
        let resp = handle_request(&store, &header(4, ReqType::Put, 2), &[0, 1]).await;
        assert_eq!(RespHeader::decode(&resp).unwrap().resp_type, RespType::Error);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_server_listen_and_stop() {
        let mut server = KvServer::new(Arc::new(MemoryStore::new()), TimeoutOptions::default());
        let addr = server.listen("127.0.0.1:0").await.unwrap();
        assert!(TcpStream::connect(addr).await.is_ok());
        server.stop().await;
        assert!(TcpStream::connect(addr).await.is_err());
    }
}
