use std::{sync::Arc, time::Duration};

use kv_loadgen::{
    client::RemoteClient,
    common::TimeoutOptions,
    harness::{Harness, HarnessOptions},
    server::KvServer,
    store::{KvStore, MemoryStore},
};

fn init_tracing() {
    // Several tests share the process; only the first install wins.
    let _ = tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(tracing::Level::INFO)
            .finish(),
    );
}

async fn start_server() -> (KvServer<MemoryStore>, Arc<MemoryStore>, String) {
    let store = Arc::new(MemoryStore::new());
    let mut server = KvServer::new(store.clone(), TimeoutOptions::default());
    let addr = server.listen("127.0.0.1:0").await.unwrap();
    (server, store, addr.to_string())
}

#[tokio::test]
async fn test_client_put_get() {
    init_tracing();
    let (mut server, store, addr) = start_server().await;

    let client = RemoteClient::connect(&addr, TimeoutOptions::default())
        .await
        .unwrap();
    client.put("keykeykey1", "value one").await.unwrap();
    client.put("keykeykey1", "value two").await.unwrap();
    assert_eq!(
        client.get("keykeykey1").await.unwrap(),
        Some("value two".to_string())
    );
    assert_eq!(client.get("missing").await.unwrap(), None);
    assert_eq!(store.len().await, 1);

    server.stop().await;
}

#[tokio::test]
async fn test_client_times_out_on_silent_server() {
    // Accepts connections but never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let holder = tokio::spawn(async move {
        let (_stream, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    let options = TimeoutOptions {
        read_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let client = RemoteClient::connect(&addr, options).await.unwrap();
    let err = client.get("keykeykey1").await.unwrap_err();
    assert!(matches!(err, kv_loadgen::error::BenchError::Timeout(_)));
    holder.abort();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_harness_over_tcp() {
    init_tracing();
    let (mut server, store, addr) = start_server().await;

    let client = RemoteClient::connect(&addr, TimeoutOptions::default())
        .await
        .unwrap();
    let options = HarnessOptions {
        num_ops: 2_000,
        read_prob: 70,
        key_space: 300,
        seed: Some(3),
        ..Default::default()
    };
    let harness = Harness::new(client, options).unwrap();
    let (summary, _) = harness.run_with_sink(Vec::new()).await.unwrap();

    assert_eq!(summary.gets + summary.puts, 2_000);
    assert_eq!(store.len().await, 300);
    assert_eq!(
        store.get("keykeykey0").await.unwrap(),
        Some("this is a test value 0".to_string())
    );
    assert_eq!(
        summary.samples.iter().map(|s| s.ops).sum::<u64>(),
        2_000
    );

    server.stop().await;
}
