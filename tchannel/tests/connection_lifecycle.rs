//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Connection lifecycle over real TCP loopback.
//!
//! Covers the echo round trip, the `connections.in` / `connections.out`
//! counters on both sides, connect failures, remote resets and shutdown.

mod common;

use common::{bounded, client, eventually, request, server, unused_addr};
use std::net::SocketAddr;
use std::time::Duration;
use tchannel::peer::{CONNECTIONS_IN, CONNECTIONS_OUT};
use tchannel::{ChannelConfig, ErrorType, Request};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Accepts TCP connections and holds them open without ever answering.
async fn silent_listener() -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    (addr, task)
}

/// Drops the first connection it accepts and relays every later one to
/// `target`.
async fn flaky_relay(target: SocketAddr) -> (SocketAddr, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let task = tokio::spawn(async move {
        let mut first = true;
        while let Ok((mut inbound, _)) = listener.accept().await {
            if std::mem::take(&mut first) {
                drop(inbound);
                continue;
            }
            tokio::spawn(async move {
                if let Ok(mut outbound) = TcpStream::connect(target).await {
                    let _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await;
                }
            });
        }
    });
    (addr, task)
}

#[tokio::test]
async fn test_echo_round_trip_and_stats() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    let response = bounded(client.send(request("echo", "H", "B"), addr))
        .await
        .unwrap();
    assert!(response.is_ok());
    assert_eq!(response.header(), "H");
    assert_eq!(response.body(), "B");
    assert_eq!(response.method(), "echo");

    let client_stats = client.stats();
    assert_eq!(client_stats.get(CONNECTIONS_OUT), Some(1));
    assert_eq!(client_stats.get(CONNECTIONS_IN), Some(0));
    eventually("server to count the inbound connection", || {
        server.stats().connections_in == 1
    })
    .await;
    assert_eq!(server.stats().connections_out, 0);

    client.shutdown().await;
    assert!(client.stats().is_zero());
    eventually("server to drop the closed connection", || server.stats().is_zero()).await;

    server.shutdown().await;
    assert!(server.stats().is_zero());
}

#[tokio::test]
async fn test_sequential_calls_share_one_connection() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    for i in 0..10 {
        let body = format!("call-{i}");
        let response = bounded(client.send(request("echo", "", body.clone()), addr))
            .await
            .unwrap();
        assert_eq!(response.body().to_string_lossy(), body);
    }
    assert_eq!(client.stats().connections_out, 1);
    let peer = client.peer_manager().peer(addr).unwrap();
    assert_eq!(peer.connections().len(), 1);

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_concurrent_first_calls_share_one_connection() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    let calls: Vec<_> = (0..16)
        .map(|i| client.send(request("echo", "", format!("{i}")), addr))
        .collect();
    for (i, call) in calls.into_iter().enumerate() {
        let response = bounded(call).await.unwrap();
        assert_eq!(response.body().to_string_lossy(), i.to_string());
    }
    assert_eq!(client.stats().connections_out, 1);

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_connect_failure_is_not_a_timeout() {
    let client = client(ChannelConfig::default());
    let addr = unused_addr().await;

    let error = bounded(client.send(request("echo", "", "x"), addr))
        .await
        .unwrap_err();
    assert_eq!(error.error_type(), ErrorType::NetworkError);
    assert_eq!(error.message(), "Failed to connect to the host");
    assert!(client.stats().is_zero());
    assert!(client.peer_manager().peer(addr).is_none());

    client.shutdown().await;
}

#[tokio::test]
async fn test_server_shutdown_fails_pending_calls() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    bounded(client.send(request("echo", "", ""), addr)).await.unwrap();
    eventually("echo buffers to be released", || server.live_buffers() == 0).await;
    let pending = client.send(request("sleep", "", "10000"), addr);
    eventually("call to reach the server", || server.live_buffers() > 0).await;

    server.shutdown().await;
    let error = bounded(pending).await.unwrap_err();
    assert_eq!(error.error_type(), ErrorType::NetworkError);
    assert_eq!(error.message(), "Connection was reset");
    eventually("client to drop the reset connection", || client.stats().is_zero()).await;

    // With nothing listening any more the next call cannot connect.
    let error = bounded(client.send(request("echo", "", ""), addr))
        .await
        .unwrap_err();
    assert_eq!(error.message(), "Failed to connect to the host");

    client.shutdown().await;
}

#[tokio::test]
async fn test_client_shutdown_fails_its_pending_calls() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    let pending = client.send(request("sleep", "", "10000"), addr);
    eventually("call to reach the server", || server.live_buffers() > 0).await;

    client.shutdown().await;
    let error = bounded(pending).await.unwrap_err();
    assert_eq!(error.error_type(), ErrorType::NetworkError);
    assert_eq!(error.message(), "Connection was closed");

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());
    bounded(client.send(request("echo", "", ""), addr)).await.unwrap();

    client.shutdown().await;
    assert!(client.stats().is_zero());
    client.shutdown().await;
    assert!(client.stats().is_zero());
    assert!(client.is_shut_down());

    server.shutdown().await;
    server.shutdown().await;
    assert!(server.stats().is_zero());
}

#[tokio::test]
async fn test_calls_after_shutdown_fail_fast() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());
    client.shutdown().await;

    let error = bounded(client.send(request("echo", "", ""), addr))
        .await
        .unwrap_err();
    assert_eq!(error.error_type(), ErrorType::NetworkError);

    server.shutdown().await;
}

#[tokio::test]
async fn test_unanswered_init_is_network_error() {
    let (addr, listener) = silent_listener().await;
    let client = client(ChannelConfig::default());

    let short = Request::builder(common::SERVICE, "echo")
        .timeout(Duration::from_millis(300))
        .build();
    let error = bounded(client.send(short, addr)).await.unwrap_err();
    assert_eq!(error.error_type(), ErrorType::NetworkError);
    assert_eq!(error.message(), "Failed to connect to the host");

    // The default call timeout is shorter than the init exchange timeout.
    let error = bounded(client.send(request("echo", "", ""), addr))
        .await
        .unwrap_err();
    assert_eq!(error.error_type(), ErrorType::NetworkError);
    assert_eq!(error.message(), "Failed to connect to the host");
    assert!(client.stats().is_zero());

    client.shutdown().await;
    listener.abort();
}

#[tokio::test]
async fn test_connection_after_failed_attempt_is_tracked() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let (relay, relay_task) = flaky_relay(addr).await;
    let client = client(ChannelConfig::default());

    let (first, second) = tokio::join!(
        client.send(request("echo", "", "one"), relay),
        client.send(request("echo", "", "two"), relay),
    );
    let failures = [&first, &second].iter().filter(|result| result.is_err()).count();
    assert!(failures <= 1, "first={first:?} second={second:?}");
    if let Err(error) = first.as_ref().and(second.as_ref()) {
        assert_eq!(error.error_type(), ErrorType::NetworkError);
    }

    let response = bounded(client.send(request("echo", "", "three"), relay))
        .await
        .unwrap();
    assert_eq!(response.body(), "three");
    assert_eq!(client.stats().connections_out, 1);
    assert!(client.peer_manager().peer(relay).is_some());

    client.shutdown().await;
    assert!(client.stats().is_zero());
    eventually("server to drop the relayed connection", || {
        server.stats().connections_in == 0
    })
    .await;

    server.shutdown().await;
    relay_task.abort();
}
