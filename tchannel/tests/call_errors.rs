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

//! Call-scoped failures.
//!
//! None of these close the connection: every test checks that the same
//! connection keeps serving calls afterwards.

mod common;

use common::{bounded, client, eventually, request, server, SERVICE};
use std::time::Duration;
use tchannel::{Channel, ChannelConfig, ErrorType, Request, ResponseCode};
use std::net::SocketAddr;

async fn assert_still_usable(client: &Channel, addr: SocketAddr) {
    let response = bounded(client.send(request("echo", "h", "still here"), addr))
        .await
        .unwrap();
    assert_eq!(response.body(), "still here");
    assert_eq!(client.stats().connections_out, 1);
}

#[tokio::test]
async fn test_timeout() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    let slow = Request::builder(SERVICE, "sleep")
        .body("10000")
        .timeout(Duration::from_millis(100))
        .build();
    let error = bounded(client.send(slow, addr)).await.unwrap_err();
    assert_eq!(error.error_type(), ErrorType::Timeout);
    assert!(error.is_retryable());

    let peer = client.peer_manager().peer(addr).unwrap();
    assert_eq!(peer.best_connection().unwrap().pending_calls(), 0);
    assert_still_usable(&client, addr).await;

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_default_timeout_applies() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default().with_default_timeout(Duration::from_millis(100)));

    let error = bounded(client.send(request("sleep", "", "10000"), addr))
        .await
        .unwrap_err();
    assert_eq!(error.error_type(), ErrorType::Timeout);

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_bad_request_keeps_connection() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    let error = bounded(client.send(request("missing", "", ""), addr))
        .await
        .unwrap_err();
    assert_eq!(error.error_type(), ErrorType::BadRequest);
    assert!(error.message().contains("missing"));
    assert_still_usable(&client, addr).await;

    let unknown_service = Request::builder("nobody", "echo").build();
    let error = bounded(client.send(unknown_service, addr)).await.unwrap_err();
    assert_eq!(error.error_type(), ErrorType::BadRequest);
    assert_still_usable(&client, addr).await;

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_handler_fault() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    let error = bounded(client.send(request("fail", "", ""), addr))
        .await
        .unwrap_err();
    assert_eq!(error.error_type(), ErrorType::UnexpectedError);
    assert_eq!(error.message(), "boom");
    assert_still_usable(&client, addr).await;

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_handler_panic() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    let error = bounded(client.send(request("panic", "", ""), addr))
        .await
        .unwrap_err();
    assert_eq!(error.error_type(), ErrorType::UnexpectedError);
    assert!(error.message().contains("handler exploded"));
    assert_still_usable(&client, addr).await;

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_handler_answers_with_call_error() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    let error = bounded(client.send(request("busy", "", ""), addr))
        .await
        .unwrap_err();
    assert_eq!(error.error_type(), ErrorType::Busy);
    assert_eq!(error.message(), "try again later");

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_application_error_is_a_response() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());

    let response = bounded(client.send(request("reject", "why", ""), addr))
        .await
        .unwrap();
    assert!(!response.is_ok());
    assert_eq!(response.code(), ResponseCode::Error);
    assert_eq!(response.header(), "why");
    assert_eq!(response.body(), "rejected");

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_cancel_stops_remote_handler() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default());
    assert_still_usable(&client, addr).await;
    eventually("echo buffers to be released", || server.live_buffers() == 0).await;

    let call = client.send(request("sleep", "", "10000"), addr);
    eventually("call to reach the server", || server.live_buffers() > 0).await;

    call.cancel();
    let error = bounded(call).await.unwrap_err();
    assert_eq!(error.error_type(), ErrorType::Cancelled);
    eventually("server handler to be aborted", || server.live_buffers() == 0).await;
    assert_still_usable(&client, addr).await;

    client.shutdown().await;
    server.shutdown().await;
}

#[tokio::test]
async fn test_busy_when_pending_limit_reached() {
    let (server, addr) = server(ChannelConfig::default()).await;
    let client = client(ChannelConfig::default().with_max_pending_calls(1));
    assert_still_usable(&client, addr).await;

    let slow = client.send(request("sleep", "", "300"), addr);
    eventually("slow call to be pending", || {
        client
            .peer_manager()
            .peer(addr)
            .and_then(|peer| peer.best_connection())
            .is_some_and(|connection| connection.pending_calls() == 1)
    })
    .await;

    let error = bounded(client.send(request("echo", "", ""), addr))
        .await
        .unwrap_err();
    assert_eq!(error.error_type(), ErrorType::Busy);

    let response = bounded(slow).await.unwrap();
    assert_eq!(response.body(), "300");
    assert_still_usable(&client, addr).await;

    client.shutdown().await;
    server.shutdown().await;
}
