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

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Once;
use std::time::Duration;
use tchannel::{CallError, Channel, ChannelBuilder, ChannelConfig, HandlerError, Request, Response};

/// Service name every test server registers its handlers under.
pub const SERVICE: &str = "server";

static TRACING: Once = Once::new();

/// Installs a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A listening channel serving the test handlers under [`SERVICE`]:
///
/// - `echo` returns the request's header and body
/// - `sleep` waits for the number of milliseconds in the body, then echoes
/// - `fail` returns a plain error
/// - `panic` panics
/// - `busy` answers with a `Busy` call error
/// - `reject` returns an application error response
pub async fn server(config: ChannelConfig) -> (Channel, SocketAddr) {
    init_tracing();
    let channel = ChannelBuilder::new(SERVICE)
        .config(config)
        .build()
        .expect("valid server config");
    channel
        .make_sub_channel(SERVICE)
        .register_fn("echo", |request: Request| async move {
            Ok::<_, HandlerError>(echo(&request))
        })
        .register_fn("sleep", |request: Request| async move {
            let millis: u64 = request.body().to_string_lossy().parse()?;
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok::<_, HandlerError>(echo(&request))
        })
        .register_fn("fail", |_request: Request| async move {
            Err::<Response, HandlerError>("boom".into())
        })
        .register_fn("panic", |_request: Request| async move {
            if true {
                panic!("handler exploded");
            }
            Ok::<_, HandlerError>(Response::default())
        })
        .register_fn("busy", |_request: Request| async move {
            Err::<Response, HandlerError>(Box::new(CallError::busy("try again later")))
        })
        .register_fn("reject", |request: Request| async move {
            Ok::<_, HandlerError>(Response::application_error(
                request.header().clone(),
                "rejected",
            ))
        });
    let addr = channel.listen().await.expect("server listens");
    (channel, addr)
}

/// A non-listening client channel.
pub fn client(config: ChannelConfig) -> Channel {
    init_tracing();
    ChannelBuilder::new("client")
        .config(config)
        .build()
        .expect("valid client config")
}

fn echo(request: &Request) -> Response {
    Response::new(request.header().clone(), request.body().clone())
}

/// Builds a request to `method` of the test service.
pub fn request(method: &str, header: &str, body: impl Into<tchannel::PayloadBuffer>) -> Request {
    Request::builder(SERVICE, method).header(header.to_string()).body(body).build()
}

/// An address nothing listens on.
pub async fn unused_addr() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    addr
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn eventually<F: Fn() -> bool>(what: &str, condition: F) {
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

/// Runs `future` with a generous upper bound so a hung call fails the test.
pub async fn bounded<T>(future: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), future)
        .await
        .expect("call resolved")
}
