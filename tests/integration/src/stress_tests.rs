//! Stress Tests - Concurrent ORPC Calls at Scale
//!
//! These tests exercise race conditions and concurrency issues by:
//! - Multiplexing many in-flight calls over one association
//! - Running many clients, each with its own session, against one server
//! - Switching IPIDs between calls sharing a connection
//! - Measuring throughput and latency

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};
use futures::future::join_all;
use tokio::sync::Barrier;

use common::*;
use dcerpc::{CallOptions, ClientConfig};
use dcom::oaut::itypeinfo::GetNamesRequest;
use dcom::oaut::itypeinfo2::GetTypeKindRequest;
use dcom::oaut::types::TypeKind;
use dcom::{ClientOptions, TypeInfo2Client, TypeInfoClient};

fn print_stats(title: &str, stats: &ConcurrentStats, expected: u64, elapsed: Duration) {
    let success = stats.success_count();
    println!("\n=== {} ===", title);
    println!("Total expected: {}", expected);
    println!("Successful: {} ({:.2}%)", success, (success as f64 / expected as f64) * 100.0);
    println!("Failed: {}", stats.failure_count());
    println!("Throughput: {:.0} calls/s", success as f64 / elapsed.as_secs_f64());
    println!("Avg latency: {:?}", stats.avg_latency());
    println!("Min latency: {:?}", stats.min_latency());
    println!("Max latency: {:?}", stats.max_latency());
}

/// Test: many concurrent calls sharing one association
/// Responses must find their callers by call id regardless of order
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_multiplexed_calls_one_association() {
    init_logging();

    const CALLS: usize = 500;

    let (server, shapes, _) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(shapes))
        .await
        .unwrap();

    let stats = Arc::new(ConcurrentStats::new());
    let start = Instant::now();

    let handles: Vec<_> = (0..CALLS)
        .map(|i| {
            let client = client.clone();
            let stats = Arc::clone(&stats);
            tokio::spawn(async move {
                // alternate between the two functions and vary the name limit
                let (member_id, expected) = if i % 2 == 0 {
                    (0x6002_0000, 1 + (i / 2) % 4)
                } else {
                    (0x6002_0001, 1)
                };
                let request = GetNamesRequest {
                    member_id,
                    max_names: expected as u32,
                    ..Default::default()
                };
                let call_start = Instant::now();
                match client.get_names(request, &CallOptions::new()).await {
                    Ok(resp) if resp.names.len() == expected => {
                        stats.record_success(call_start.elapsed())
                    }
                    Ok(resp) => {
                        eprintln!("call {}: {} names, expected {}", i, resp.names.len(), expected);
                        stats.record_failure();
                    }
                    Err(e) => {
                        eprintln!("call {} failed: {}", i, e);
                        stats.record_failure();
                    }
                }
            })
        })
        .collect();
    join_all(handles).await;

    print_stats("Multiplexed Calls", &stats, CALLS as u64, start.elapsed());
    assert_eq!(stats.success_count(), CALLS as u64);
    assert_eq!(server.server.stats().snapshot().connections_accepted, 1);
}

/// Test: many clients, each on its own TCP session
/// This tests association setup racing with calls on other associations
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_many_clients() {
    init_logging();

    const NUM_CLIENTS: usize = 32;
    const REQUESTS_PER_CLIENT: usize = 50;

    let (server, shapes, colors) = start_type_library_server().await.unwrap();
    let addr = server.addr;
    let stats = Arc::new(ConcurrentStats::new());
    let barrier = Arc::new(Barrier::new(NUM_CLIENTS));
    let start = Instant::now();

    let mut client_handles = Vec::new();
    for client_id in 0..NUM_CLIENTS {
        let stats = Arc::clone(&stats);
        let barrier = Arc::clone(&barrier);

        client_handles.push(tokio::spawn(async move {
            barrier.wait().await;

            let (ipid, kind) = if client_id % 2 == 0 {
                (shapes, TypeKind::Dispatch)
            } else {
                (colors, TypeKind::Interface)
            };
            let client = match connect(addr, ClientConfig::default()).await {
                Ok(cc) => TypeInfo2Client::new(&cc, ClientOptions::new().with_ipid(ipid)).await,
                Err(e) => Err(e.into()),
            };
            let client = match client {
                Ok(client) => client,
                Err(e) => {
                    eprintln!("Client {} failed to connect: {}", client_id, e);
                    stats.record_failure();
                    return;
                }
            };

            for req_id in 0..REQUESTS_PER_CLIENT {
                let call_start = Instant::now();
                match client
                    .get_type_kind(GetTypeKindRequest::default(), &CallOptions::new())
                    .await
                {
                    Ok(resp) if resp.type_kind == kind => stats.record_success(call_start.elapsed()),
                    Ok(resp) => {
                        eprintln!(
                            "Client {} request {}: got {:?}, expected {:?}",
                            client_id, req_id, resp.type_kind, kind
                        );
                        stats.record_failure();
                    }
                    Err(e) => {
                        eprintln!("Client {} request {} failed: {}", client_id, req_id, e);
                        stats.record_failure();
                    }
                }
            }
        }));
    }
    join_all(client_handles).await;

    let total_expected = (NUM_CLIENTS * REQUESTS_PER_CLIENT) as u64;
    print_stats("Many Clients", &stats, total_expected, start.elapsed());
    assert_eq!(stats.success_count(), total_expected);
    assert_eq!(stats.failure_count(), 0);
}

/// Test: IPID switching between concurrent calls on one connection
/// Each call must reach the object its own client addresses
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_ipids() {
    init_logging();

    const ROUNDS: usize = 100;

    let (server, shapes, colors) = start_type_library_server().await.unwrap();
    let cc = connect(server.addr, ClientConfig::default()).await.unwrap();
    let shapes_client = TypeInfo2Client::new(&cc, ClientOptions::new().with_ipid(shapes))
        .await
        .unwrap();
    let colors_client = shapes_client.with_ipid(Some(colors));

    let calls = (0..ROUNDS).map(|i| {
        let (client, kind) = if i % 2 == 0 {
            (&shapes_client, TypeKind::Dispatch)
        } else {
            (&colors_client, TypeKind::Interface)
        };
        async move {
            let resp = client
                .get_type_kind(GetTypeKindRequest::default(), &CallOptions::new())
                .await
                .unwrap();
            assert_eq!(resp.type_kind, kind, "round {}", i);
        }
    });
    join_all(calls).await;
}
