//! Fragmentation Tests - Large ORPC Responses
//!
//! These tests push type information that does not fit one PDU:
//! - GetNames responses spanning many fragments
//! - Small fragment sizes negotiated by either side
//! - Big-endian data representation end to end
//! - Fragmented responses under concurrent load

mod common;

use futures::future::join_all;
use std::time::Instant;

use common::*;
use dcerpc::{CallOptions, ConnectionBuilder, DceRpcServerConfig};
use dcom::oaut::itypeinfo::{GetFuncDescRequest, GetNamesRequest};
use dcom::{ClientOptions, Ipid, TypeInfoClient};

const WIDE_MEMBER: i32 = 0x6002_0000;
const PARAM_COUNT: usize = 300;

fn param_names() -> Vec<String> {
    (0..PARAM_COUNT)
        .map(|i| format!("parameter_with_a_long_descriptive_name_{:04}", i))
        .collect()
}

/// One type whose only function takes `PARAM_COUNT` parameters
fn wide_library(ipid: Ipid) -> TypeLibrary {
    let params = param_names();
    let params: Vec<&str> = params.iter().map(String::as_str).collect();
    let mut entry = colors_type();
    entry.name = "IWide".to_string();
    entry.functions = vec![FunctionEntry::method(WIDE_MEMBER, "Configure", &params)];
    TypeLibrary::new().with_object(ipid, entry)
}

async fn start_wide_server(config: DceRpcServerConfig) -> (TestServer, Ipid) {
    let ipid = Ipid::generate();
    let server = start_test_server(config, type_library_interfaces(wide_library(ipid)))
        .await
        .unwrap();
    (server, ipid)
}

async fn fetch_names(client: &TypeInfoClient) -> Vec<String> {
    let resp = client
        .get_names(
            GetNamesRequest {
                member_id: WIDE_MEMBER,
                max_names: PARAM_COUNT as u32 + 1,
                ..Default::default()
            },
            &CallOptions::new(),
        )
        .await
        .unwrap();
    resp.names
        .into_iter()
        .map(|n| n.map(|n| n.into_string()).unwrap_or_default())
        .collect()
}

fn expected_names() -> Vec<String> {
    let mut names = vec!["Configure".to_string()];
    names.extend(param_names());
    names
}

/// Test: a response far larger than one fragment
#[tokio::test]
async fn test_large_names_response() {
    init_logging();

    let (server, ipid) = start_wide_server(DceRpcServerConfig::default()).await;
    let config = ConnectionBuilder::new().max_frag(1024, 1024).config().clone();
    let cc = connect(server.addr, config).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(ipid))
        .await
        .unwrap();

    let start = Instant::now();
    let names = fetch_names(&client).await;
    println!("{} names in {:?}", names.len(), start.elapsed());

    assert_eq!(names, expected_names());
    let stats = server.server.stats().snapshot();
    assert!(stats.bytes_sent > 16 * 1024, "sent {} bytes", stats.bytes_sent);
}

/// Test: the server caps fragments below the client's offer
#[tokio::test]
async fn test_server_small_fragments() {
    init_logging();

    let config = DceRpcServerConfig {
        max_xmit_frag: 512,
        max_recv_frag: 512,
        ..Default::default()
    };
    let (server, ipid) = start_wide_server(config).await;
    let cc = connect(server.addr, Default::default()).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(ipid))
        .await
        .unwrap();

    assert_eq!(fetch_names(&client).await, expected_names());
}

/// Test: big-endian NDR in both directions
#[tokio::test]
async fn test_big_endian_fragments() {
    init_logging();

    let (server, ipid) = start_wide_server(DceRpcServerConfig::default()).await;
    let config = ConnectionBuilder::new()
        .max_frag(2048, 2048)
        .big_endian()
        .config()
        .clone();
    let cc = connect(server.addr, config).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(ipid))
        .await
        .unwrap();

    assert_eq!(fetch_names(&client).await, expected_names());

    let desc = client
        .get_func_desc(GetFuncDescRequest::default(), &CallOptions::new())
        .await
        .unwrap()
        .func_desc
        .unwrap();
    assert_eq!(desc.member_id, WIDE_MEMBER);
    assert_eq!(desc.params.map(|p| p.len()), Some(PARAM_COUNT));
}

/// Test: interleaved fragmented responses on one association
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_fragmented_calls() {
    init_logging();

    const CALLS: usize = 16;

    let (server, ipid) = start_wide_server(DceRpcServerConfig::default()).await;
    let config = ConnectionBuilder::new().max_frag(1024, 1024).config().clone();
    let cc = connect(server.addr, config).await.unwrap();
    let client = TypeInfoClient::new(&cc, ClientOptions::new().with_ipid(ipid))
        .await
        .unwrap();

    let expected = expected_names();
    let results = join_all((0..CALLS).map(|_| fetch_names(&client))).await;
    for names in results {
        assert_eq!(names, expected);
    }
    assert_eq!(server.server.stats().snapshot().requests_processed, CALLS as u64);
}
