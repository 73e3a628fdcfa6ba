//! Type library walker
//!
//! Starts the fixture server on a local port, then walks each hosted
//! object through ITypeInfo2 over one association: type kind, flags,
//! documentation, and every function with its names.
//!
//! ```text
//! RUST_LOG=debug cargo run -p integration-tests
//! ```

mod common;

use common::*;
use dcerpc::status::{self, hresult};
use dcerpc::{CallOptions, ClientConfig};
use dcom::oaut::itypeinfo::{
    doc_flags, GetDocumentationRequest, GetFuncDescRequest, GetNamesRequest,
};
use dcom::oaut::itypeinfo2::{GetTypeFlagsRequest, GetTypeKindRequest};
use dcom::oaut::types::MEMBER_ID_NIL;
use dcom::{ClientOptions, Ipid, TypeInfo2Client};
use midl_ndr::BString;

type BoxError = Box<dyn std::error::Error>;

fn text(s: Option<BString>) -> String {
    s.map(BString::into_string).unwrap_or_default()
}

async fn describe_object(client: &TypeInfo2Client, ipid: Ipid) -> Result<(), BoxError> {
    let opts = CallOptions::new();
    let kind = client
        .get_type_kind(GetTypeKindRequest::default(), &opts)
        .await?;
    let flags = client
        .get_type_flags(GetTypeFlagsRequest::default(), &opts)
        .await?;
    let type_info = client.type_info();
    let doc = type_info
        .get_documentation(
            GetDocumentationRequest {
                member_id: MEMBER_ID_NIL,
                flags: doc_flags::ALL,
                ..Default::default()
            },
            &opts,
        )
        .await?;

    println!("\n{} ({:?}) ipid {}", text(doc.name), kind.type_kind, ipid);
    println!("  flags 0x{:08x}", flags.type_flags);
    if let Some(doc_string) = doc.doc_string {
        println!("  doc   {}", doc_string);
    }

    for index in 0.. {
        let desc = match type_info
            .get_func_desc(
                GetFuncDescRequest {
                    index,
                    ..Default::default()
                },
                &opts,
            )
            .await
        {
            Ok(resp) => resp.func_desc,
            Err(e) if e.status() == Some(hresult::TYPE_E_ELEMENTNOTFOUND) => break,
            Err(e) => return Err(e.into()),
        };
        let Some(desc) = desc else { break };

        let param_count = desc.params.as_ref().map_or(0, Vec::len);
        let names = type_info
            .get_names(
                GetNamesRequest {
                    member_id: desc.member_id,
                    max_names: param_count as u32 + 1,
                    ..Default::default()
                },
                &opts,
            )
            .await?;
        let mut names = names.names.into_iter().map(text);
        let name = names.next().unwrap_or_default();
        let params: Vec<String> = names.collect();
        println!(
            "  [{}] 0x{:08x} {}({}) {:?}/{:?}",
            index,
            desc.member_id,
            name,
            params.join(", "),
            desc.func_kind,
            desc.invoke_kind
        );

        match type_info
            .get_documentation(
                GetDocumentationRequest {
                    member_id: desc.member_id,
                    flags: doc_flags::DOC_STRING,
                    ..Default::default()
                },
                &opts,
            )
            .await
        {
            Ok(doc) => {
                if let Some(doc_string) = doc.doc_string {
                    println!("      {}", doc_string);
                }
            }
            Err(e) => match e.status() {
                Some(code) => println!(
                    "      no documentation ({})",
                    status::describe(code).unwrap_or("unknown status")
                ),
                None => return Err(e.into()),
            },
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    init_logging();

    let (server, shapes, colors) = start_type_library_server().await?;
    println!("Type library server on {}", server.addr);

    let cc = connect(server.addr, ClientConfig::default()).await?;
    let client = TypeInfo2Client::new(&cc, ClientOptions::new().with_ipid(shapes)).await?;
    for ipid in [shapes, colors] {
        describe_object(&client.with_ipid(Some(ipid)), ipid).await?;
    }
    cc.close().await?;

    let stats = server.server.stats().snapshot();
    println!(
        "\n{} requests processed, {} failed, {} bytes in, {} bytes out",
        stats.requests_processed, stats.requests_failed, stats.bytes_received, stats.bytes_sent
    );
    Ok(())
}
