//! OLE Automation interfaces (MS-OAUT)

/// Route `$opnum` to `$server.$method`, decoding into `$op`
macro_rules! route {
    ($builder:expr, $server:expr, $opnum:expr, $op:ty, $method:ident) => {{
        let server = ::std::sync::Arc::clone(&$server);
        $builder.operation($opnum, move |ctx, stub| {
            let server = ::std::sync::Arc::clone(&server);
            async move {
                let call = &ctx;
                ::dcerpc::dispatch(call, stub, |mut op: $op| async move {
                    op.response = server
                        .$method(call, op.request.clone())
                        .await?;
                    Ok(op)
                })
                .await
            }
        })
    }};
}

pub mod itypeinfo;
pub mod itypeinfo2;
pub mod types;

pub use itypeinfo::{TypeInfoClient, TypeInfoServer, UnimplementedTypeInfoServer};
pub use itypeinfo2::{TypeInfo2Client, TypeInfo2Server};
