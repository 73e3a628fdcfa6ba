//! IUnknown (MS-DCOM 3.1.1.5.8)
//!
//! Root of every DCOM interface. Its three methods never travel on the
//! wire: reference counting goes through IRemUnknown instead. Opnums
//! 0..=2 therefore exist in every derived interface but are reserved.

use crate::client::ClientOptions;
use crate::types::{Ipid, Result};
use dcerpc::{Conn, InterfaceBuilder, OperationTable, SyntaxId, Uuid};
use std::fmt;
use std::sync::Arc;

pub const UNKNOWN_SYNTAX: SyntaxId = SyntaxId::new(
    Uuid::from_fields(
        0x0000_0000,
        0x0000,
        0x0000,
        [0xc0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
    ),
    0,
    0,
);

/// Opnums IUnknown occupies in every derived interface
pub const UNKNOWN_OPNUM_COUNT: u16 = 3;

/// Client for IUnknown, embedded by every derived interface client
#[derive(Clone)]
pub struct UnknownClient {
    cc: Arc<dyn Conn>,
    ipid: Option<Ipid>,
}

impl UnknownClient {
    /// Bind IUnknown on `cc` and build a client for it
    pub async fn new(cc: &Arc<dyn Conn>, opts: ClientOptions) -> Result<Self> {
        let cc = cc.bind(&[UNKNOWN_SYNTAX]).await?;
        let client = Self::superclass(cc);
        Ok(match opts.ipid {
            Some(ipid) => client.with_ipid(Some(ipid)),
            None => client,
        })
    }

    /// Base client sharing a derived client's already-bound connection
    pub fn superclass(cc: Arc<dyn Conn>) -> Self {
        Self { cc, ipid: None }
    }

    /// Address another object over the same connection.
    ///
    /// `None` selects the all-zero IPID.
    pub fn with_ipid(&self, ipid: Option<Ipid>) -> Self {
        Self {
            cc: Arc::clone(&self.cc),
            ipid: Some(ipid.unwrap_or(Ipid::NIL)),
        }
    }

    pub fn ipid(&self) -> Option<Ipid> {
        self.ipid
    }

    pub async fn alter_context(&self, syntaxes: &[SyntaxId]) -> Result<()> {
        Ok(self.cc.alter_context(syntaxes).await?)
    }

    pub fn conn(&self) -> &Arc<dyn Conn> {
        &self.cc
    }
}

impl fmt::Debug for UnknownClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnknownClient")
            .field("session", &self.cc.session_id())
            .field("ipid", &self.ipid)
            .finish()
    }
}

/// Server side of IUnknown: three reserved slots
pub fn unknown_server_handle() -> OperationTable {
    (0..UNKNOWN_OPNUM_COUNT)
        .fold(InterfaceBuilder::from_syntax(UNKNOWN_SYNTAX), |b, opnum| {
            b.reserved(opnum)
        })
        .opnum_count(UNKNOWN_OPNUM_COUNT)
        .build_table()
}
