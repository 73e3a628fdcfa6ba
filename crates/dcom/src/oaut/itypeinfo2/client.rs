//! ITypeInfo2 client

use super::protocol::*;
use crate::client::{self, ClientOptions};
use crate::oaut::itypeinfo::TypeInfoClient;
use crate::types::{CallResult, Ipid, Result};
use dcerpc::{CallOptions, Conn, SyntaxId};
use std::fmt;
use std::sync::Arc;

/// Client for ITypeInfo2; the ITypeInfo methods live on [`Self::type_info`]
#[derive(Clone)]
pub struct TypeInfo2Client {
    base: TypeInfoClient,
    cc: Arc<dyn Conn>,
    ipid: Option<Ipid>,
}

impl TypeInfo2Client {
    pub async fn new(cc: &Arc<dyn Conn>, opts: ClientOptions) -> Result<Self> {
        let cc = cc.bind(&[TYPE_INFO2_SYNTAX]).await?;
        let client = Self::superclass(cc);
        Ok(match opts.ipid {
            Some(ipid) => client.with_ipid(Some(ipid)),
            None => client,
        })
    }

    pub fn superclass(cc: Arc<dyn Conn>) -> Self {
        Self {
            base: TypeInfoClient::superclass(Arc::clone(&cc)),
            cc,
            ipid: None,
        }
    }

    pub fn with_ipid(&self, ipid: Option<Ipid>) -> Self {
        let base = self.base.with_ipid(ipid);
        Self {
            ipid: base.ipid(),
            base,
            cc: Arc::clone(&self.cc),
        }
    }

    pub fn ipid(&self) -> Option<Ipid> {
        self.ipid
    }

    pub fn type_info(&self) -> &TypeInfoClient {
        &self.base
    }

    pub async fn alter_context(&self, syntaxes: &[SyntaxId]) -> Result<()> {
        Ok(self.cc.alter_context(syntaxes).await?)
    }

    pub fn conn(&self) -> &Arc<dyn Conn> {
        &self.cc
    }

    pub async fn get_type_kind(
        &self,
        request: GetTypeKindRequest,
        opts: &CallOptions,
    ) -> CallResult<GetTypeKindResponse> {
        let op = GetTypeKindOperation {
            request,
            ..Default::default()
        };
        client::invoke(&*self.cc, self.ipid, op, opts)
            .await
            .map(|op| op.response)
            .map_err(|e| e.map_partial(|op| op.response))
    }

    pub async fn get_type_flags(
        &self,
        request: GetTypeFlagsRequest,
        opts: &CallOptions,
    ) -> CallResult<GetTypeFlagsResponse> {
        let op = GetTypeFlagsOperation {
            request,
            ..Default::default()
        };
        client::invoke(&*self.cc, self.ipid, op, opts)
            .await
            .map(|op| op.response)
            .map_err(|e| e.map_partial(|op| op.response))
    }
}

impl fmt::Debug for TypeInfo2Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo2Client")
            .field("session", &self.cc.session_id())
            .field("ipid", &self.ipid)
            .finish()
    }
}
