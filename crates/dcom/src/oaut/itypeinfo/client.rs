//! ITypeInfo client

use super::protocol::*;
use crate::client::{self, ClientOptions};
use crate::iunknown::UnknownClient;
use crate::types::{CallResult, Ipid, Result};
use dcerpc::{CallOptions, Conn, Operation, SyntaxId};
use std::fmt;
use std::sync::Arc;

/// Client for ITypeInfo, layered over [`UnknownClient`]
#[derive(Clone)]
pub struct TypeInfoClient {
    base: UnknownClient,
    cc: Arc<dyn Conn>,
    ipid: Option<Ipid>,
}

impl TypeInfoClient {
    /// Bind ITypeInfo on `cc` and build a client for it
    pub async fn new(cc: &Arc<dyn Conn>, opts: ClientOptions) -> Result<Self> {
        let cc = cc.bind(&[TYPE_INFO_SYNTAX]).await?;
        let client = Self::superclass(cc);
        Ok(match opts.ipid {
            Some(ipid) => client.with_ipid(Some(ipid)),
            None => client,
        })
    }

    /// Client over a connection a derived interface has already bound
    pub fn superclass(cc: Arc<dyn Conn>) -> Self {
        Self {
            base: UnknownClient::superclass(Arc::clone(&cc)),
            cc,
            ipid: None,
        }
    }

    /// Address another object; the embedded IUnknown client follows.
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

    pub fn unknown(&self) -> &UnknownClient {
        &self.base
    }

    pub async fn alter_context(&self, syntaxes: &[SyntaxId]) -> Result<()> {
        Ok(self.cc.alter_context(syntaxes).await?)
    }

    pub fn conn(&self) -> &Arc<dyn Conn> {
        &self.cc
    }

    async fn call<O: Operation>(&self, op: O, opts: &CallOptions) -> CallResult<O> {
        client::invoke(&*self.cc, self.ipid, op, opts).await
    }

    pub async fn get_func_desc(
        &self,
        request: GetFuncDescRequest,
        opts: &CallOptions,
    ) -> CallResult<GetFuncDescResponse> {
        let op = GetFuncDescOperation {
            request,
            ..Default::default()
        };
        self.call(op, opts)
            .await
            .map(|op| op.response)
            .map_err(|e| e.map_partial(|op| op.response))
    }

    pub async fn get_names(
        &self,
        request: GetNamesRequest,
        opts: &CallOptions,
    ) -> CallResult<GetNamesResponse> {
        let op = GetNamesOperation {
            request,
            ..Default::default()
        };
        self.call(op, opts)
            .await
            .map(|op| op.response)
            .map_err(|e| e.map_partial(|op| op.response))
    }

    pub async fn get_ref_type_of_impl_type(
        &self,
        request: GetRefTypeOfImplTypeRequest,
        opts: &CallOptions,
    ) -> CallResult<GetRefTypeOfImplTypeResponse> {
        let op = GetRefTypeOfImplTypeOperation {
            request,
            ..Default::default()
        };
        self.call(op, opts)
            .await
            .map(|op| op.response)
            .map_err(|e| e.map_partial(|op| op.response))
    }

    pub async fn get_impl_type_flags(
        &self,
        request: GetImplTypeFlagsRequest,
        opts: &CallOptions,
    ) -> CallResult<GetImplTypeFlagsResponse> {
        let op = GetImplTypeFlagsOperation {
            request,
            ..Default::default()
        };
        self.call(op, opts)
            .await
            .map(|op| op.response)
            .map_err(|e| e.map_partial(|op| op.response))
    }

    pub async fn get_documentation(
        &self,
        request: GetDocumentationRequest,
        opts: &CallOptions,
    ) -> CallResult<GetDocumentationResponse> {
        let op = GetDocumentationOperation {
            request,
            ..Default::default()
        };
        self.call(op, opts)
            .await
            .map(|op| op.response)
            .map_err(|e| e.map_partial(|op| op.response))
    }

    pub async fn get_mops(
        &self,
        request: GetMopsRequest,
        opts: &CallOptions,
    ) -> CallResult<GetMopsResponse> {
        let op = GetMopsOperation {
            request,
            ..Default::default()
        };
        self.call(op, opts)
            .await
            .map(|op| op.response)
            .map_err(|e| e.map_partial(|op| op.response))
    }
}

impl fmt::Debug for TypeInfoClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfoClient")
            .field("session", &self.cc.session_id())
            .field("ipid", &self.ipid)
            .finish()
    }
}
