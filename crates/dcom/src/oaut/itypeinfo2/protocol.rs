//! ITypeInfo2 wire protocol

use crate::oaut::types::TypeKind;
use crate::types::{read_orpc_header, write_orpc_header, OrpcThat, OrpcThis};
use dcerpc::{Operation, SyntaxId, Uuid};
use midl_ndr::{NdrReader, NdrWriter};

pub const TYPE_INFO2_UUID: Uuid = Uuid::from_fields(
    0x0002_0412,
    0x0000,
    0x0000,
    [0xc0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const TYPE_INFO2_SYNTAX: SyntaxId = SyntaxId::new(TYPE_INFO2_UUID, 0, 0);

/// Operation numbers for ITypeInfo2
pub mod opnum {
    /// First opnum past ITypeInfo
    pub const BASE: u16 = crate::oaut::itypeinfo::opnum::COUNT;

    pub const GET_TYPE_KIND: u16 = 22;
    pub const GET_TYPE_FLAGS: u16 = 23;
    pub const GET_FUNC_INDEX_OF_MEM_ID: u16 = 24;
    pub const GET_VAR_INDEX_OF_MEM_ID: u16 = 25;
    pub const GET_CUST_DATA: u16 = 26;
    pub const GET_DOCUMENTATION2: u16 = 34;
    pub const GET_ALL_CUST_DATA: u16 = 35;

    pub const COUNT: u16 = 37;
}

/// `GetTypeKind` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetTypeKindRequest {
    pub this: OrpcThis,
}

/// `GetTypeKind` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetTypeKindResponse {
    pub that: OrpcThat,
    pub type_kind: TypeKind,
    pub ret: i32,
}

#[derive(Debug, Default)]
pub struct GetTypeKindOperation {
    pub request: GetTypeKindRequest,
    pub response: GetTypeKindResponse,
}

impl Operation for GetTypeKindOperation {
    fn opnum(&self) -> u16 {
        opnum::GET_TYPE_KIND
    }

    fn name(&self) -> &'static str {
        "/ITypeInfo2/v0/GetTypeKind"
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.request.this)
    }

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.request.this)
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.response.that)?;
        w.write_value(&self.response.type_kind)?;
        w.write_data(self.response.ret);
        Ok(())
    }

    fn unmarshal_response<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.response.that)?;
        r.read_value(&mut self.response.type_kind)?;
        self.response.ret = r.read_data()?;
        Ok(())
    }

    fn status(&self) -> u32 {
        self.response.ret as u32
    }
}

/// `GetTypeFlags` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetTypeFlagsRequest {
    pub this: OrpcThis,
}

/// `GetTypeFlags` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetTypeFlagsResponse {
    pub that: OrpcThat,
    /// TYPEFLAGS bits
    pub type_flags: u32,
    pub ret: i32,
}

#[derive(Debug, Default)]
pub struct GetTypeFlagsOperation {
    pub request: GetTypeFlagsRequest,
    pub response: GetTypeFlagsResponse,
}

impl Operation for GetTypeFlagsOperation {
    fn opnum(&self) -> u16 {
        opnum::GET_TYPE_FLAGS
    }

    fn name(&self) -> &'static str {
        "/ITypeInfo2/v0/GetTypeFlags"
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.request.this)
    }

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.request.this)
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.response.that)?;
        w.write_data(self.response.type_flags);
        w.write_data(self.response.ret);
        Ok(())
    }

    fn unmarshal_response<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.response.that)?;
        self.response.type_flags = r.read_data()?;
        self.response.ret = r.read_data()?;
        Ok(())
    }

    fn status(&self) -> u32 {
        self.response.ret as u32
    }
}
