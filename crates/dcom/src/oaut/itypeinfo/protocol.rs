//! ITypeInfo wire protocol (MS-OAUT 3.7.4)
//!
//! One request/response pair per method. The `*Operation` types join a
//! pair into the unit the RPC layer marshals: clients fill `request`,
//! servers fill `response`.

use crate::oaut::types::FuncDesc;
use crate::types::{read_orpc_header, write_orpc_header, OrpcThat, OrpcThis};
use dcerpc::{Operation, SyntaxId, Uuid};
use midl_ndr::{BString, NdrError, NdrReader, NdrWriter, PointerKind};

/// ITypeInfo interface UUID
pub const TYPE_INFO_UUID: Uuid = Uuid::from_fields(
    0x0002_0401,
    0x0000,
    0x0000,
    [0xc0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
);

pub const TYPE_INFO_SYNTAX: SyntaxId = SyntaxId::new(TYPE_INFO_UUID, 0, 0);

/// Operation numbers for ITypeInfo
pub mod opnum {
    pub const GET_TYPE_ATTR: u16 = 3;
    pub const GET_TYPE_COMP: u16 = 4;
    pub const GET_FUNC_DESC: u16 = 5;
    pub const GET_VAR_DESC: u16 = 6;
    pub const GET_NAMES: u16 = 7;
    pub const GET_REF_TYPE_OF_IMPL_TYPE: u16 = 8;
    pub const GET_IMPL_TYPE_FLAGS: u16 = 9;
    pub const GET_DOCUMENTATION: u16 = 12;
    pub const GET_DLL_ENTRY: u16 = 13;
    pub const GET_REF_TYPE_INFO: u16 = 14;
    pub const CREATE_INSTANCE: u16 = 16;
    pub const GET_MOPS: u16 = 17;
    pub const GET_CONTAINING_TYPE_LIB: u16 = 18;

    /// Slots that exist in the vtable but are never called remotely
    pub const NOT_USED_ON_WIRE: [u16; 6] = [10, 11, 15, 19, 20, 21];

    /// Opnums defined by ITypeInfo, IUnknown's included
    pub const COUNT: u16 = 22;
}

fn status_of(ret: i32) -> u32 {
    ret as u32
}

/// `GetFuncDesc` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetFuncDescRequest {
    pub this: OrpcThis,
    pub index: u32,
}

/// `GetFuncDesc` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetFuncDescResponse {
    pub that: OrpcThat,
    pub func_desc: Option<FuncDesc>,
    pub ret: i32,
}

#[derive(Debug, Default)]
pub struct GetFuncDescOperation {
    pub request: GetFuncDescRequest,
    pub response: GetFuncDescResponse,
}

impl Operation for GetFuncDescOperation {
    fn opnum(&self) -> u16 {
        opnum::GET_FUNC_DESC
    }

    fn name(&self) -> &'static str {
        "/ITypeInfo/v0/GetFuncDesc"
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.request.this)?;
        w.write_data(self.request.index);
        Ok(())
    }

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.request.this)?;
        self.request.index = r.read_data()?;
        Ok(())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.response.that)?;
        w.write_pointer(PointerKind::Unique, self.response.func_desc.as_ref())?;
        w.write_deferred()?;
        // pReserved
        w.write_data(0u32);
        w.write_data(self.response.ret);
        Ok(())
    }

    fn unmarshal_response<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.response.that)?;
        r.read_pointer(PointerKind::Unique, &mut self.response.func_desc)?;
        r.read_deferred()?;
        let _reserved: u32 = r.read_data()?;
        self.response.ret = r.read_data()?;
        Ok(())
    }

    fn status(&self) -> u32 {
        status_of(self.response.ret)
    }
}

/// `GetNames` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetNamesRequest {
    pub this: OrpcThis,
    pub member_id: i32,
    pub max_names: u32,
}

/// `GetNames` response
///
/// `names` holds at most `max_names` entries; the count sent back is
/// its length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetNamesResponse {
    pub that: OrpcThat,
    pub names: Vec<Option<BString>>,
    pub ret: i32,
}

#[derive(Debug, Default)]
pub struct GetNamesOperation {
    pub request: GetNamesRequest,
    pub response: GetNamesResponse,
}

impl Operation for GetNamesOperation {
    fn opnum(&self) -> u16 {
        opnum::GET_NAMES
    }

    fn name(&self) -> &'static str {
        "/ITypeInfo/v0/GetNames"
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.request.this)?;
        w.write_data(self.request.member_id);
        w.write_data(self.request.max_names);
        Ok(())
    }

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.request.this)?;
        self.request.member_id = r.read_data()?;
        self.request.max_names = r.read_data()?;
        Ok(())
    }

    // rgBstrNames is [size_is(cMaxNames), length_is(*pcNames)] BSTR*
    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.response.that)?;
        let max = self.request.max_names as usize;
        let names = &self.response.names[..self.response.names.len().min(max)];
        w.write_size(max)?;
        w.write_size(0)?;
        w.write_size(names.len())?;
        for name in names {
            w.write_pointer(PointerKind::Unique, name.as_ref())?;
        }
        w.write_deferred()?;
        w.write_size(names.len())?;
        w.write_data(self.response.ret);
        Ok(())
    }

    fn unmarshal_response<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.response.that)?;
        let max_count = r.read_size()?;
        let offset = r.read_size()?;
        let actual_count = r.read_size()?;
        if offset != 0 || actual_count > max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count,
            });
        }
        let count = r.check_count(actual_count, 4)?;
        let names = &mut self.response.names;
        names.clear();
        names.resize_with(count, || None);
        for slot in names.iter_mut() {
            r.read_pointer(PointerKind::Unique, slot)?;
        }
        r.read_deferred()?;
        let names_count = r.read_size()?;
        if names_count != actual_count {
            return Err(NdrError::ConformanceMismatch {
                max_count: actual_count,
                actual_count: names_count,
            });
        }
        self.response.ret = r.read_data()?;
        Ok(())
    }

    fn status(&self) -> u32 {
        status_of(self.response.ret)
    }
}

/// `GetRefTypeOfImplType` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetRefTypeOfImplTypeRequest {
    pub this: OrpcThis,
    pub index: u32,
}

/// `GetRefTypeOfImplType` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetRefTypeOfImplTypeResponse {
    pub that: OrpcThat,
    pub ref_type: u32,
    pub ret: i32,
}

#[derive(Debug, Default)]
pub struct GetRefTypeOfImplTypeOperation {
    pub request: GetRefTypeOfImplTypeRequest,
    pub response: GetRefTypeOfImplTypeResponse,
}

impl Operation for GetRefTypeOfImplTypeOperation {
    fn opnum(&self) -> u16 {
        opnum::GET_REF_TYPE_OF_IMPL_TYPE
    }

    fn name(&self) -> &'static str {
        "/ITypeInfo/v0/GetRefTypeOfImplType"
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.request.this)?;
        w.write_data(self.request.index);
        Ok(())
    }

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.request.this)?;
        self.request.index = r.read_data()?;
        Ok(())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.response.that)?;
        w.write_data(self.response.ref_type);
        w.write_data(self.response.ret);
        Ok(())
    }

    fn unmarshal_response<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.response.that)?;
        self.response.ref_type = r.read_data()?;
        self.response.ret = r.read_data()?;
        Ok(())
    }

    fn status(&self) -> u32 {
        status_of(self.response.ret)
    }
}

/// `GetImplTypeFlags` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetImplTypeFlagsRequest {
    pub this: OrpcThis,
    pub index: u32,
}

/// `GetImplTypeFlags` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetImplTypeFlagsResponse {
    pub that: OrpcThat,
    pub impl_type_flags: i32,
    pub ret: i32,
}

#[derive(Debug, Default)]
pub struct GetImplTypeFlagsOperation {
    pub request: GetImplTypeFlagsRequest,
    pub response: GetImplTypeFlagsResponse,
}

impl Operation for GetImplTypeFlagsOperation {
    fn opnum(&self) -> u16 {
        opnum::GET_IMPL_TYPE_FLAGS
    }

    fn name(&self) -> &'static str {
        "/ITypeInfo/v0/GetImplTypeFlags"
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.request.this)?;
        w.write_data(self.request.index);
        Ok(())
    }

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.request.this)?;
        self.request.index = r.read_data()?;
        Ok(())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.response.that)?;
        w.write_data(self.response.impl_type_flags);
        w.write_data(self.response.ret);
        Ok(())
    }

    fn unmarshal_response<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.response.that)?;
        self.response.impl_type_flags = r.read_data()?;
        self.response.ret = r.read_data()?;
        Ok(())
    }

    fn status(&self) -> u32 {
        status_of(self.response.ret)
    }
}

/// `refPtrFlags` bits selecting which `GetDocumentation` outputs to fill
pub mod doc_flags {
    pub const NAME: u32 = 0x1;
    pub const DOC_STRING: u32 = 0x2;
    pub const HELP_CONTEXT: u32 = 0x4;
    pub const HELP_FILE: u32 = 0x8;
    pub const ALL: u32 = NAME | DOC_STRING | HELP_CONTEXT | HELP_FILE;
}

/// `GetDocumentation` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetDocumentationRequest {
    pub this: OrpcThis,
    pub member_id: i32,
    pub flags: u32,
}

/// `GetDocumentation` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetDocumentationResponse {
    pub that: OrpcThat,
    pub name: Option<BString>,
    pub doc_string: Option<BString>,
    pub help_context: u32,
    pub help_file: Option<BString>,
    pub ret: i32,
}

#[derive(Debug, Default)]
pub struct GetDocumentationOperation {
    pub request: GetDocumentationRequest,
    pub response: GetDocumentationResponse,
}

impl Operation for GetDocumentationOperation {
    fn opnum(&self) -> u16 {
        opnum::GET_DOCUMENTATION
    }

    fn name(&self) -> &'static str {
        "/ITypeInfo/v0/GetDocumentation"
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.request.this)?;
        w.write_data(self.request.member_id);
        w.write_data(self.request.flags);
        Ok(())
    }

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.request.this)?;
        self.request.member_id = r.read_data()?;
        self.request.flags = r.read_data()?;
        Ok(())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        let resp = &self.response;
        write_orpc_header(w, &resp.that)?;
        w.write_pointer(PointerKind::Unique, resp.name.as_ref())?;
        w.write_deferred()?;
        w.write_pointer(PointerKind::Unique, resp.doc_string.as_ref())?;
        w.write_deferred()?;
        w.write_data(resp.help_context);
        w.write_pointer(PointerKind::Unique, resp.help_file.as_ref())?;
        w.write_deferred()?;
        w.write_data(resp.ret);
        Ok(())
    }

    fn unmarshal_response<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        let resp = &mut self.response;
        read_orpc_header(r, &mut resp.that)?;
        r.read_pointer(PointerKind::Unique, &mut resp.name)?;
        r.read_deferred()?;
        r.read_pointer(PointerKind::Unique, &mut resp.doc_string)?;
        r.read_deferred()?;
        resp.help_context = r.read_data()?;
        r.read_pointer(PointerKind::Unique, &mut resp.help_file)?;
        r.read_deferred()?;
        resp.ret = r.read_data()?;
        Ok(())
    }

    fn status(&self) -> u32 {
        status_of(self.response.ret)
    }
}

/// `GetMops` request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetMopsRequest {
    pub this: OrpcThis,
    pub member_id: i32,
}

/// `GetMops` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetMopsResponse {
    pub that: OrpcThat,
    pub mops: Option<BString>,
    pub ret: i32,
}

#[derive(Debug, Default)]
pub struct GetMopsOperation {
    pub request: GetMopsRequest,
    pub response: GetMopsResponse,
}

impl Operation for GetMopsOperation {
    fn opnum(&self) -> u16 {
        opnum::GET_MOPS
    }

    fn name(&self) -> &'static str {
        "/ITypeInfo/v0/GetMops"
    }

    fn marshal_request<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.request.this)?;
        w.write_data(self.request.member_id);
        Ok(())
    }

    fn unmarshal_request<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.request.this)?;
        self.request.member_id = r.read_data()?;
        Ok(())
    }

    fn marshal_response<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        write_orpc_header(w, &self.response.that)?;
        w.write_pointer(PointerKind::Unique, self.response.mops.as_ref())?;
        w.write_deferred()?;
        w.write_data(self.response.ret);
        Ok(())
    }

    fn unmarshal_response<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        read_orpc_header(r, &mut self.response.that)?;
        r.read_pointer(PointerKind::Unique, &mut self.response.mops)?;
        r.read_deferred()?;
        self.response.ret = r.read_data()?;
        Ok(())
    }

    fn status(&self) -> u32 {
        status_of(self.response.ret)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oaut::types::{ElemDesc, TypeDesc, vt};
    use crate::types::Cid;
    use dcerpc::{decode_request, decode_response, encode_request, encode_response};
    use midl_ndr::{NdrContext, NdrEncode};

    fn orpc_this_bytes(this: &OrpcThis) -> Vec<u8> {
        let mut w = NdrWriter::with_context(NdrContext::new());
        this.ndr_write(&mut w).unwrap();
        w.finish().unwrap().to_vec()
    }

    #[test]
    fn test_get_func_desc_request_bytes() {
        let this = OrpcThis::with_causality(Cid::generate());
        let op = GetFuncDescOperation {
            request: GetFuncDescRequest {
                this: this.clone(),
                index: 3,
            },
            ..Default::default()
        };
        assert_eq!(op.opnum(), 5);
        let stub = encode_request(&op, NdrContext::new()).unwrap();

        let mut expected = orpc_this_bytes(&this);
        expected.extend_from_slice(&3u32.to_le_bytes());
        assert_eq!(stub.as_ref(), expected.as_slice());

        let mut server_side = GetFuncDescOperation::default();
        decode_request(&mut server_side, stub, NdrContext::new()).unwrap();
        assert_eq!(server_side.request.index, 3);
        assert_eq!(server_side.request.this, this);
    }

    #[test]
    fn test_get_func_desc_response() {
        let op = GetFuncDescOperation {
            response: GetFuncDescResponse {
                that: OrpcThat::new(),
                func_desc: Some(FuncDesc {
                    member_id: 1,
                    params: Some(vec![ElemDesc::new(TypeDesc::base(vt::I4), 1)]),
                    return_desc: ElemDesc::new(TypeDesc::base(vt::HRESULT), 0),
                    ..Default::default()
                }),
                ret: 0,
            },
            ..Default::default()
        };
        let stub = encode_response(&op, NdrContext::big_endian()).unwrap();

        let mut client_side = GetFuncDescOperation::default();
        decode_response(&mut client_side, stub, NdrContext::big_endian()).unwrap();
        assert_eq!(client_side.response, op.response);
        assert_eq!(client_side.status(), 0);
    }

    #[test]
    fn test_get_names_truncates_to_max() {
        let op = GetNamesOperation {
            request: GetNamesRequest {
                max_names: 2,
                ..Default::default()
            },
            response: GetNamesResponse {
                names: vec![
                    Some(BString::new("Invoke")),
                    None,
                    Some(BString::new("dropped")),
                ],
                ..Default::default()
            },
        };
        let stub = encode_response(&op, NdrContext::new()).unwrap();

        let mut client_side = GetNamesOperation::default();
        decode_response(&mut client_side, stub, NdrContext::new()).unwrap();
        assert_eq!(
            client_side.response.names,
            vec![Some(BString::new("Invoke")), None]
        );
    }

    #[test]
    fn test_get_names_rejects_count_mismatch() {
        let op = GetNamesOperation {
            request: GetNamesRequest {
                max_names: 1,
                ..Default::default()
            },
            response: GetNamesResponse {
                names: vec![Some(BString::new("a"))],
                ..Default::default()
            },
        };
        let mut stub = encode_response(&op, NdrContext::new()).unwrap().to_vec();
        // pcNames sits just before the trailing HRESULT
        let at = stub.len() - 8;
        stub[at..at + 4].copy_from_slice(&5u32.to_le_bytes());

        let mut client_side = GetNamesOperation::default();
        assert!(decode_response(&mut client_side, stub.into(), NdrContext::new()).is_err());
    }

    #[test]
    fn test_get_documentation_response() {
        let op = GetDocumentationOperation {
            response: GetDocumentationResponse {
                name: Some(BString::new("ITest")),
                doc_string: None,
                help_context: 42,
                help_file: Some(BString::new("test.chm")),
                ..Default::default()
            },
            ..Default::default()
        };
        let stub = encode_response(&op, NdrContext::new()).unwrap();
        let mut client_side = GetDocumentationOperation::default();
        decode_response(&mut client_side, stub, NdrContext::new()).unwrap();
        assert_eq!(client_side.response, op.response);
    }
}
