//! Automation type description records (MS-OAUT 2.2)

use midl_ndr::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, PointerKind};

/// VARENUM values used by `TypeDesc`
pub mod vt {
    pub const EMPTY: u16 = 0;
    pub const I2: u16 = 2;
    pub const I4: u16 = 3;
    pub const BSTR: u16 = 8;
    pub const DISPATCH: u16 = 9;
    pub const BOOL: u16 = 11;
    pub const VARIANT: u16 = 12;
    pub const UNKNOWN: u16 = 13;
    pub const UI4: u16 = 19;
    pub const INT: u16 = 22;
    pub const VOID: u16 = 24;
    pub const HRESULT: u16 = 25;
    pub const PTR: u16 = 26;
    pub const SAFEARRAY: u16 = 27;
    pub const CARRAY: u16 = 28;
    pub const USERDEFINED: u16 = 29;
}

/// `[v1_enum]` types: 32 bits on the wire, unknown values rejected
macro_rules! v1_enum {
    ($(#[$meta:meta])* $name:ident { $first:ident = $first_value:literal $(, $variant:ident = $value:literal)* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        #[repr(u32)]
        pub enum $name {
            #[default]
            $first = $first_value,
            $($variant = $value,)*
        }

        impl $name {
            pub fn from_u32(value: u32) -> Option<Self> {
                match value {
                    $first_value => Some(Self::$first),
                    $($value => Some(Self::$variant),)*
                    _ => None,
                }
            }
        }

        impl NdrEncode for $name {
            fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
                w.write_enum(*self as u32);
                Ok(())
            }
        }

        impl NdrDecode for $name {
            fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
                let value = r.read_enum()?;
                *self = Self::from_u32(value).ok_or(NdrError::InvalidEnumValue(value))?;
                Ok(())
            }

            fn ndr_min_size() -> usize {
                4
            }
        }
    };
}

v1_enum!(
    /// FUNCKIND (MS-OAUT 2.2.8)
    FuncKind {
        PureVirtual = 1,
        Static = 3,
        Dispatch = 4,
    }
);

v1_enum!(
    /// INVOKEKIND (MS-OAUT 2.2.9)
    InvokeKind {
        Func = 1,
        PropertyGet = 2,
        PropertyPut = 4,
        PropertyPutRef = 8,
    }
);

v1_enum!(
    /// CALLCONV (MS-OAUT 2.2.10)
    CallConv {
        Stdcall = 4,
        Cdecl = 1,
        Pascal = 2,
    }
);

v1_enum!(
    /// TYPEKIND (MS-OAUT 2.2.17)
    TypeKind {
        Enum = 0,
        Record = 1,
        Module = 2,
        Interface = 3,
        Dispatch = 4,
        CoClass = 5,
        Alias = 6,
        Union = 7,
    }
);

/// The arm of a `TypeDesc`, selected by its `vt`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeDescKind {
    #[default]
    Base,
    /// `VT_PTR` and `VT_SAFEARRAY`: the pointed-to or element type
    Pointer(Option<Box<TypeDesc>>),
    /// `VT_CARRAY`
    Array(Option<Box<ArrayDesc>>),
    /// `VT_USERDEFINED`: an HREFTYPE
    UserDefined(u32),
}

/// TYPEDESC (MS-OAUT 2.2.37)
///
/// Wire layout is a non-encapsulated union switched on `vt`, followed
/// by `vt` itself:
/// ```text
/// switch: u16
/// arm:    referent id | hreftype | nothing
/// vt:     u16
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TypeDesc {
    pub vt: u16,
    pub kind: TypeDescKind,
}

impl TypeDesc {
    pub fn base(vt: u16) -> Self {
        Self {
            vt,
            kind: TypeDescKind::Base,
        }
    }

    pub fn pointer(to: TypeDesc) -> Self {
        Self {
            vt: vt::PTR,
            kind: TypeDescKind::Pointer(Some(Box::new(to))),
        }
    }

    pub fn user_defined(href: u32) -> Self {
        Self {
            vt: vt::USERDEFINED,
            kind: TypeDescKind::UserDefined(href),
        }
    }

    pub fn array(desc: ArrayDesc) -> Self {
        Self {
            vt: vt::CARRAY,
            kind: TypeDescKind::Array(Some(Box::new(desc))),
        }
    }
}

impl NdrEncode for TypeDesc {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.align(4);
        w.write_data(self.vt);
        match self.vt {
            vt::PTR | vt::SAFEARRAY => {
                let to = match &self.kind {
                    TypeDescKind::Pointer(to) => to.as_deref(),
                    _ => None,
                };
                w.write_pointer(PointerKind::Unique, to)?;
            }
            vt::CARRAY => {
                let desc = match &self.kind {
                    TypeDescKind::Array(desc) => desc.as_deref(),
                    _ => None,
                };
                w.write_pointer(PointerKind::Unique, desc)?;
            }
            vt::USERDEFINED => {
                let href = match self.kind {
                    TypeDescKind::UserDefined(href) => href,
                    _ => 0,
                };
                w.write_data(href);
            }
            _ => {}
        }
        w.write_data(self.vt);
        Ok(())
    }
}

impl NdrDecode for TypeDesc {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        r.align(4)?;
        let switch: u16 = r.read_data()?;
        self.kind = match switch {
            vt::PTR | vt::SAFEARRAY => TypeDescKind::Pointer(None),
            vt::CARRAY => TypeDescKind::Array(None),
            vt::USERDEFINED => TypeDescKind::UserDefined(r.read_data()?),
            _ => TypeDescKind::Base,
        };
        match &mut self.kind {
            TypeDescKind::Pointer(slot) => r.read_pointer(PointerKind::Unique, slot)?,
            TypeDescKind::Array(slot) => r.read_pointer(PointerKind::Unique, slot)?,
            _ => {}
        }
        self.vt = r.read_data()?;
        if self.vt != switch {
            return Err(NdrError::InvalidDiscriminant(u32::from(switch)));
        }
        Ok(())
    }

    fn ndr_min_size() -> usize {
        4
    }
}

/// SAFEARRAYBOUND (MS-OAUT 2.2.30.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SafeArrayBound {
    pub elements: u32,
    pub lower_bound: i32,
}

impl NdrEncode for SafeArrayBound {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_data(self.elements);
        w.write_data(self.lower_bound);
        Ok(())
    }
}

impl NdrDecode for SafeArrayBound {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        self.elements = r.read_data()?;
        self.lower_bound = r.read_data()?;
        Ok(())
    }

    fn ndr_min_size() -> usize {
        8
    }
}

/// ARRAYDESC (MS-OAUT 2.2.36)
///
/// Conformant structure: the bound count leads it on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ArrayDesc {
    pub element: TypeDesc,
    pub bounds: Vec<SafeArrayBound>,
}

impl NdrEncode for ArrayDesc {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        let dims = u16::try_from(self.bounds.len()).map_err(|_| NdrError::IntegerOverflow)?;
        w.write_size(self.bounds.len())?;
        w.write_value(&self.element)?;
        w.write_data(dims);
        for bound in &self.bounds {
            w.write_value(bound)?;
        }
        Ok(())
    }
}

impl NdrDecode for ArrayDesc {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        let count = r.read_size()?;
        r.read_value(&mut self.element)?;
        let dims: u16 = r.read_data()?;
        if u32::from(dims) != count {
            return Err(NdrError::ConformanceMismatch {
                max_count: count,
                actual_count: u32::from(dims),
            });
        }
        let count = r.check_count(count, SafeArrayBound::ndr_min_size())?;
        self.bounds.clear();
        self.bounds.resize_with(count, SafeArrayBound::default);
        for bound in self.bounds.iter_mut() {
            r.read_value(bound)?;
        }
        Ok(())
    }

    fn ndr_min_size() -> usize {
        10
    }
}

/// PARAMFLAG bits of `ParamDesc::flags`
pub mod param_flags {
    pub const IN: u16 = 0x0001;
    pub const OUT: u16 = 0x0002;
    pub const LCID: u16 = 0x0004;
    pub const RETVAL: u16 = 0x0008;
    pub const OPT: u16 = 0x0010;
    pub const HAS_DEFAULT: u16 = 0x0020;
    pub const HAS_CUSTOM_DATA: u16 = 0x0040;
}

/// PARAMDESC (MS-OAUT 2.2.40)
///
/// Default values (`pparamdescex`) are always sent as null; a peer that
/// sends one fails the decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParamDesc {
    pub flags: u16,
}

impl NdrEncode for ParamDesc {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_data(0u32);
        w.write_data(self.flags);
        Ok(())
    }
}

impl NdrDecode for ParamDesc {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        let default_value: u32 = r.read_data()?;
        if default_value != 0 {
            return Err(NdrError::Unsupported("PARAMDESCEX default values"));
        }
        self.flags = r.read_data()?;
        Ok(())
    }

    fn ndr_min_size() -> usize {
        6
    }
}

/// ELEMDESC (MS-OAUT 2.2.41)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElemDesc {
    pub type_desc: TypeDesc,
    pub param_desc: ParamDesc,
}

impl ElemDesc {
    pub fn new(type_desc: TypeDesc, flags: u16) -> Self {
        Self {
            type_desc,
            param_desc: ParamDesc { flags },
        }
    }
}

impl NdrEncode for ElemDesc {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_value(&self.type_desc)?;
        w.write_value(&self.param_desc)
    }
}

impl NdrDecode for ElemDesc {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        r.read_value(&mut self.type_desc)?;
        r.read_value(&mut self.param_desc)
    }

    fn ndr_min_size() -> usize {
        10
    }
}

/// FUNCDESC (MS-OAUT 2.2.42)
///
/// `cParams` and `cReserved2` are not stored: they are the lengths of
/// `params` and `scodes`, written from them and implied by the arrays
/// on decode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FuncDesc {
    pub member_id: i32,
    /// `lReserved1`
    pub scodes: Option<Vec<i32>>,
    pub params: Option<Vec<ElemDesc>>,
    pub func_kind: FuncKind,
    pub invoke_kind: InvokeKind,
    pub call_conv: CallConv,
    pub optional_params: i16,
    pub vtable_offset: i16,
    pub return_desc: ElemDesc,
    pub flags: u16,
}

/// `MEMBERID_NIL`: the type itself rather than one of its members
pub const MEMBER_ID_NIL: i32 = -1;

fn count_i16<T>(items: &Option<Vec<T>>) -> midl_ndr::Result<i16> {
    let len = items.as_ref().map_or(0, Vec::len);
    i16::try_from(len).map_err(|_| NdrError::IntegerOverflow)
}

impl NdrEncode for FuncDesc {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        let params = count_i16(&self.params)?;
        let scodes = count_i16(&self.scodes)?;
        w.write_data(self.member_id);
        w.write_pointer(PointerKind::Unique, self.scodes.as_ref())?;
        w.write_pointer(PointerKind::Unique, self.params.as_ref())?;
        w.write_value(&self.func_kind)?;
        w.write_value(&self.invoke_kind)?;
        w.write_value(&self.call_conv)?;
        w.write_data(params);
        w.write_data(self.optional_params);
        w.write_data(self.vtable_offset);
        w.write_data(scodes);
        w.write_value(&self.return_desc)?;
        w.write_data(self.flags);
        Ok(())
    }
}

impl NdrDecode for FuncDesc {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        self.member_id = r.read_data()?;
        r.read_pointer(PointerKind::Unique, &mut self.scodes)?;
        r.read_pointer(PointerKind::Unique, &mut self.params)?;
        r.read_value(&mut self.func_kind)?;
        r.read_value(&mut self.invoke_kind)?;
        r.read_value(&mut self.call_conv)?;
        let _params: i16 = r.read_data()?;
        self.optional_params = r.read_data()?;
        self.vtable_offset = r.read_data()?;
        let _scodes: i16 = r.read_data()?;
        r.read_value(&mut self.return_desc)?;
        self.flags = r.read_data()?;
        Ok(())
    }

    fn ndr_min_size() -> usize {
        46
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use midl_ndr::{NdrContext, FIRST_REFERENT_ID};

    fn encode<T: NdrEncode>(value: &T) -> Bytes {
        let mut w = NdrWriter::with_context(NdrContext::new());
        w.write_value(value).unwrap();
        w.finish().unwrap()
    }

    fn decode<T: NdrDecode>(bytes: Bytes) -> midl_ndr::Result<T> {
        let mut value = T::default();
        let mut r = NdrReader::new(bytes);
        r.read_value(&mut value)?;
        r.finish()?;
        Ok(value)
    }

    fn sample() -> FuncDesc {
        FuncDesc {
            member_id: 0x6002_0000,
            scodes: None,
            params: Some(vec![
                ElemDesc::new(TypeDesc::base(vt::BSTR), param_flags::IN),
                ElemDesc::new(
                    TypeDesc::pointer(TypeDesc::pointer(TypeDesc::user_defined(7))),
                    param_flags::OUT | param_flags::RETVAL,
                ),
            ]),
            func_kind: FuncKind::PureVirtual,
            invoke_kind: InvokeKind::PropertyGet,
            call_conv: CallConv::Stdcall,
            optional_params: 0,
            vtable_offset: 28,
            return_desc: ElemDesc::new(TypeDesc::base(vt::HRESULT), 0),
            flags: 0,
        }
    }

    #[test]
    fn test_type_desc_layout() {
        let bytes = encode(&TypeDesc::user_defined(0x1234));
        assert_eq!(
            bytes.as_ref(),
            &[29, 0, 0, 0, 0x34, 0x12, 0, 0, 29, 0]
        );

        let bytes = encode(&TypeDesc::base(vt::I4));
        assert_eq!(bytes.as_ref(), &[3, 0, 3, 0]);
    }

    #[test]
    fn test_recursive_type_desc() {
        let desc = TypeDesc::pointer(TypeDesc::pointer(TypeDesc::base(vt::I4)));
        let bytes = encode(&desc);
        // switch, pad, referent id, vt, then each nested TYPEDESC
        assert_eq!(&bytes[4..8], &FIRST_REFERENT_ID.to_le_bytes());
        assert_eq!(decode::<TypeDesc>(bytes).unwrap(), desc);

        let null_ptr = TypeDesc {
            vt: vt::PTR,
            kind: TypeDescKind::Pointer(None),
        };
        assert_eq!(decode::<TypeDesc>(encode(&null_ptr)).unwrap(), null_ptr);
    }

    #[test]
    fn test_carray_type_desc() {
        let desc = TypeDesc::array(ArrayDesc {
            element: TypeDesc::base(vt::I2),
            bounds: vec![SafeArrayBound {
                elements: 4,
                lower_bound: 0,
            }],
        });
        assert_eq!(decode::<TypeDesc>(encode(&desc)).unwrap(), desc);
    }

    #[test]
    fn test_func_desc_roundtrip() {
        let desc = sample();
        let decoded: FuncDesc = decode(encode(&desc)).unwrap();
        assert_eq!(decoded, desc);
    }

    #[test]
    fn test_func_desc_counts_follow_arrays() {
        let bytes = encode(&sample());
        // memid, two pointers, three enums
        assert_eq!(&bytes[24..26], &2i16.to_le_bytes());
        assert_eq!(&bytes[30..32], &0i16.to_le_bytes());
    }

    #[test]
    fn test_unknown_enum_rejected() {
        let mut bytes = encode(&sample()).to_vec();
        bytes[12..16].copy_from_slice(&9u32.to_le_bytes());
        assert!(matches!(
            decode::<FuncDesc>(Bytes::from(bytes)),
            Err(NdrError::InvalidEnumValue(9))
        ));
    }

    #[test]
    fn test_param_default_value_unsupported() {
        let bytes = Bytes::from_static(&[0, 0, 2, 0, 1, 0]);
        assert!(matches!(
            decode::<ParamDesc>(bytes),
            Err(NdrError::Unsupported(_))
        ));
    }

    #[test]
    fn test_deep_pointer_chain_rejected() {
        let mut w = NdrWriter::new();
        for i in 0..5000u32 {
            w.write_data(vt::PTR);
            w.write_data(FIRST_REFERENT_ID + 4 * i);
            w.write_data(vt::PTR);
        }
        w.write_data(vt::I4);
        w.write_data(vt::I4);
        assert!(matches!(
            decode::<TypeDesc>(w.finish().unwrap()),
            Err(NdrError::DepthExceeded { .. })
        ));

        let mut desc = TypeDesc::base(vt::I4);
        for _ in 0..64 {
            desc = TypeDesc::pointer(desc);
        }
        assert_eq!(decode::<TypeDesc>(encode(&desc)).unwrap(), desc);
    }
}
