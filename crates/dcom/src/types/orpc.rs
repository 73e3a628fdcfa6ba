//! ORPC (Object RPC) header types (MS-DCOM 2.2.13, 2.2.14)
//!
//! Every DCOM request stub starts with an ORPCTHIS and every response
//! stub with an ORPCTHAT. Both are carried through untouched; the
//! extensions they may hold are decoded but not interpreted.

use super::identifiers::{generate_uuid, Cid};
use bytes::Bytes;
use dcerpc::Uuid;
use midl_ndr::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, PointerKind};

/// COM version structure (MS-DCOM 2.2.11)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ComVersion {
    /// Major version number
    pub major: u16,
    /// Minor version number
    pub minor: u16,
}

impl ComVersion {
    /// Size in bytes
    pub const SIZE: usize = 4;

    /// DCOM version 5.1 (Windows 2000)
    pub const DCOM_5_1: Self = Self { major: 5, minor: 1 };
    /// DCOM version 5.4 (Windows XP/2003)
    pub const DCOM_5_4: Self = Self { major: 5, minor: 4 };
    /// DCOM version 5.6 (Windows Vista)
    pub const DCOM_5_6: Self = Self { major: 5, minor: 6 };
    /// DCOM version 5.7 (Windows 7)
    pub const DCOM_5_7: Self = Self { major: 5, minor: 7 };

    /// Create a new COM version
    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }
}

impl NdrEncode for ComVersion {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_data(self.major);
        w.write_data(self.minor);
        Ok(())
    }
}

impl NdrDecode for ComVersion {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        self.major = r.read_data()?;
        self.minor = r.read_data()?;
        Ok(())
    }

    fn ndr_min_size() -> usize {
        Self::SIZE
    }
}

/// ORPC extension (MS-DCOM 2.2.21.4)
///
/// A conformant structure: the byte array is sized to `size` rounded
/// up to a multiple of 8, and that count leads the structure on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrpcExtent {
    /// Extension identifier
    pub id: Uuid,
    /// Meaningful bytes in `data`
    pub size: u32,
    pub data: Bytes,
}

impl OrpcExtent {
    /// Extent carrying `data`; fails when the length does not fit `size`
    pub fn new(id: Uuid, data: impl Into<Bytes>) -> midl_ndr::Result<Self> {
        let data = data.into();
        let size = u32::try_from(data.len()).map_err(|_| NdrError::IntegerOverflow)?;
        Ok(Self { id, size, data })
    }

    /// Byte array dimension: `size` rounded up to a multiple of 8
    fn wire_size(&self) -> midl_ndr::Result<usize> {
        let size = if self.size == 0 {
            u32::try_from(self.data.len()).map_err(|_| NdrError::IntegerOverflow)?
        } else {
            self.size
        };
        let rounded = size.checked_add(7).ok_or(NdrError::IntegerOverflow)? & !7;
        Ok(rounded as usize)
    }
}

impl NdrEncode for OrpcExtent {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        let dim = self.wire_size()?;
        w.write_size(dim)?;
        w.write_value(&self.id)?;
        w.write_data(self.size);
        let used = self.data.len().min(dim);
        w.write_bytes(&self.data[..used]);
        w.write_bytes(&vec![0u8; dim - used]);
        Ok(())
    }
}

impl NdrDecode for OrpcExtent {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        let dim = r.read_size()?;
        r.read_value(&mut self.id)?;
        self.size = r.read_data()?;
        let dim = r.check_count(dim, 1)?;
        let mut data = r.read_bytes(dim)?;
        data.truncate((self.size as usize).min(dim));
        self.data = data;
        Ok(())
    }

    fn ndr_min_size() -> usize {
        24
    }
}

/// Extensions attached to an ORPCTHIS or ORPCTHAT (MS-DCOM 2.2.21.5)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrpcExtentArray {
    /// Number of extents in use
    pub size: u32,
    /// Reserved (must be 0)
    pub reserved: u32,
    pub extents: Option<ExtentList>,
}

impl OrpcExtentArray {
    pub fn new(extents: Vec<OrpcExtent>) -> midl_ndr::Result<Self> {
        Ok(Self {
            size: u32::try_from(extents.len()).map_err(|_| NdrError::IntegerOverflow)?,
            reserved: 0,
            extents: Some(ExtentList(extents.into_iter().map(Some).collect())),
        })
    }

    /// Extents actually present
    pub fn iter(&self) -> impl Iterator<Item = &OrpcExtent> {
        self.extents
            .iter()
            .flat_map(|list| list.0.iter())
            .flatten()
    }
}

impl NdrEncode for OrpcExtentArray {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_data(self.size);
        w.write_data(self.reserved);
        w.write_pointer(PointerKind::Unique, self.extents.as_ref())
    }
}

impl NdrDecode for OrpcExtentArray {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        self.size = r.read_data()?;
        self.reserved = r.read_data()?;
        r.read_pointer(PointerKind::Unique, &mut self.extents)
    }

    fn ndr_min_size() -> usize {
        12
    }
}

/// Conformant array of unique extent pointers, padded to an even count
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExtentList(pub Vec<Option<OrpcExtent>>);

impl NdrEncode for ExtentList {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        let count = (self.0.len() + 1) & !1;
        w.write_size(count)?;
        for extent in &self.0 {
            w.write_pointer(PointerKind::Unique, extent.as_ref())?;
        }
        for _ in self.0.len()..count {
            w.write_data(0u32);
        }
        Ok(())
    }
}

impl NdrDecode for ExtentList {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        let count = r.read_size()?;
        let count = r.check_count(count, 4)?;
        self.0.clear();
        self.0.resize_with(count, || None);
        for slot in self.0.iter_mut() {
            r.read_pointer(PointerKind::Unique, slot)?;
        }
        Ok(())
    }

    fn ndr_min_size() -> usize {
        4
    }
}

/// ORPCTHIS structure (MS-DCOM 2.2.13)
///
/// Sent with every ORPC request from client to server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrpcThis {
    /// COM version
    pub version: ComVersion,
    /// Flags (must be 0)
    pub flags: u32,
    /// Reserved (must be 0)
    pub reserved1: u32,
    /// Causality ID (UUID identifying the call chain)
    pub cid: Cid,
    /// Optional extension array
    pub extensions: Option<OrpcExtentArray>,
}

impl OrpcThis {
    /// Create a new ORPCTHIS with a fresh causality id
    pub fn new() -> Self {
        Self::with_causality(Cid(generate_uuid()))
    }

    /// Create with a specific causality ID
    pub fn with_causality(cid: Cid) -> Self {
        Self {
            version: crate::DCOM_VERSION,
            flags: 0,
            reserved1: 0,
            cid,
            extensions: None,
        }
    }
}

impl Default for OrpcThis {
    fn default() -> Self {
        Self::new()
    }
}

impl NdrEncode for OrpcThis {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_value(&self.version)?;
        w.write_data(self.flags);
        w.write_data(self.reserved1);
        w.write_value(&self.cid)?;
        w.write_pointer(PointerKind::Unique, self.extensions.as_ref())
    }
}

impl NdrDecode for OrpcThis {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        r.read_value(&mut self.version)?;
        self.flags = r.read_data()?;
        self.reserved1 = r.read_data()?;
        r.read_value(&mut self.cid)?;
        r.read_pointer(PointerKind::Unique, &mut self.extensions)
    }

    fn ndr_min_size() -> usize {
        32
    }
}

/// ORPCTHAT structure (MS-DCOM 2.2.14)
///
/// Sent with every ORPC response from server to client.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OrpcThat {
    /// Flags (must be 0)
    pub flags: u32,
    /// Optional extension array
    pub extensions: Option<OrpcExtentArray>,
}

impl OrpcThat {
    /// Create a new empty ORPCTHAT
    pub fn new() -> Self {
        Self::default()
    }
}

impl NdrEncode for OrpcThat {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_data(self.flags);
        w.write_pointer(PointerKind::Unique, self.extensions.as_ref())
    }
}

impl NdrDecode for OrpcThat {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        self.flags = r.read_data()?;
        r.read_pointer(PointerKind::Unique, &mut self.extensions)
    }

    fn ndr_min_size() -> usize {
        8
    }
}

/// Write an ORPC header and the extensions it points to
pub(crate) fn write_orpc_header<'a, T: NdrEncode>(
    w: &mut NdrWriter<'a>,
    header: &'a T,
) -> midl_ndr::Result<()> {
    w.write_value(header)?;
    w.write_deferred()
}

pub(crate) fn read_orpc_header<'a, T: NdrDecode>(
    r: &mut NdrReader<'a>,
    header: &'a mut T,
) -> midl_ndr::Result<()> {
    r.read_value(header)?;
    r.read_deferred()
}

/// Well-known extension UUIDs
pub mod extent_ids {
    use dcerpc::Uuid;

    /// Error info extension (MS-DCOM 2.2.21.1)
    pub const ERROR_INFO: Uuid = Uuid::from_fields(
        0x0000_031c,
        0x0000,
        0x0000,
        [0xc0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x46],
    );
}
