//! DCE RPC PDU (Protocol Data Unit) types
//!
//! This module implements the connection-oriented DCE RPC wire format as
//! defined in:
//! - DCE 1.1: Remote Procedure Call (C706)
//! - MS-RPCE: Remote Procedure Call Protocol Extensions
//!
//! DCE RPC PDU Header Format:
//! ```text
//! +--------+--------+--------+--------+
//! |  vers  |vers_min| ptype  | pflags |
//! +--------+--------+--------+--------+
//! |        data representation        |
//! +--------+--------+--------+--------+
//! |   frag_len      |   auth_len      |
//! +--------+--------+--------+--------+
//! |             call_id               |
//! +--------+--------+--------+--------+
//! ```
//!
//! Multi-byte header and body fields follow the byte order announced in
//! the data representation label of the PDU that carries them.

use crate::error::{Result, RpcError};
use bytes::{BufMut, Bytes, BytesMut};
use midl_ndr::{NdrContext, NdrDecode, NdrEncode, NdrReader, NdrWriter};
use std::fmt;
use std::str::FromStr;

/// DCE RPC protocol version
pub const DCE_RPC_VERSION: u8 = 5;
/// DCE RPC protocol minor version
pub const DCE_RPC_VERSION_MINOR: u8 = 0;

/// Default fragment size negotiated in Bind/BindAck
pub const DEFAULT_MAX_FRAG: u16 = 4280;

/// DCE RPC packet types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Request PDU
    Request = 0,
    /// Ping PDU (connectionless only)
    Ping = 1,
    /// Response PDU
    Response = 2,
    /// Fault PDU
    Fault = 3,
    /// Working PDU (connectionless only)
    Working = 4,
    /// No-call PDU (connectionless only)
    Nocall = 5,
    /// Reject PDU (connectionless only)
    Reject = 6,
    /// Ack PDU (connectionless only)
    Ack = 7,
    /// Cancel PDU (connectionless only)
    ClCancel = 8,
    /// Fack PDU (connectionless only)
    Fack = 9,
    /// Cancel-ack PDU (connectionless only)
    CancelAck = 10,
    /// Bind PDU
    Bind = 11,
    /// Bind-ack PDU
    BindAck = 12,
    /// Bind-nak PDU
    BindNak = 13,
    /// Alter-context PDU
    AlterContext = 14,
    /// Alter-context-response PDU
    AlterContextResp = 15,
    /// Auth3 PDU (MS-RPCE extension for NTLM/Kerberos auth continuation)
    Auth3 = 16,
    /// Shutdown PDU
    Shutdown = 17,
    /// Co-cancel PDU
    CoCancel = 18,
    /// Orphaned PDU
    Orphaned = 19,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Request),
            1 => Some(Self::Ping),
            2 => Some(Self::Response),
            3 => Some(Self::Fault),
            4 => Some(Self::Working),
            5 => Some(Self::Nocall),
            6 => Some(Self::Reject),
            7 => Some(Self::Ack),
            8 => Some(Self::ClCancel),
            9 => Some(Self::Fack),
            10 => Some(Self::CancelAck),
            11 => Some(Self::Bind),
            12 => Some(Self::BindAck),
            13 => Some(Self::BindNak),
            14 => Some(Self::AlterContext),
            15 => Some(Self::AlterContextResp),
            16 => Some(Self::Auth3),
            17 => Some(Self::Shutdown),
            18 => Some(Self::CoCancel),
            19 => Some(Self::Orphaned),
            _ => None,
        }
    }
}

/// Packet flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags(u8);

impl PacketFlags {
    /// First fragment
    pub const FIRST_FRAG: u8 = 0x01;
    /// Last fragment
    pub const LAST_FRAG: u8 = 0x02;
    /// Cancel pending
    pub const PENDING_CANCEL: u8 = 0x04;
    /// Reserved (must be zero)
    pub const RESERVED: u8 = 0x08;
    /// Supports concurrent multiplexing
    pub const CONC_MPX: u8 = 0x10;
    /// Did not execute
    pub const DID_NOT_EXECUTE: u8 = 0x20;
    /// Maybe semantics requested
    pub const MAYBE: u8 = 0x40;
    /// Object UUID follows the request body header
    pub const OBJECT_UUID: u8 = 0x80;

    pub fn new() -> Self {
        Self(0)
    }

    /// Create flags for a complete (non-fragmented) PDU
    pub fn complete() -> Self {
        Self(Self::FIRST_FRAG | Self::LAST_FRAG)
    }

    pub fn set(&mut self, flag: u8, on: bool) -> &mut Self {
        if on {
            self.0 |= flag;
        } else {
            self.0 &= !flag;
        }
        self
    }

    pub fn contains(&self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    pub fn is_first_frag(&self) -> bool {
        self.contains(Self::FIRST_FRAG)
    }

    pub fn is_last_frag(&self) -> bool {
        self.contains(Self::LAST_FRAG)
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(value: u8) -> Self {
        Self(value)
    }
}

/// Data Representation Format Label
///
/// Format:
/// - Byte 0: Integer representation (bits 4-7) and character set (bits 0-3)
/// - Byte 1: Floating point representation
/// - Bytes 2-3: Reserved (must be zero)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRepresentation {
    /// Integer representation: 0 = big-endian, 1 = little-endian
    pub int_rep: IntRep,
    /// Character representation: 0 = ASCII, 1 = EBCDIC
    pub char_rep: CharRep,
    /// Floating point representation: 0 = IEEE, 1 = VAX, 2 = Cray, 3 = IBM
    pub float_rep: FloatRep,
}

/// Integer representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntRep {
    BigEndian = 0,
    LittleEndian = 1,
}

/// Character representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharRep {
    Ascii = 0,
    Ebcdic = 1,
}

/// Floating point representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatRep {
    Ieee = 0,
    Vax = 1,
    Cray = 2,
    Ibm = 3,
}

impl DataRepresentation {
    /// NDR default: little-endian, ASCII, IEEE
    pub fn ndr() -> Self {
        Self {
            int_rep: IntRep::LittleEndian,
            char_rep: CharRep::Ascii,
            float_rep: FloatRep::Ieee,
        }
    }

    pub fn big_endian() -> Self {
        Self {
            int_rep: IntRep::BigEndian,
            char_rep: CharRep::Ascii,
            float_rep: FloatRep::Ieee,
        }
    }

    /// For little-endian ASCII IEEE: `[0x10, 0x00, 0x00, 0x00]`
    pub fn encode(&self) -> [u8; 4] {
        let byte0 = (self.char_rep as u8) | ((self.int_rep as u8) << 4);
        let byte1 = self.float_rep as u8;
        [byte0, byte1, 0, 0]
    }

    pub fn decode(data: [u8; 4]) -> Self {
        let int_rep = if (data[0] & 0xF0) == 0 {
            IntRep::BigEndian
        } else {
            IntRep::LittleEndian
        };
        let char_rep = if (data[0] & 0x0F) == 0 {
            CharRep::Ascii
        } else {
            CharRep::Ebcdic
        };
        let float_rep = match data[1] {
            0 => FloatRep::Ieee,
            1 => FloatRep::Vax,
            2 => FloatRep::Cray,
            _ => FloatRep::Ibm,
        };
        Self {
            int_rep,
            char_rep,
            float_rep,
        }
    }

    pub fn is_little_endian(&self) -> bool {
        self.int_rep == IntRep::LittleEndian
    }

    /// NDR context matching this label's byte order
    pub fn ndr_context(&self) -> NdrContext {
        NdrContext::with_byte_order(self.is_little_endian())
    }
}

impl Default for DataRepresentation {
    fn default() -> Self {
        Self::ndr()
    }
}

/// UUID structure (128 bits)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub struct Uuid {
    pub time_low: u32,
    pub time_mid: u16,
    pub time_hi_and_version: u16,
    pub clock_seq_hi_and_reserved: u8,
    pub clock_seq_low: u8,
    pub node: [u8; 6],
}

impl Uuid {
    /// Nil UUID (all zeros)
    pub const NIL: Self = Self::from_fields(0, 0, 0, [0; 8]);

    /// Build from the GUID field layout (`Data1`, `Data2`, `Data3`, `Data4`)
    pub const fn from_fields(d1: u32, d2: u16, d3: u16, d4: [u8; 8]) -> Self {
        Self {
            time_low: d1,
            time_mid: d2,
            time_hi_and_version: d3,
            clock_seq_hi_and_reserved: d4[0],
            clock_seq_low: d4[1],
            node: [d4[2], d4[3], d4[4], d4[5], d4[6], d4[7]],
        }
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    /// Parse from string format "xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx"
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().trim_start_matches('{').trim_end_matches('}');
        if s.len() != 36 || !s.is_ascii() {
            return None;
        }
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() != 5 || parts[4].len() != 12 {
            return None;
        }

        let time_low = u32::from_str_radix(parts[0], 16).ok()?;
        let time_mid = u16::from_str_radix(parts[1], 16).ok()?;
        let time_hi_and_version = u16::from_str_radix(parts[2], 16).ok()?;
        let clock = u16::from_str_radix(parts[3], 16).ok()?;

        let mut node = [0u8; 6];
        for (i, byte) in node.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&parts[4][i * 2..i * 2 + 2], 16).ok()?;
        }

        Some(Self {
            time_low,
            time_mid,
            time_hi_and_version,
            clock_seq_hi_and_reserved: (clock >> 8) as u8,
            clock_seq_low: clock as u8,
            node,
        })
    }

    /// Encode UUID in wire format (respecting byte order)
    pub fn encode(&self, buf: &mut BytesMut, ctx: &NdrContext) {
        ctx.put_u32(buf, self.time_low);
        ctx.put_u16(buf, self.time_mid);
        ctx.put_u16(buf, self.time_hi_and_version);
        buf.put_u8(self.clock_seq_hi_and_reserved);
        buf.put_u8(self.clock_seq_low);
        buf.put_slice(&self.node);
    }

    /// Encode UUID to 16 bytes in little-endian format
    pub fn to_bytes_le(&self) -> [u8; 16] {
        let mut bytes = [0u8; 16];
        bytes[0..4].copy_from_slice(&self.time_low.to_le_bytes());
        bytes[4..6].copy_from_slice(&self.time_mid.to_le_bytes());
        bytes[6..8].copy_from_slice(&self.time_hi_and_version.to_le_bytes());
        bytes[8] = self.clock_seq_hi_and_reserved;
        bytes[9] = self.clock_seq_low;
        bytes[10..16].copy_from_slice(&self.node);
        bytes
    }

    /// Decode UUID from 16 bytes in little-endian format
    pub fn from_bytes_le(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; 16] = bytes.get(..16)?.try_into().ok()?;
        Some(Self {
            time_low: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            time_mid: u16::from_le_bytes([bytes[4], bytes[5]]),
            time_hi_and_version: u16::from_le_bytes([bytes[6], bytes[7]]),
            clock_seq_hi_and_reserved: bytes[8],
            clock_seq_low: bytes[9],
            node: [
                bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15],
            ],
        })
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.time_low,
            self.time_mid,
            self.time_hi_and_version,
            self.clock_seq_hi_and_reserved,
            self.clock_seq_low,
            self.node[0],
            self.node[1],
            self.node[2],
            self.node[3],
            self.node[4],
            self.node[5]
        )
    }
}

impl FromStr for Uuid {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| RpcError::InvalidPduData(format!("invalid UUID: {s:?}")))
    }
}

/// A UUID embedded in NDR stub data (`GUID`)
impl NdrEncode for Uuid {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
        w.write_data(self.time_low);
        w.write_data(self.time_mid);
        w.write_data(self.time_hi_and_version);
        w.write_data(self.clock_seq_hi_and_reserved);
        w.write_data(self.clock_seq_low);
        w.write_bytes(&self.node);
        Ok(())
    }
}

impl NdrDecode for Uuid {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
        self.time_low = r.read_data()?;
        self.time_mid = r.read_data()?;
        self.time_hi_and_version = r.read_data()?;
        self.clock_seq_hi_and_reserved = r.read_data()?;
        self.clock_seq_low = r.read_data()?;
        self.node.copy_from_slice(&r.read_bytes(6)?);
        Ok(())
    }

    fn ndr_min_size() -> usize {
        16
    }
}

/// Syntax ID - interface UUID with version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SyntaxId {
    pub uuid: Uuid,
    pub version: u32, // major in lower 16 bits, minor in upper 16 bits
}

impl SyntaxId {
    pub const fn new(uuid: Uuid, major: u16, minor: u16) -> Self {
        Self {
            uuid,
            version: (major as u32) | ((minor as u32) << 16),
        }
    }

    pub fn major_version(&self) -> u16 {
        self.version as u16
    }

    pub fn minor_version(&self) -> u16 {
        (self.version >> 16) as u16
    }

    pub fn encode(&self, buf: &mut BytesMut, ctx: &NdrContext) {
        self.uuid.encode(buf, ctx);
        ctx.put_u32(buf, self.version);
    }
}

impl fmt::Display for SyntaxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} v{}.{}",
            self.uuid,
            self.major_version(),
            self.minor_version()
        )
    }
}

/// NDR Transfer Syntax UUID
pub const NDR_SYNTAX_UUID: &str = "8a885d04-1ceb-11c9-9fe8-08002b104860";
pub const NDR_SYNTAX_VERSION: u32 = 2;

/// NDR20 transfer syntax
pub const NDR_TRANSFER_SYNTAX: SyntaxId = SyntaxId::new(
    Uuid::from_fields(
        0x8a88_5d04,
        0x1ceb,
        0x11c9,
        [0x9f, 0xe8, 0x08, 0x00, 0x2b, 0x10, 0x48, 0x60],
    ),
    NDR_SYNTAX_VERSION as u16,
    0,
);

/// Bounds-checked cursor over one PDU's bytes
struct BodyReader<'d> {
    data: &'d [u8],
    pos: usize,
    ctx: NdrContext,
}

impl<'d> BodyReader<'d> {
    fn new(data: &'d [u8], header: &PduHeader) -> Self {
        let end = (header.frag_length as usize).min(data.len());
        Self {
            data: &data[..end],
            pos: PduHeader::SIZE,
            ctx: header.data_rep.ndr_context(),
        }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'d [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| RpcError::InvalidPduData(format!("truncated {what}")))?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let mut b = self.take(2, what)?;
        Ok(self.ctx.get_u16(&mut b))
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let mut b = self.take(4, what)?;
        Ok(self.ctx.get_u32(&mut b))
    }

    fn uuid(&mut self) -> Result<Uuid> {
        let time_low = self.u32("uuid")?;
        let time_mid = self.u16("uuid")?;
        let time_hi_and_version = self.u16("uuid")?;
        let rest = self.take(8, "uuid")?;
        Ok(Uuid {
            time_low,
            time_mid,
            time_hi_and_version,
            clock_seq_hi_and_reserved: rest[0],
            clock_seq_low: rest[1],
            node: [rest[2], rest[3], rest[4], rest[5], rest[6], rest[7]],
        })
    }

    fn syntax(&mut self) -> Result<SyntaxId> {
        let uuid = self.uuid()?;
        let version = self.u32("syntax version")?;
        Ok(SyntaxId { uuid, version })
    }

    fn align(&mut self, alignment: usize) -> Result<()> {
        let padding = NdrContext::align_padding(self.pos, alignment);
        self.take(padding, "alignment padding").map(|_| ())
    }

    fn rest(&mut self) -> &'d [u8] {
        let out = &self.data[self.pos..];
        self.pos = self.data.len();
        out
    }
}

/// Start a PDU buffer with room for the common header
fn pdu_buffer(capacity: usize) -> BytesMut {
    let mut buf = BytesMut::with_capacity(PduHeader::SIZE + capacity);
    buf.put_bytes(0, PduHeader::SIZE);
    buf
}

/// Fill in the common header once the body length is known
fn seal(header: &PduHeader, mut buf: BytesMut) -> Result<Bytes> {
    let frag_length = u16::try_from(buf.len()).map_err(|_| RpcError::PduTooLarge {
        size: buf.len(),
        max: u16::MAX as usize,
    })?;
    let mut header = header.clone();
    header.frag_length = frag_length;
    header.auth_length = 0;

    let mut header_buf = BytesMut::with_capacity(PduHeader::SIZE);
    header.encode(&mut header_buf);
    buf[..PduHeader::SIZE].copy_from_slice(&header_buf);
    Ok(buf.freeze())
}

fn expect_type(header: &PduHeader, expected: PacketType) -> Result<()> {
    if header.packet_type != expected {
        return Err(RpcError::InvalidMessageType(header.packet_type as i32));
    }
    Ok(())
}

/// Common PDU header (16 bytes)
#[derive(Debug, Clone)]
pub struct PduHeader {
    /// RPC version (should be 5)
    pub version: u8,
    /// RPC minor version (0 or 1)
    pub version_minor: u8,
    /// Packet type
    pub packet_type: PacketType,
    /// Packet flags
    pub packet_flags: PacketFlags,
    /// Data representation
    pub data_rep: DataRepresentation,
    /// Total length of the PDU fragment
    pub frag_length: u16,
    /// Length of authentication data
    pub auth_length: u16,
    /// Call identifier
    pub call_id: u32,
}

impl PduHeader {
    /// PDU header size in bytes
    pub const SIZE: usize = 16;

    pub fn new(packet_type: PacketType, call_id: u32) -> Self {
        Self {
            version: DCE_RPC_VERSION,
            version_minor: DCE_RPC_VERSION_MINOR,
            packet_type,
            packet_flags: PacketFlags::complete(),
            data_rep: DataRepresentation::ndr(),
            frag_length: 0, // Set when encoding
            auth_length: 0,
            call_id,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let ctx = self.data_rep.ndr_context();
        buf.put_u8(self.version);
        buf.put_u8(self.version_minor);
        buf.put_u8(self.packet_type as u8);
        buf.put_u8(self.packet_flags.as_u8());
        buf.put_slice(&self.data_rep.encode());
        ctx.put_u16(buf, self.frag_length);
        ctx.put_u16(buf, self.auth_length);
        ctx.put_u32(buf, self.call_id);
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(RpcError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("PDU header too short: {} bytes", data.len()),
            )));
        }

        let version = data[0];
        if version != DCE_RPC_VERSION {
            return Err(RpcError::RpcVersionMismatch(version as u32));
        }

        let version_minor = data[1];
        let packet_type = PacketType::from_u8(data[2])
            .ok_or(RpcError::InvalidMessageType(data[2] as i32))?;
        let packet_flags = PacketFlags::from_u8(data[3]);
        let data_rep = DataRepresentation::decode([data[4], data[5], data[6], data[7]]);

        let ctx = data_rep.ndr_context();
        let mut rest = &data[8..Self::SIZE];
        let frag_length = ctx.get_u16(&mut rest);
        let auth_length = ctx.get_u16(&mut rest);
        let call_id = ctx.get_u32(&mut rest);

        if (frag_length as usize) < Self::SIZE {
            return Err(RpcError::InvalidPduData(format!(
                "fragment length {frag_length} shorter than header"
            )));
        }

        Ok(Self {
            version,
            version_minor,
            packet_type,
            packet_flags,
            data_rep,
            frag_length,
            auth_length,
            call_id,
        })
    }
}

/// Presentation context element offered in Bind/AlterContext
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextElement {
    pub context_id: u16,
    pub abstract_syntax: SyntaxId,
    pub transfer_syntaxes: Vec<SyntaxId>,
}

impl ContextElement {
    pub fn new(context_id: u16, abstract_syntax: SyntaxId, transfer_syntax: SyntaxId) -> Self {
        Self {
            context_id,
            abstract_syntax,
            transfer_syntaxes: vec![transfer_syntax],
        }
    }

    /// Offer `abstract_syntax` with the NDR20 transfer syntax
    pub fn ndr(context_id: u16, abstract_syntax: SyntaxId) -> Self {
        Self::new(context_id, abstract_syntax, NDR_TRANSFER_SYNTAX)
    }

    fn encode(&self, buf: &mut BytesMut, ctx: &NdrContext) -> Result<()> {
        ctx.put_u16(buf, self.context_id);
        buf.put_u8(count_u8(self.transfer_syntaxes.len(), "transfer syntaxes")?);
        buf.put_u8(0); // reserved
        self.abstract_syntax.encode(buf, ctx);
        for ts in &self.transfer_syntaxes {
            ts.encode(buf, ctx);
        }
        Ok(())
    }

    fn decode(r: &mut BodyReader<'_>) -> Result<Self> {
        let context_id = r.u16("context element")?;
        let num_transfer_syntaxes = r.u8("context element")?;
        let _reserved = r.u8("context element")?;
        let abstract_syntax = r.syntax()?;
        let mut transfer_syntaxes = Vec::with_capacity(num_transfer_syntaxes as usize);
        for _ in 0..num_transfer_syntaxes {
            transfer_syntaxes.push(r.syntax()?);
        }
        Ok(Self {
            context_id,
            abstract_syntax,
            transfer_syntaxes,
        })
    }
}

fn count_u8(n: usize, what: &str) -> Result<u8> {
    u8::try_from(n).map_err(|_| RpcError::InvalidPduData(format!("too many {what}: {n}")))
}

/// Result of one presentation context negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ContextResult {
    Acceptance = 0,
    UserRejection = 1,
    ProviderRejection = 2,
}

/// Why a presentation context was rejected (`p_provider_reason_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderReason {
    NotSpecified,
    AbstractSyntaxNotSupported,
    ProposedTransferSyntaxesNotSupported,
    LocalLimitExceeded,
    Other(u16),
}

impl ProviderReason {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::NotSpecified,
            1 => Self::AbstractSyntaxNotSupported,
            2 => Self::ProposedTransferSyntaxesNotSupported,
            3 => Self::LocalLimitExceeded,
            other => Self::Other(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Self::NotSpecified => 0,
            Self::AbstractSyntaxNotSupported => 1,
            Self::ProposedTransferSyntaxesNotSupported => 2,
            Self::LocalLimitExceeded => 3,
            Self::Other(v) => v,
        }
    }
}

impl fmt::Display for ProviderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSpecified => f.write_str("reason not specified"),
            Self::AbstractSyntaxNotSupported => f.write_str("abstract syntax is not supported"),
            Self::ProposedTransferSyntaxesNotSupported => {
                f.write_str("proposed transfer syntaxes not supported")
            }
            Self::LocalLimitExceeded => f.write_str("local limit exceeded"),
            Self::Other(v) => write!(f, "provider reason {v}"),
        }
    }
}

/// One entry of the result list in BindAck/AlterContextResp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationResult {
    pub result: ContextResult,
    pub reason: ProviderReason,
    pub transfer_syntax: SyntaxId,
}

impl PresentationResult {
    pub fn accepted(transfer_syntax: SyntaxId) -> Self {
        Self {
            result: ContextResult::Acceptance,
            reason: ProviderReason::NotSpecified,
            transfer_syntax,
        }
    }

    pub fn rejected(reason: ProviderReason) -> Self {
        Self {
            result: ContextResult::ProviderRejection,
            reason,
            transfer_syntax: SyntaxId::new(Uuid::NIL, 0, 0),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.result == ContextResult::Acceptance
    }
}

/// Shared body of Bind and AlterContext
#[derive(Debug, Clone)]
pub struct BindBody {
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub assoc_group_id: u32,
    pub context_list: Vec<ContextElement>,
}

impl BindBody {
    pub fn new(context_list: Vec<ContextElement>) -> Self {
        Self {
            max_xmit_frag: DEFAULT_MAX_FRAG,
            max_recv_frag: DEFAULT_MAX_FRAG,
            assoc_group_id: 0,
            context_list,
        }
    }

    fn encode(&self, header: &PduHeader) -> Result<Bytes> {
        let ctx = header.data_rep.ndr_context();
        let mut buf = pdu_buffer(12 + self.context_list.len() * 44);
        ctx.put_u16(&mut buf, self.max_xmit_frag);
        ctx.put_u16(&mut buf, self.max_recv_frag);
        ctx.put_u32(&mut buf, self.assoc_group_id);

        // p_cont_list_t
        buf.put_u8(count_u8(self.context_list.len(), "presentation contexts")?);
        buf.put_u8(0); // reserved
        ctx.put_u16(&mut buf, 0); // reserved2
        for elem in &self.context_list {
            elem.encode(&mut buf, &ctx)?;
        }
        seal(header, buf)
    }

    fn decode(data: &[u8], header: &PduHeader) -> Result<Self> {
        let mut r = BodyReader::new(data, header);
        let max_xmit_frag = r.u16("bind body")?;
        let max_recv_frag = r.u16("bind body")?;
        let assoc_group_id = r.u32("bind body")?;
        let num_contexts = r.u8("context list")?;
        let _reserved = r.u8("context list")?;
        let _reserved2 = r.u16("context list")?;
        let mut context_list = Vec::with_capacity(num_contexts as usize);
        for _ in 0..num_contexts {
            context_list.push(ContextElement::decode(&mut r)?);
        }
        Ok(Self {
            max_xmit_frag,
            max_recv_frag,
            assoc_group_id,
            context_list,
        })
    }
}

/// Shared body of BindAck and AlterContextResp
#[derive(Debug, Clone)]
pub struct BindAckBody {
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub assoc_group_id: u32,
    /// Secondary address (port spec); empty in AlterContextResp
    pub secondary_addr: String,
    pub results: Vec<PresentationResult>,
}

impl BindAckBody {
    pub fn new(assoc_group_id: u32, results: Vec<PresentationResult>) -> Self {
        Self {
            max_xmit_frag: DEFAULT_MAX_FRAG,
            max_recv_frag: DEFAULT_MAX_FRAG,
            assoc_group_id,
            secondary_addr: String::new(),
            results,
        }
    }

    fn encode(&self, header: &PduHeader) -> Result<Bytes> {
        let ctx = header.data_rep.ndr_context();
        let mut buf = pdu_buffer(16 + self.secondary_addr.len() + self.results.len() * 24);
        ctx.put_u16(&mut buf, self.max_xmit_frag);
        ctx.put_u16(&mut buf, self.max_recv_frag);
        ctx.put_u32(&mut buf, self.assoc_group_id);

        // port_any_t: an empty address is sent as length 0
        let addr = self.secondary_addr.as_bytes();
        if addr.is_empty() {
            ctx.put_u16(&mut buf, 0);
        } else {
            let len = u16::try_from(addr.len() + 1)
                .map_err(|_| RpcError::InvalidPduData("secondary address too long".into()))?;
            ctx.put_u16(&mut buf, len);
            buf.put_slice(addr);
            buf.put_u8(0);
        }
        buf.put_bytes(0, NdrContext::align_padding(buf.len(), 4));

        // p_result_list_t
        buf.put_u8(count_u8(self.results.len(), "presentation results")?);
        buf.put_u8(0); // reserved
        ctx.put_u16(&mut buf, 0); // reserved2
        for result in &self.results {
            ctx.put_u16(&mut buf, result.result as u16);
            ctx.put_u16(&mut buf, result.reason.as_u16());
            result.transfer_syntax.encode(&mut buf, &ctx);
        }
        seal(header, buf)
    }

    fn decode(data: &[u8], header: &PduHeader) -> Result<Self> {
        let mut r = BodyReader::new(data, header);
        let max_xmit_frag = r.u16("bind ack body")?;
        let max_recv_frag = r.u16("bind ack body")?;
        let assoc_group_id = r.u32("bind ack body")?;

        let addr_len = r.u16("secondary address")? as usize;
        let mut addr = r.take(addr_len, "secondary address")?;
        if let [rest @ .., 0] = addr {
            addr = rest;
        }
        let secondary_addr = String::from_utf8_lossy(addr).into_owned();
        r.align(4)?;

        let num_results = r.u8("result list")?;
        let _reserved = r.u8("result list")?;
        let _reserved2 = r.u16("result list")?;
        let mut results = Vec::with_capacity(num_results as usize);
        for _ in 0..num_results {
            let result = match r.u16("presentation result")? {
                0 => ContextResult::Acceptance,
                1 => ContextResult::UserRejection,
                _ => ContextResult::ProviderRejection,
            };
            let reason = ProviderReason::from_u16(r.u16("presentation result")?);
            let transfer_syntax = r.syntax()?;
            results.push(PresentationResult {
                result,
                reason,
                transfer_syntax,
            });
        }
        Ok(Self {
            max_xmit_frag,
            max_recv_frag,
            assoc_group_id,
            secondary_addr,
            results,
        })
    }
}

/// Bind PDU
#[derive(Debug, Clone)]
pub struct BindPdu {
    pub header: PduHeader,
    pub body: BindBody,
}

impl BindPdu {
    pub fn new(call_id: u32, context_list: Vec<ContextElement>) -> Self {
        Self {
            header: PduHeader::new(PacketType::Bind, call_id),
            body: BindBody::new(context_list),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        self.body.encode(&self.header)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        expect_type(&header, PacketType::Bind)?;
        let body = BindBody::decode(data, &header)?;
        Ok(Self { header, body })
    }
}

/// Alter Context PDU
///
/// Adds presentation contexts to an existing association.
#[derive(Debug, Clone)]
pub struct AlterContextPdu {
    pub header: PduHeader,
    pub body: BindBody,
}

impl AlterContextPdu {
    pub fn new(call_id: u32, context_list: Vec<ContextElement>) -> Self {
        Self {
            header: PduHeader::new(PacketType::AlterContext, call_id),
            body: BindBody::new(context_list),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        self.body.encode(&self.header)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        expect_type(&header, PacketType::AlterContext)?;
        let body = BindBody::decode(data, &header)?;
        Ok(Self { header, body })
    }
}

/// Bind acknowledgment PDU
#[derive(Debug, Clone)]
pub struct BindAckPdu {
    pub header: PduHeader,
    pub body: BindAckBody,
}

impl BindAckPdu {
    pub fn new(call_id: u32, assoc_group_id: u32, results: Vec<PresentationResult>) -> Self {
        Self {
            header: PduHeader::new(PacketType::BindAck, call_id),
            body: BindAckBody::new(assoc_group_id, results),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        self.body.encode(&self.header)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        expect_type(&header, PacketType::BindAck)?;
        let body = BindAckBody::decode(data, &header)?;
        Ok(Self { header, body })
    }
}

/// Alter context response PDU
#[derive(Debug, Clone)]
pub struct AlterContextRespPdu {
    pub header: PduHeader,
    pub body: BindAckBody,
}

impl AlterContextRespPdu {
    pub fn new(call_id: u32, assoc_group_id: u32, results: Vec<PresentationResult>) -> Self {
        Self {
            header: PduHeader::new(PacketType::AlterContextResp, call_id),
            body: BindAckBody::new(assoc_group_id, results),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        self.body.encode(&self.header)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        expect_type(&header, PacketType::AlterContextResp)?;
        let body = BindAckBody::decode(data, &header)?;
        Ok(Self { header, body })
    }
}

/// Why an association was refused (`p_reject_reason_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NotSpecified,
    TemporaryCongestion,
    LocalLimitExceeded,
    CalledPaddrUnknown,
    ProtocolVersionNotSupported,
    DefaultContextNotSupported,
    UserDataNotReadable,
    NoPsapAvailable,
    AuthTypeNotRecognized,
    InvalidChecksum,
    /// Used by peers that report a context-level failure at bind level
    AbstractSyntaxNotSupported,
    ProposedTransferSyntaxesNotSupported,
    Other(u16),
}

impl RejectReason {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::NotSpecified,
            1 => Self::TemporaryCongestion,
            2 => Self::LocalLimitExceeded,
            3 => Self::CalledPaddrUnknown,
            4 => Self::ProtocolVersionNotSupported,
            5 => Self::DefaultContextNotSupported,
            6 => Self::UserDataNotReadable,
            7 => Self::NoPsapAvailable,
            8 => Self::AuthTypeNotRecognized,
            9 => Self::InvalidChecksum,
            10 => Self::AbstractSyntaxNotSupported,
            11 => Self::ProposedTransferSyntaxesNotSupported,
            other => Self::Other(other),
        }
    }

    pub fn as_u16(self) -> u16 {
        match self {
            Self::NotSpecified => 0,
            Self::TemporaryCongestion => 1,
            Self::LocalLimitExceeded => 2,
            Self::CalledPaddrUnknown => 3,
            Self::ProtocolVersionNotSupported => 4,
            Self::DefaultContextNotSupported => 5,
            Self::UserDataNotReadable => 6,
            Self::NoPsapAvailable => 7,
            Self::AuthTypeNotRecognized => 8,
            Self::InvalidChecksum => 9,
            Self::AbstractSyntaxNotSupported => 10,
            Self::ProposedTransferSyntaxesNotSupported => 11,
            Self::Other(v) => v,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AbstractSyntaxNotSupported => f.write_str("abstract syntax is not supported"),
            Self::ProposedTransferSyntaxesNotSupported => {
                f.write_str("proposed transfer syntaxes not supported")
            }
            Self::LocalLimitExceeded => f.write_str("local limit exceeded"),
            Self::AuthTypeNotRecognized => f.write_str("authentication type was not recognized"),
            Self::InvalidChecksum => f.write_str("invalid checksum"),
            Self::ProtocolVersionNotSupported => f.write_str("protocol version not supported"),
            _ => write!(f, "unknown error ({})", self.as_u16()),
        }
    }
}

/// Bind negative acknowledgment PDU
///
/// Never carries an authentication verifier. With
/// `ProtocolVersionNotSupported` the server lists the versions it speaks.
#[derive(Debug, Clone)]
pub struct BindNakPdu {
    pub header: PduHeader,
    pub reason: RejectReason,
    /// Supported (major, minor) protocol versions
    pub versions: Vec<(u8, u8)>,
}

impl BindNakPdu {
    pub fn new(call_id: u32, reason: RejectReason) -> Self {
        let versions = if reason == RejectReason::ProtocolVersionNotSupported {
            vec![(DCE_RPC_VERSION, DCE_RPC_VERSION_MINOR)]
        } else {
            Vec::new()
        };
        Self {
            header: PduHeader::new(PacketType::BindNak, call_id),
            reason,
            versions,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let ctx = self.header.data_rep.ndr_context();
        let mut buf = pdu_buffer(4 + self.versions.len() * 2);
        ctx.put_u16(&mut buf, self.reason.as_u16());
        buf.put_u8(count_u8(self.versions.len(), "protocol versions")?);
        for (major, minor) in &self.versions {
            buf.put_u8(*major);
            buf.put_u8(*minor);
        }
        seal(&self.header, buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        expect_type(&header, PacketType::BindNak)?;
        let mut r = BodyReader::new(data, &header);
        let reason = RejectReason::from_u16(r.u16("bind nak")?);
        // Some peers omit the version list
        let count = r.u8("version list").unwrap_or(0);
        let mut versions = Vec::with_capacity(count as usize);
        for _ in 0..count {
            versions.push((r.u8("version list")?, r.u8("version list")?));
        }
        Ok(Self {
            header,
            reason,
            versions,
        })
    }
}

/// Split `stub` into chunks of at most `max_stub` bytes (always at least one)
fn split_stub(stub: &Bytes, max_stub: usize) -> Vec<Bytes> {
    if stub.len() <= max_stub {
        return vec![stub.clone()];
    }
    (0..stub.len())
        .step_by(max_stub)
        .map(|start| stub.slice(start..(start + max_stub).min(stub.len())))
        .collect()
}

/// Largest stub chunk fitting in `max_frag` after `overhead` bytes of headers,
/// rounded down to a multiple of 8 so each fragment keeps NDR alignment
fn stub_capacity(max_frag: usize, overhead: usize) -> Result<usize> {
    let capacity = max_frag.saturating_sub(overhead) & !7;
    if capacity == 0 {
        return Err(RpcError::InvalidPduData(format!(
            "fragment size {max_frag} leaves no room for stub data"
        )));
    }
    Ok(capacity)
}

fn set_fragment_flags(header: &mut PduHeader, index: usize, count: usize) {
    header
        .packet_flags
        .set(PacketFlags::FIRST_FRAG, index == 0)
        .set(PacketFlags::LAST_FRAG, index + 1 == count);
}

/// Request PDU
#[derive(Debug, Clone)]
pub struct RequestPdu {
    pub header: PduHeader,
    pub alloc_hint: u32,
    pub context_id: u16,
    pub opnum: u16,
    pub object_uuid: Option<Uuid>,
    pub stub_data: Bytes,
}

impl RequestPdu {
    /// Request header size (after common header): alloc_hint(4) + context_id(2) + opnum(2) = 8 bytes
    pub const BODY_HEADER_SIZE: usize = 8;

    pub fn new(call_id: u32, opnum: u16, stub_data: Bytes) -> Self {
        Self {
            header: PduHeader::new(PacketType::Request, call_id),
            alloc_hint: stub_data.len() as u32,
            context_id: 0,
            opnum,
            object_uuid: None,
            stub_data,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let ctx = self.header.data_rep.ndr_context();
        let mut buf = pdu_buffer(Self::BODY_HEADER_SIZE + 16 + self.stub_data.len());
        ctx.put_u32(&mut buf, self.alloc_hint);
        ctx.put_u16(&mut buf, self.context_id);
        ctx.put_u16(&mut buf, self.opnum);
        if let Some(uuid) = &self.object_uuid {
            uuid.encode(&mut buf, &ctx);
        }
        buf.put_slice(&self.stub_data);

        let mut header = self.header.clone();
        header
            .packet_flags
            .set(PacketFlags::OBJECT_UUID, self.object_uuid.is_some());
        seal(&header, buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        expect_type(&header, PacketType::Request)?;
        let mut r = BodyReader::new(data, &header);
        let alloc_hint = r.u32("request header")?;
        let context_id = r.u16("request header")?;
        let opnum = r.u16("request header")?;
        let object_uuid = if header.packet_flags.contains(PacketFlags::OBJECT_UUID) {
            Some(r.uuid()?)
        } else {
            None
        };
        let stub_data = Bytes::copy_from_slice(r.rest());

        Ok(Self {
            header,
            alloc_hint,
            context_id,
            opnum,
            object_uuid,
            stub_data,
        })
    }

    /// Encode as one or more fragments no larger than `max_frag`
    pub fn fragments(&self, max_frag: usize) -> Result<Vec<Bytes>> {
        let overhead = PduHeader::SIZE
            + Self::BODY_HEADER_SIZE
            + if self.object_uuid.is_some() { 16 } else { 0 };
        let chunks = split_stub(&self.stub_data, stub_capacity(max_frag, overhead)?);
        let count = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let mut frag = Self {
                    header: self.header.clone(),
                    alloc_hint: self.stub_data.len() as u32,
                    context_id: self.context_id,
                    opnum: self.opnum,
                    object_uuid: self.object_uuid,
                    stub_data: chunk,
                };
                set_fragment_flags(&mut frag.header, i, count);
                frag.encode()
            })
            .collect()
    }
}

/// Response PDU
#[derive(Debug, Clone)]
pub struct ResponsePdu {
    pub header: PduHeader,
    pub alloc_hint: u32,
    pub context_id: u16,
    pub cancel_count: u8,
    pub stub_data: Bytes,
}

impl ResponsePdu {
    /// Response header size (after common header): alloc_hint(4) + context_id(2) + cancel_count(1) + reserved(1) = 8 bytes
    pub const BODY_HEADER_SIZE: usize = 8;

    pub fn new(call_id: u32, stub_data: Bytes) -> Self {
        Self {
            header: PduHeader::new(PacketType::Response, call_id),
            alloc_hint: stub_data.len() as u32,
            context_id: 0,
            cancel_count: 0,
            stub_data,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let ctx = self.header.data_rep.ndr_context();
        let mut buf = pdu_buffer(Self::BODY_HEADER_SIZE + self.stub_data.len());
        ctx.put_u32(&mut buf, self.alloc_hint);
        ctx.put_u16(&mut buf, self.context_id);
        buf.put_u8(self.cancel_count);
        buf.put_u8(0); // reserved
        buf.put_slice(&self.stub_data);
        seal(&self.header, buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        expect_type(&header, PacketType::Response)?;
        let mut r = BodyReader::new(data, &header);
        let alloc_hint = r.u32("response header")?;
        let context_id = r.u16("response header")?;
        let cancel_count = r.u8("response header")?;
        let _reserved = r.u8("response header")?;
        let stub_data = Bytes::copy_from_slice(r.rest());

        Ok(Self {
            header,
            alloc_hint,
            context_id,
            cancel_count,
            stub_data,
        })
    }

    /// Encode as one or more fragments no larger than `max_frag`
    pub fn fragments(&self, max_frag: usize) -> Result<Vec<Bytes>> {
        let overhead = PduHeader::SIZE + Self::BODY_HEADER_SIZE;
        let chunks = split_stub(&self.stub_data, stub_capacity(max_frag, overhead)?);
        let count = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let mut frag = Self {
                    header: self.header.clone(),
                    alloc_hint: self.stub_data.len() as u32,
                    context_id: self.context_id,
                    cancel_count: self.cancel_count,
                    stub_data: chunk,
                };
                set_fragment_flags(&mut frag.header, i, count);
                frag.encode()
            })
            .collect()
    }
}

/// Fault PDU
#[derive(Debug, Clone)]
pub struct FaultPdu {
    pub header: PduHeader,
    pub alloc_hint: u32,
    pub context_id: u16,
    pub cancel_count: u8,
    pub status: u32,
}

impl FaultPdu {
    pub fn new(call_id: u32, status: u32) -> Self {
        Self {
            header: PduHeader::new(PacketType::Fault, call_id),
            alloc_hint: 0,
            context_id: 0,
            cancel_count: 0,
            status,
        }
    }

    /// Mark the call as never having reached the server stub
    pub fn did_not_execute(mut self) -> Self {
        self.header
            .packet_flags
            .set(PacketFlags::DID_NOT_EXECUTE, true);
        self
    }

    pub fn encode(&self) -> Result<Bytes> {
        let ctx = self.header.data_rep.ndr_context();
        let mut buf = pdu_buffer(16);
        ctx.put_u32(&mut buf, self.alloc_hint);
        ctx.put_u16(&mut buf, self.context_id);
        buf.put_u8(self.cancel_count);
        buf.put_u8(0); // reserved
        ctx.put_u32(&mut buf, self.status);
        buf.put_u32(0); // reserved
        seal(&self.header, buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        expect_type(&header, PacketType::Fault)?;
        let mut r = BodyReader::new(data, &header);
        let alloc_hint = r.u32("fault body")?;
        let context_id = r.u16("fault body")?;
        let cancel_count = r.u8("fault body")?;
        let _reserved = r.u8("fault body")?;
        let status = r.u32("fault status")?;

        Ok(Self {
            header,
            alloc_hint,
            context_id,
            cancel_count,
            status,
        })
    }
}

/// Header-only PDUs: Shutdown, CoCancel, Orphaned
#[derive(Debug, Clone)]
pub struct ControlPdu {
    pub header: PduHeader,
}

impl ControlPdu {
    pub fn new(packet_type: PacketType, call_id: u32) -> Self {
        Self {
            header: PduHeader::new(packet_type, call_id),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        seal(&self.header, pdu_buffer(0))
    }
}

/// Represents any connection-oriented DCE RPC PDU
#[derive(Debug, Clone)]
pub enum Pdu {
    Bind(BindPdu),
    BindAck(BindAckPdu),
    BindNak(BindNakPdu),
    AlterContext(AlterContextPdu),
    AlterContextResp(AlterContextRespPdu),
    Request(RequestPdu),
    Response(ResponsePdu),
    Fault(FaultPdu),
    Shutdown(ControlPdu),
    CoCancel(ControlPdu),
    Orphaned(ControlPdu),
}

impl Pdu {
    /// Decode a PDU from raw bytes
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        match header.packet_type {
            PacketType::Bind => Ok(Pdu::Bind(BindPdu::decode(data)?)),
            PacketType::BindAck => Ok(Pdu::BindAck(BindAckPdu::decode(data)?)),
            PacketType::BindNak => Ok(Pdu::BindNak(BindNakPdu::decode(data)?)),
            PacketType::AlterContext => Ok(Pdu::AlterContext(AlterContextPdu::decode(data)?)),
            PacketType::AlterContextResp => {
                Ok(Pdu::AlterContextResp(AlterContextRespPdu::decode(data)?))
            }
            PacketType::Request => Ok(Pdu::Request(RequestPdu::decode(data)?)),
            PacketType::Response => Ok(Pdu::Response(ResponsePdu::decode(data)?)),
            PacketType::Fault => Ok(Pdu::Fault(FaultPdu::decode(data)?)),
            PacketType::Shutdown => Ok(Pdu::Shutdown(ControlPdu { header })),
            PacketType::CoCancel => Ok(Pdu::CoCancel(ControlPdu { header })),
            PacketType::Orphaned => Ok(Pdu::Orphaned(ControlPdu { header })),
            other => Err(RpcError::InvalidMessageType(other as i32)),
        }
    }

    /// Encode the PDU to bytes
    pub fn encode(&self) -> Result<Bytes> {
        match self {
            Pdu::Bind(pdu) => pdu.encode(),
            Pdu::BindAck(pdu) => pdu.encode(),
            Pdu::BindNak(pdu) => pdu.encode(),
            Pdu::AlterContext(pdu) => pdu.encode(),
            Pdu::AlterContextResp(pdu) => pdu.encode(),
            Pdu::Request(pdu) => pdu.encode(),
            Pdu::Response(pdu) => pdu.encode(),
            Pdu::Fault(pdu) => pdu.encode(),
            Pdu::Shutdown(pdu) | Pdu::CoCancel(pdu) | Pdu::Orphaned(pdu) => pdu.encode(),
        }
    }

    pub fn header(&self) -> &PduHeader {
        match self {
            Pdu::Bind(pdu) => &pdu.header,
            Pdu::BindAck(pdu) => &pdu.header,
            Pdu::BindNak(pdu) => &pdu.header,
            Pdu::AlterContext(pdu) => &pdu.header,
            Pdu::AlterContextResp(pdu) => &pdu.header,
            Pdu::Request(pdu) => &pdu.header,
            Pdu::Response(pdu) => &pdu.header,
            Pdu::Fault(pdu) => &pdu.header,
            Pdu::Shutdown(pdu) | Pdu::CoCancel(pdu) | Pdu::Orphaned(pdu) => &pdu.header,
        }
    }

    /// Get the call ID from the PDU header
    pub fn call_id(&self) -> u32 {
        self.header().call_id
    }
}
