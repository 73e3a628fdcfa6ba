//! DCOM identifier types (MS-DCOM 2.2.18)
//!
//! - IPID: Interface Pointer Identifier
//! - IID: Interface Identifier
//! - CID: Causality Identifier

use dcerpc::Uuid;
use midl_ndr::{NdrDecode, NdrEncode, NdrReader, NdrWriter};
use std::fmt;

/// Generate a new random v4 UUID
pub fn generate_uuid() -> Uuid {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    Uuid {
        time_low: u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        time_mid: u16::from_be_bytes([bytes[4], bytes[5]]),
        time_hi_and_version: u16::from_be_bytes([bytes[6], bytes[7]]),
        clock_seq_hi_and_reserved: bytes[8],
        clock_seq_low: bytes[9],
        node: [bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]],
    }
}

macro_rules! guid_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
        pub struct $name(pub Uuid);

        impl $name {
            pub const NIL: Self = Self(Uuid::NIL);

            pub fn new(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// A fresh random value
            pub fn generate() -> Self {
                Self(generate_uuid())
            }

            pub fn parse(s: &str) -> Option<Self> {
                Uuid::parse(s).map(Self)
            }

            pub fn is_nil(&self) -> bool {
                self.0.is_nil()
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl NdrEncode for $name {
            fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> midl_ndr::Result<()> {
                self.0.ndr_write(w)
            }
        }

        impl NdrDecode for $name {
            fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> midl_ndr::Result<()> {
                self.0.ndr_read(r)
            }

            fn ndr_min_size() -> usize {
                16
            }
        }
    };
}

guid_newtype!(
    /// Interface Pointer Identifier
    ///
    /// Scopes a call to one interface of one object instance. Sent as
    /// the object UUID of every request PDU.
    Ipid
);

guid_newtype!(
    /// Interface Identifier
    Iid
);

guid_newtype!(
    /// Causality Identifier, carried in ORPCTHIS
    Cid
);
