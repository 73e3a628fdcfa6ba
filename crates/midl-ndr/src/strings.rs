//! NDR string types
//!
//! `[string]` arrays are conformant varying arrays whose last transmitted
//! element is a null terminator.
//!
//! Wire format:
//! ```text
//! max_count: u32    # Maximum elements including null
//! offset: u32       # Always 0
//! actual_count: u32 # Actual elements including null
//! chars[actual_count]
//! ```
//!
//! `BSTR` values travel as a `FLAGGED_WORD_BLOB`, which carries an explicit
//! byte length and no terminator.

use crate::{NdrDecode, NdrEncode, NdrError, NdrReader, NdrWriter, Result};

macro_rules! string_wrapper {
    ($name:ident) => {
        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

/// ANSI string type (null-terminated char*)
///
/// Used for `[string]` annotated `char*` parameters in MIDL.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdrString(pub String);

string_wrapper!(NdrString);

/// Wide string type (null-terminated wchar_t*), UTF-16 on the wire
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NdrWString(pub String);

string_wrapper!(NdrWString);

/// BSTR referent (`FLAGGED_WORD_BLOB`)
///
/// A null BSTR is a null unique pointer, so fields hold `Option<BString>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BString(pub String);

string_wrapper!(BString);

/// Read the header of a `[string]` array and return its element count
fn read_string_header(r: &mut NdrReader<'_>, element_size: usize) -> Result<usize> {
    let max_count = r.read_size()?;
    let offset = r.read_size()?;
    let actual_count = r.read_size()?;

    if offset != 0 {
        return Err(NdrError::InvalidString("non-zero offset".to_string()));
    }
    if actual_count > max_count {
        return Err(NdrError::ConformanceMismatch {
            max_count,
            actual_count,
        });
    }
    if actual_count == 0 {
        return Err(NdrError::InvalidString("missing terminator".to_string()));
    }
    r.check_count(actual_count, element_size)
}

impl NdrEncode for NdrString {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let bytes = self.0.as_bytes();
        let len_with_null = bytes.len() + 1;
        w.write_size(len_with_null)?;
        w.write_size(0)?;
        w.write_size(len_with_null)?;
        w.write_bytes(bytes);
        w.write_data(0u8);
        Ok(())
    }
}

impl NdrDecode for NdrString {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        let count = read_string_header(r, 1)?;
        let bytes = r.read_bytes(count)?;
        let Some((&0, body)) = bytes.split_last() else {
            return Err(NdrError::InvalidString("missing terminator".to_string()));
        };
        self.0 = String::from_utf8(body.to_vec())?;
        Ok(())
    }

    fn ndr_min_size() -> usize {
        13
    }
}

impl NdrEncode for NdrWString {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let utf16: Vec<u16> = self.0.encode_utf16().collect();
        let len_with_null = utf16.len() + 1;
        w.write_size(len_with_null)?;
        w.write_size(0)?;
        w.write_size(len_with_null)?;
        for unit in utf16 {
            w.write_data(unit);
        }
        w.write_data(0u16);
        Ok(())
    }
}

impl NdrDecode for NdrWString {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        let count = read_string_header(r, 2)?;
        let mut utf16 = Vec::with_capacity(count);
        for _ in 0..count {
            utf16.push(r.read_data::<u16>()?);
        }
        if utf16.pop() != Some(0) {
            return Err(NdrError::InvalidString("missing terminator".to_string()));
        }
        self.0 = char::decode_utf16(utf16).collect::<std::result::Result<String, _>>()?;
        Ok(())
    }

    fn ndr_min_size() -> usize {
        14
    }
}

/// Wire format:
/// ```text
/// max_count: u32    # conformance, in UTF-16 units
/// byte_len: u32     # length in bytes
/// unit_count: u32   # UTF-16 units transmitted
/// units[unit_count]
/// ```
impl NdrEncode for BString {
    fn ndr_write<'a>(&'a self, w: &mut NdrWriter<'a>) -> Result<()> {
        let utf16: Vec<u16> = self.0.encode_utf16().collect();
        let byte_len = utf16
            .len()
            .checked_mul(2)
            .ok_or(NdrError::IntegerOverflow)?;
        w.write_size(utf16.len())?;
        w.write_size(byte_len)?;
        w.write_size(utf16.len())?;
        for unit in utf16 {
            w.write_data(unit);
        }
        Ok(())
    }
}

impl NdrDecode for BString {
    fn ndr_read<'a>(&'a mut self, r: &mut NdrReader<'a>) -> Result<()> {
        let max_count = r.read_size()?;
        let byte_len = r.read_size()?;
        let unit_count = r.read_size()?;
        if unit_count > max_count {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count: unit_count,
            });
        }
        if byte_len as u64 > unit_count as u64 * 2 {
            return Err(NdrError::InvalidString(format!(
                "byte length {byte_len} exceeds {unit_count} units"
            )));
        }
        let count = r.check_count(unit_count, 2)?;
        let mut utf16 = Vec::with_capacity(count);
        for _ in 0..count {
            utf16.push(r.read_data::<u16>()?);
        }
        // Odd byte lengths leave half a unit unused; drop it.
        utf16.truncate(byte_len as usize / 2);
        self.0 = char::decode_utf16(utf16).collect::<std::result::Result<String, _>>()?;
        Ok(())
    }

    fn ndr_min_size() -> usize {
        12
    }
}
