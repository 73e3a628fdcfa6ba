//! Reassembly of fragmented requests and responses
//!
//! A call whose stub exceeds the negotiated fragment size arrives as a
//! run of PDUs sharing one call id, the first flagged FIRST_FRAG and the
//! last flagged LAST_FRAG. Outbound splitting lives on the PDU types
//! (`RequestPdu::fragments`, `ResponsePdu::fragments`).

use crate::dcerpc::PduHeader;
use crate::error::{Result, RpcError};
use bytes::{Bytes, BytesMut};

/// Upper bound on a reassembled stub (16 MiB)
pub const DEFAULT_MAX_STUB_SIZE: usize = 16 * 1024 * 1024;

/// Collects fragments of one call until LAST_FRAG arrives
#[derive(Debug)]
pub struct FragmentAssembler {
    call_id: u32,
    context_id: u16,
    stub_data: BytesMut,
    max_size: usize,
    received_first: bool,
}

impl FragmentAssembler {
    pub fn new(call_id: u32) -> Self {
        Self {
            call_id,
            context_id: 0,
            stub_data: BytesMut::new(),
            max_size: DEFAULT_MAX_STUB_SIZE,
            received_first: false,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn call_id(&self) -> u32 {
        self.call_id
    }

    pub fn context_id(&self) -> u16 {
        self.context_id
    }

    /// Add one fragment's stub.
    ///
    /// Returns the complete stub once the last fragment is in.
    pub fn add_fragment(
        &mut self,
        header: &PduHeader,
        context_id: u16,
        alloc_hint: u32,
        stub: &[u8],
    ) -> Result<Option<Bytes>> {
        if header.call_id != self.call_id {
            return Err(RpcError::InvalidPduData(format!(
                "fragment for call {} in assembly of call {}",
                header.call_id, self.call_id
            )));
        }

        if header.packet_flags.is_first_frag() {
            if self.received_first {
                return Err(RpcError::InvalidPduData(
                    "received duplicate first fragment".to_string(),
                ));
            }
            self.received_first = true;
            self.context_id = context_id;
            // alloc_hint is advisory; never reserve past the limit
            self.stub_data
                .reserve((alloc_hint as usize).min(self.max_size));
        } else if !self.received_first {
            return Err(RpcError::InvalidPduData(
                "fragment arrived before the first fragment".to_string(),
            ));
        }

        if context_id != self.context_id {
            return Err(RpcError::InvalidPduData(format!(
                "fragment context {context_id} differs from {}",
                self.context_id
            )));
        }

        let total = self.stub_data.len() + stub.len();
        if total > self.max_size {
            return Err(RpcError::RecordTooLarge {
                size: total,
                max: self.max_size,
            });
        }
        self.stub_data.extend_from_slice(stub);

        if header.packet_flags.is_last_frag() {
            Ok(Some(self.stub_data.split().freeze()))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcerpc::{Pdu, RequestPdu, ResponsePdu};

    #[test]
    fn test_reassemble_request() {
        let stub = Bytes::from((0..=255u8).cycle().take(10_000).collect::<Vec<_>>());
        let mut request = RequestPdu::new(7, 5, stub.clone());
        request.context_id = 2;
        let fragments = request.fragments(1000).unwrap();
        assert!(fragments.len() > 1);

        let mut assembler = FragmentAssembler::new(7);
        let mut complete = None;
        for frag in &fragments {
            let Pdu::Request(pdu) = Pdu::decode(frag).unwrap() else {
                panic!("expected request");
            };
            assert!(complete.is_none());
            complete = assembler
                .add_fragment(&pdu.header, pdu.context_id, pdu.alloc_hint, &pdu.stub_data)
                .unwrap();
        }
        assert_eq!(complete.unwrap(), stub);
        assert_eq!(assembler.context_id(), 2);
    }

    #[test]
    fn test_out_of_order_rejected() {
        let response = ResponsePdu::new(3, Bytes::from(vec![1u8; 300]));
        let fragments = response.fragments(128).unwrap();
        let second = ResponsePdu::decode(&fragments[1]).unwrap();

        let mut assembler = FragmentAssembler::new(3);
        assert!(assembler
            .add_fragment(&second.header, 0, 300, &second.stub_data)
            .is_err());
    }

    #[test]
    fn test_size_limit() {
        let response = ResponsePdu::new(3, Bytes::from(vec![1u8; 300]));
        let fragments = response.fragments(128).unwrap();

        let mut assembler = FragmentAssembler::new(3).with_max_size(200);
        let mut result = Ok(None);
        for frag in &fragments {
            let pdu = ResponsePdu::decode(frag).unwrap();
            result = assembler.add_fragment(&pdu.header, 0, pdu.alloc_hint, &pdu.stub_data);
            if result.is_err() {
                break;
            }
        }
        assert!(matches!(result, Err(RpcError::RecordTooLarge { max: 200, .. })));
    }

    #[test]
    fn test_wrong_call_rejected() {
        let pdu = ResponsePdu::decode(&ResponsePdu::new(9, Bytes::new()).encode().unwrap()).unwrap();
        let mut assembler = FragmentAssembler::new(1);
        assert!(assembler
            .add_fragment(&pdu.header, 0, 0, &pdu.stub_data)
            .is_err());
    }
}
