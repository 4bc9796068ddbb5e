use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use super::*;
use crate::message::packer::*;
use shared::error::*;

// An UnknownResource keeps the raw RDATA of a record type this crate does
// not interpret (NSEC, HINFO, ...), so one exotic record does not make a
// whole mDNS message unreadable.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub(crate) struct UnknownResource {
    pub(crate) typ: u16,
    pub(crate) data: Vec<u8>,
}

impl fmt::Display for UnknownResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} bytes>", self.data.len())
    }
}

impl ResourceBody for UnknownResource {
    fn real_type(&self) -> DnsType {
        DnsType::from(self.typ)
    }

    fn pack(
        &self,
        msg: Vec<u8>,
        _compression: &mut Option<HashMap<String, usize>>,
        _compression_off: usize,
    ) -> Result<Vec<u8>> {
        Ok(pack_bytes(msg, &self.data))
    }

    fn unpack(&mut self, msg: &[u8], off: usize, length: usize) -> Result<usize> {
        let end = off + length;
        if end > msg.len() {
            return Err(Error::ErrResourceLen);
        }
        self.data = msg[off..end].to_vec();
        Ok(end)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
