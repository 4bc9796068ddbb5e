use std::collections::HashMap;
use std::fmt;

use super::name::*;
use super::*;
use shared::error::Result;

/// An entry of the question section.
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub(crate) struct Question {
    pub(crate) name: Name,
    pub(crate) typ: DnsType,
    pub(crate) class: DnsClass,
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.name, self.class, self.typ)
    }
}

impl Question {
    /// An `IN` question for `name`, answered over multicast.
    pub(crate) fn new(name: Name, typ: DnsType) -> Self {
        Question {
            name,
            typ,
            class: DNSCLASS_INET,
        }
    }

    /// Whether the asker would accept a unicast reply (the QU bit).
    pub(crate) fn wants_unicast(&self) -> bool {
        self.class.0 & CLASS_CACHE_FLUSH != 0
    }

    pub(crate) fn pack(
        &self,
        msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        let msg = self.name.pack(msg, compression, compression_off)?;
        Ok(self.class.pack(self.typ.pack(msg)))
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let off = self.name.unpack(msg, off)?;
        let off = self.typ.unpack(msg, off)?;
        self.class.unpack(msg, off)
    }
}
