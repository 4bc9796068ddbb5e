pub(crate) mod a;
pub(crate) mod aaaa;
pub(crate) mod ptr;
pub(crate) mod srv;
pub(crate) mod txt;
pub(crate) mod unknown;

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use a::*;
use aaaa::*;
use ptr::*;
use srv::*;
use txt::*;
use unknown::*;

use super::name::*;
use super::packer::*;
use super::*;
use shared::error::*;

/// A resource record: owner name, type, class, TTL and typed RDATA.
#[derive(Default, Debug)]
pub(crate) struct Resource {
    pub(crate) header: ResourceHeader,
    pub(crate) body: Option<Box<dyn ResourceBody>>,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        match &self.body {
            Some(body) => write!(f, " {body}"),
            None => f.write_str(" <empty>"),
        }
    }
}

impl Resource {
    pub(crate) fn new(name: Name, class: DnsClass, ttl: u32, body: Box<dyn ResourceBody>) -> Self {
        Resource {
            header: ResourceHeader {
                name,
                typ: body.real_type(),
                class,
                ttl,
                length: 0,
            },
            body: Some(body),
        }
    }

    /// Appends the record to `msg`. The header type and RDATA length are
    /// taken from the body.
    pub(crate) fn pack(
        &mut self,
        msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        let body = self.body.as_ref().ok_or(Error::ErrNilResourceBody)?;
        self.header.typ = body.real_type();

        let mut msg = self.header.name.pack(msg, compression, compression_off)?;
        msg = self.header.typ.pack(msg);
        msg = self.header.class.pack(msg);
        msg = pack_uint32(msg, self.header.ttl);
        let len_off = msg.len();
        msg = pack_uint16(msg, 0);

        let rdata_start = msg.len();
        msg = body.pack(msg, compression, compression_off)?;
        let length = u16::try_from(msg.len() - rdata_start).map_err(|_| Error::ErrResTooLong)?;
        msg[len_off..len_off + 2].copy_from_slice(&length.to_be_bytes());
        self.header.length = length;
        Ok(msg)
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let off = self.header.unpack(msg, off)?;
        let (body, off) =
            unpack_resource_body(self.header.typ, msg, off, self.header.length as usize)?;
        self.body = Some(body);
        Ok(off)
    }

    /// Downcasts the body to a concrete record type.
    pub(crate) fn body_as<T: 'static>(&self) -> Option<&T> {
        self.body.as_ref()?.as_any().downcast_ref::<T>()
    }

    /// A TTL of zero withdraws the record (RFC 6762 section 10.1).
    pub(crate) fn is_goodbye(&self) -> bool {
        self.header.ttl == 0
    }
}

/// Everything in a record before the RDATA.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub(crate) struct ResourceHeader {
    pub(crate) name: Name,
    /// Filled from the body when packing.
    pub(crate) typ: DnsType,
    /// Responders set the top bit as the cache-flush flag, see
    /// [`DnsClass::without_cache_flush`].
    pub(crate) class: DnsClass,
    pub(crate) ttl: u32,
    /// RDATA length, filled when packing.
    pub(crate) length: u16,
}

impl fmt::Display for ResourceHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} ttl={}",
            self.name, self.class, self.typ, self.ttl
        )?;
        if self.class.0 & CLASS_CACHE_FLUSH != 0 {
            f.write_str(" flush")?;
        }
        Ok(())
    }
}

impl ResourceHeader {
    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let off = self.name.unpack(msg, off)?;
        let off = self.typ.unpack(msg, off)?;
        let off = self.class.unpack(msg, off)?;
        let (ttl, off) = unpack_uint32(msg, off)?;
        let (length, off) = unpack_uint16(msg, off)?;
        self.ttl = ttl;
        self.length = length;
        Ok(off)
    }
}

/// Typed RDATA of a record.
pub(crate) trait ResourceBody: fmt::Display + fmt::Debug + Send {
    fn real_type(&self) -> DnsType;

    fn pack(
        &self,
        msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>>;

    fn unpack(&mut self, msg: &[u8], off: usize, length: usize) -> Result<usize>;

    fn as_any(&self) -> &dyn Any;
}

pub(crate) fn unpack_resource_body(
    typ: DnsType,
    msg: &[u8],
    off: usize,
    length: usize,
) -> Result<(Box<dyn ResourceBody>, usize)> {
    let end = off + length;
    if end > msg.len() {
        return Err(Error::ErrResourceLen);
    }

    let mut body: Box<dyn ResourceBody> = match typ {
        DnsType::A => Box::<AResource>::default(),
        DnsType::Aaaa => Box::<AaaaResource>::default(),
        DnsType::Ptr => Box::<PtrResource>::default(),
        DnsType::Srv => Box::<SrvResource>::default(),
        DnsType::Txt => Box::<TxtResource>::default(),
        other => Box::new(UnknownResource {
            typ: other.code(),
            data: vec![],
        }),
    };
    body.unpack(msg, off, length)?;

    // RDATA names may point anywhere in the message; the record length
    // decides where the next record starts.
    Ok((body, end))
}
