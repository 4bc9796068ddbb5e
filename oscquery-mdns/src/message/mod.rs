//! DNS message codec, reduced to what multicast DNS service discovery
//! exchanges: PTR browse questions and PTR/SRV/TXT/A/AAAA answers.
//! Records of any other type are carried as opaque bytes.


pub(crate) mod header;
pub(crate) mod name;
mod packer;
pub(crate) mod parser;
pub(crate) mod question;
pub(crate) mod resource;

use std::collections::HashMap;
use std::fmt;

use header::*;
use packer::*;
use parser::*;
use question::*;
use resource::*;

use shared::error::*;

macro_rules! dns_types {
    ($($variant:ident = $code:literal => $label:literal,)*) => {
        /// Record type of a question or resource record.
        ///
        /// Codes outside the table survive a parse/pack cycle as
        /// [`DnsType::Other`].
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
        pub(crate) enum DnsType {
            $($variant,)*
            Other(u16),
        }

        impl DnsType {
            pub(crate) fn code(self) -> u16 {
                match self {
                    $(DnsType::$variant => $code,)*
                    DnsType::Other(code) => code,
                }
            }
        }

        impl From<u16> for DnsType {
            fn from(code: u16) -> Self {
                match code {
                    $($code => DnsType::$variant,)*
                    other => DnsType::Other(other),
                }
            }
        }

        impl fmt::Display for DnsType {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(DnsType::$variant => f.write_str($label),)*
                    DnsType::Other(code) => write!(f, "TYPE{code}"),
                }
            }
        }
    };
}

dns_types! {
    A = 1 => "A",
    Ptr = 12 => "PTR",
    Txt = 16 => "TXT",
    Aaaa = 28 => "AAAA",
    Srv = 33 => "SRV",
    Opt = 41 => "OPT",
    Nsec = 47 => "NSEC",
    All = 255 => "ANY",
}

impl Default for DnsType {
    fn default() -> Self {
        DnsType::Other(0)
    }
}

impl DnsType {
    pub(crate) fn pack(&self, msg: Vec<u8>) -> Vec<u8> {
        pack_uint16(msg, self.code())
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let (code, off) = unpack_uint16(msg, off)?;
        *self = DnsType::from(code);
        Ok(off)
    }
}

/// Class of a question or record.
///
/// Only `DNSCLASS_INET` is used by mDNS. Responders set the top bit of the
/// class of a record as the cache-flush flag (RFC 6762 section 10.2), and
/// questions use the same bit to request a unicast response.
#[derive(Default, Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct DnsClass(pub(crate) u16);

/// Internet class (IN).
pub(crate) const DNSCLASS_INET: DnsClass = DnsClass(1);

/// Any class (*), only valid in questions.
pub(crate) const DNSCLASS_ANY: DnsClass = DnsClass(255);

/// Cache-flush bit of an mDNS record class.
pub(crate) const CLASS_CACHE_FLUSH: u16 = 1 << 15;

impl fmt::Display for DnsClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.without_cache_flush() {
            DNSCLASS_INET => f.write_str("ClassINET"),
            DNSCLASS_ANY => f.write_str("ClassANY"),
            DnsClass(other) => write!(f, "{other}"),
        }
    }
}

impl DnsClass {
    /// `IN` with the cache-flush bit set, for records this host owns.
    pub(crate) fn unique() -> DnsClass {
        DnsClass(DNSCLASS_INET.0 | CLASS_CACHE_FLUSH)
    }

    pub(crate) fn pack(&self, msg: Vec<u8>) -> Vec<u8> {
        pack_uint16(msg, self.0)
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let (class, off) = unpack_uint16(msg, off)?;
        self.0 = class;
        Ok(off)
    }

    pub(crate) fn without_cache_flush(&self) -> DnsClass {
        DnsClass(self.0 & !CLASS_CACHE_FLUSH)
    }
}

const UINT16LEN: usize = 2;
const UINT32LEN: usize = 4;

// Most mDNS messages fit a single Ethernet frame.
const PACK_STARTING_CAP: usize = 512;

/// A full DNS message.
#[derive(Default, Debug)]
pub(crate) struct Message {
    pub(crate) header: Header,
    pub(crate) questions: Vec<Question>,
    pub(crate) answers: Vec<Resource>,
    pub(crate) authorities: Vec<Resource>,
    pub(crate) additionals: Vec<Resource>,
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.header)?;
        for q in &self.questions {
            write!(f, "\n  ? {q}")?;
        }
        for (tag, records) in [
            ("an", &self.answers),
            ("ns", &self.authorities),
            ("ar", &self.additionals),
        ] {
            for r in records {
                write!(f, "\n  {tag} {r}")?;
            }
        }
        Ok(())
    }
}

impl Message {
    /// A multicast query asking `questions`.
    pub(crate) fn query(questions: Vec<Question>) -> Self {
        Message {
            questions,
            ..Default::default()
        }
    }

    /// An authoritative response.
    pub(crate) fn response(answers: Vec<Resource>, additionals: Vec<Resource>) -> Self {
        Message {
            header: Header::authoritative_response(),
            answers,
            additionals,
            ..Default::default()
        }
    }

    /// Parses every section of `msg`.
    pub(crate) fn parse(msg: &[u8]) -> Result<Self> {
        let mut p = Parser::default();
        let header = p.start(msg)?;
        Ok(Message {
            header,
            questions: p.all_questions()?,
            answers: p.all_answers()?,
            authorities: p.all_authorities()?,
            additionals: p.all_additionals()?,
        })
    }

    /// Answer, authority and additional records in wire order.
    pub(crate) fn records(&self) -> impl Iterator<Item = &Resource> {
        self.answers
            .iter()
            .chain(&self.authorities)
            .chain(&self.additionals)
    }

    /// Encodes the message with name compression. Section counts are taken
    /// from the vectors.
    pub(crate) fn pack(&mut self) -> Result<Vec<u8>> {
        let count = |len: usize, err: Error| u16::try_from(len).map_err(|_| err);
        let wire = WireHeader {
            id: self.header.id,
            bits: self.header.bits(),
            counts: [
                count(self.questions.len(), Error::ErrTooManyQuestions)?,
                count(self.answers.len(), Error::ErrTooManyAnswers)?,
                count(self.authorities.len(), Error::ErrTooManyAuthorities)?,
                count(self.additionals.len(), Error::ErrTooManyAdditionals)?,
            ],
        };

        let mut msg = wire.pack(Vec::with_capacity(PACK_STARTING_CAP));
        let mut compression = Some(HashMap::new());
        for question in &self.questions {
            msg = question.pack(msg, &mut compression, 0)?;
        }
        for record in self
            .answers
            .iter_mut()
            .chain(self.authorities.iter_mut())
            .chain(self.additionals.iter_mut())
        {
            msg = record.pack(msg, &mut compression, 0)?;
        }
        Ok(msg)
    }
}
