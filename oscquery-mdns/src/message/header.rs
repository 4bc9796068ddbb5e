use std::fmt;

use super::packer::*;
use shared::error::*;

const BIT_QR: u16 = 1 << 15;
const BIT_AA: u16 = 1 << 10;
const BIT_TC: u16 = 1 << 9;
const OPCODE_SHIFT: u16 = 11;

/// Flags of a DNS message header that mDNS cares about.
///
/// Recursion flags are meaningless on the multicast link (RFC 6762 section
/// 18.6 and 18.7); they are sent as zero and ignored on receipt.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) id: u16,
    pub(crate) response: bool,
    pub(crate) op_code: u8,
    pub(crate) authoritative: bool,
    pub(crate) truncated: bool,
    pub(crate) rcode: u8,
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} id={} opcode={} rcode={}{}{}",
            if self.response { "response" } else { "query" },
            self.id,
            self.op_code,
            self.rcode,
            if self.authoritative { " aa" } else { "" },
            if self.truncated { " tc" } else { "" },
        )
    }
}

impl Header {
    pub(crate) fn authoritative_response() -> Self {
        Header {
            response: true,
            authoritative: true,
            ..Default::default()
        }
    }

    /// The flags word of the wire header.
    pub(crate) fn bits(&self) -> u16 {
        let mut bits = (u16::from(self.op_code & 0xF) << OPCODE_SHIFT) | u16::from(self.rcode & 0xF);
        for (set, bit) in [
            (self.response, BIT_QR),
            (self.authoritative, BIT_AA),
            (self.truncated, BIT_TC),
        ] {
            if set {
                bits |= bit;
            }
        }
        bits
    }

    fn from_bits(id: u16, bits: u16) -> Self {
        Header {
            id,
            response: bits & BIT_QR != 0,
            op_code: ((bits >> OPCODE_SHIFT) & 0xF) as u8,
            authoritative: bits & BIT_AA != 0,
            truncated: bits & BIT_TC != 0,
            rcode: (bits & 0xF) as u8,
        }
    }
}

/// Message sections in wire order.
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Section {
    #[default]
    NotStarted,
    Header,
    Questions,
    Answers,
    Authorities,
    Additionals,
    Done,
}

impl Section {
    pub(crate) fn next(self) -> Section {
        match self {
            Section::NotStarted => Section::Header,
            Section::Header => Section::Questions,
            Section::Questions => Section::Answers,
            Section::Answers => Section::Authorities,
            Section::Authorities => Section::Additionals,
            Section::Additionals | Section::Done => Section::Done,
        }
    }

    fn count_index(self) -> Option<usize> {
        match self {
            Section::Questions => Some(0),
            Section::Answers => Some(1),
            Section::Authorities => Some(2),
            Section::Additionals => Some(3),
            _ => None,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Section::NotStarted => "not started",
            Section::Header => "header",
            Section::Questions => "question",
            Section::Answers => "answer",
            Section::Authorities => "authority",
            Section::Additionals => "additional",
            Section::Done => "done",
        };
        f.write_str(s)
    }
}

/// The fixed twelve bytes at the start of every message.
#[derive(Default, Debug)]
pub(crate) struct WireHeader {
    pub(crate) id: u16,
    pub(crate) bits: u16,
    /// Record counts for questions, answers, authorities and additionals.
    pub(crate) counts: [u16; 4],
}

impl WireHeader {
    pub(crate) fn count(&self, sec: Section) -> u16 {
        sec.count_index().map_or(0, |i| self.counts[i])
    }

    pub(crate) fn pack(&self, mut msg: Vec<u8>) -> Vec<u8> {
        msg = pack_uint16(msg, self.id);
        msg = pack_uint16(msg, self.bits);
        for count in self.counts {
            msg = pack_uint16(msg, count);
        }
        msg
    }

    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        let (id, mut off) = unpack_uint16(msg, off)?;
        let (bits, next) = unpack_uint16(msg, off)?;
        off = next;
        for count in self.counts.iter_mut() {
            let (value, next) = unpack_uint16(msg, off)?;
            *count = value;
            off = next;
        }
        self.id = id;
        self.bits = bits;
        Ok(off)
    }

    pub(crate) fn header(&self) -> Header {
        Header::from_bits(self.id, self.bits)
    }
}
