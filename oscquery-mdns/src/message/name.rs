use std::collections::HashMap;
use std::fmt;

use shared::error::*;

const NAME_LEN: usize = 255;

// A Name is a non-encoded domain name. It is used instead of strings to avoid
// allocations.
#[derive(Default, PartialEq, Eq, Debug, Clone)]
pub(crate) struct Name {
    pub(crate) data: String,
}

// String implements fmt.Stringer.String.
impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data)
    }
}

impl Name {
    pub(crate) fn new(data: &str) -> Result<Self> {
        if data.len() > NAME_LEN {
            Err(Error::ErrCalcLen)
        } else {
            Ok(Name {
                data: data.to_owned(),
            })
        }
    }

    /// Builds a canonical name from individual labels, refusing labels that
    /// would be split apart on the wire.
    pub(crate) fn from_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let mut data = String::new();
        for label in labels {
            let label = label.as_ref();
            if label.contains('.') {
                return Err(Error::ErrLabelContainsDot(label.to_owned()));
            }
            data.push_str(label);
            data.push('.');
        }
        Name::new(&data)
    }

    /// Splits the name into its labels, dropping the root label.
    pub(crate) fn labels(&self) -> Vec<&str> {
        self.data.split('.').filter(|l| !l.is_empty()).collect()
    }

    /// The lower-cased name without its trailing dot, as compared by mDNS.
    pub(crate) fn canonical(&self) -> String {
        self.data.trim_end_matches('.').to_ascii_lowercase()
    }

    // pack appends the wire format of the Name to msg.
    //
    // Domain names are a sequence of counted strings split at the dots. They end
    // with a zero-length string. Compression can be used to reuse domain suffixes.
    //
    // The compression map will be updated with new domain suffixes. If compression
    // is nil, compression will not be used.
    pub(crate) fn pack(
        &self,
        mut msg: Vec<u8>,
        compression: &mut Option<HashMap<String, usize>>,
        compression_off: usize,
    ) -> Result<Vec<u8>> {
        let data = self.data.as_bytes();

        // Add a trailing dot to canonicalize name.
        if data.is_empty() || data[data.len() - 1] != b'.' {
            return Err(Error::ErrNonCanonicalName);
        }

        // Allow root domain.
        if data.len() == 1 && data[0] == b'.' {
            msg.push(0);
            return Ok(msg);
        }

        // Emit sequence of counted strings, chopping at dots.
        let mut begin = 0;
        for i in 0..data.len() {
            // Check for the end of the segment.
            if data[i] == b'.' {
                // The two most significant bits have special meaning.
                // It isn't allowed for segments to be long enough to
                // need them.
                if i - begin >= (1 << 6) {
                    return Err(Error::ErrSegTooLong);
                }

                // Segments must have a non-zero length.
                if i - begin == 0 {
                    return Err(Error::ErrZeroSegLen);
                }

                msg.push((i - begin) as u8);
                msg.extend_from_slice(&data[begin..i]);

                begin = i + 1;
                continue;
            }

            // We can only start a new segment if we are at the beginning
            // of a segment.
            if i == 0 || data[i - 1] == b'.' {
                if let Some(compression) = compression {
                    let key = self.data[i..].to_ascii_lowercase();
                    if let Some(ptr) = compression.get(&key) {
                        // Hit. Emit a pointer instead of the rest of
                        // the domain.
                        msg.push(((ptr >> 8) | 0xC0) as u8);
                        msg.push((ptr & 0xFF) as u8);
                        return Ok(msg);
                    }

                    // Miss. Add the suffix to the compression table if the
                    // offset can be stored in the available 14 bytes.
                    if msg.len() - compression_off <= 0x3FFF {
                        compression.insert(key, msg.len() - compression_off);
                    }
                }
            }
        }

        msg.push(0);
        Ok(msg)
    }

    // unpack unpacks a domain name, following compression pointers.
    pub(crate) fn unpack(&mut self, msg: &[u8], off: usize) -> Result<usize> {
        // curr is the current position in the message.
        let mut curr = off;

        // new_off is the offset where the next record will start. Pointers lead
        // to data that belongs to other names and thus doesn't count towards to
        // the usage of this name.
        let mut new_off = off;

        // ptr is the number of pointers followed.
        let mut ptr = 0;

        // Name is a slice representation of the name data.
        let mut name = String::new();

        loop {
            if curr >= msg.len() {
                return Err(Error::ErrBaseLen);
            }
            let c = msg[curr];
            curr += 1;
            match c & 0xC0 {
                0x00 => {
                    // String segment
                    if c == 0x00 {
                        // A zero length signals the end of the name.
                        break;
                    }
                    let end_off = curr + c as usize;
                    if end_off > msg.len() {
                        return Err(Error::ErrCalcLen);
                    }
                    name.push_str(&String::from_utf8(msg[curr..end_off].to_vec())?);
                    name.push('.');
                    curr = end_off;
                }
                0xC0 => {
                    // Pointer
                    if curr >= msg.len() {
                        return Err(Error::ErrInvalidPtr);
                    }
                    let c1 = msg[curr];
                    curr += 1;
                    if ptr == 0 {
                        new_off = curr;
                    }
                    // Don't follow too many pointers, maybe there's a loop.
                    ptr += 1;
                    if ptr > 10 {
                        return Err(Error::ErrTooManyPtr);
                    }
                    curr = (((c ^ 0xC0) as usize) << 8) | (c1 as usize);
                }
                _ => {
                    // Prefixes 0x80 and 0x40 are reserved.
                    return Err(Error::ErrReserved);
                }
            }
        }

        if name.is_empty() {
            name.push('.');
        }
        if name.len() > NAME_LEN {
            return Err(Error::ErrCalcLen);
        }
        self.data = name;
        if ptr == 0 {
            new_off = curr;
        }
        Ok(new_off)
    }
}
