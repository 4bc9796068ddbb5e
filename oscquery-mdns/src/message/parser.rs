use super::header::*;
use super::question::*;
use super::resource::*;
use shared::error::*;

// A Parser reads a DNS message one section at a time.
//
// `start` reads the header. The sections must then be read in wire order:
// questions, answers, authorities and additionals. Reading a section that
// is already done returns [`Error::ErrSectionDone`], reading one that has
// not been reached returns [`Error::ErrNotStarted`].
#[derive(Default)]
pub(crate) struct Parser<'a> {
    msg: &'a [u8],
    header: WireHeader,
    section: Section,
    off: usize,
    index: usize,
}

impl<'a> Parser<'a> {
    // start parses the header and enables the parsing of Questions.
    pub(crate) fn start(&mut self, msg: &'a [u8]) -> Result<Header> {
        *self = Parser {
            msg,
            ..Default::default()
        };
        self.off = self.header.unpack(msg, 0)?;
        self.section = Section::Questions;
        Ok(self.header.header())
    }

    fn check_advance(&mut self, sec: Section) -> Result<()> {
        if self.section < sec {
            return Err(Error::ErrNotStarted);
        }
        if self.section > sec {
            return Err(Error::ErrSectionDone);
        }
        if self.index == self.header.count(sec) as usize {
            self.index = 0;
            self.section = self.section.next();
            return Err(Error::ErrSectionDone);
        }
        Ok(())
    }

    fn question(&mut self) -> Result<Question> {
        self.check_advance(Section::Questions)?;
        let mut q = Question::default();
        self.off = q.unpack(self.msg, self.off)?;
        self.index += 1;
        Ok(q)
    }

    fn resource(&mut self, sec: Section) -> Result<Resource> {
        self.check_advance(sec)?;
        let mut header = ResourceHeader::default();
        let off = header.unpack(self.msg, self.off)?;
        let (body, off) = unpack_resource_body(header.typ, self.msg, off, header.length as usize)?;
        self.off = off;
        self.index += 1;
        Ok(Resource {
            header,
            body: Some(body),
        })
    }

    // all_questions parses all Questions.
    pub(crate) fn all_questions(&mut self) -> Result<Vec<Question>> {
        // Multicast DNS is a special case where a Message's question section
        // may carry several records even in responses.
        let mut qs = Vec::with_capacity(self.header.count(Section::Questions) as usize);
        loop {
            match self.question() {
                Ok(q) => qs.push(q),
                Err(Error::ErrSectionDone) => return Ok(qs),
                Err(err) => return Err(err),
            }
        }
    }

    // all_answers parses all answer Resources.
    pub(crate) fn all_answers(&mut self) -> Result<Vec<Resource>> {
        self.all_resources(Section::Answers)
    }

    // all_authorities parses all authority Resources.
    pub(crate) fn all_authorities(&mut self) -> Result<Vec<Resource>> {
        self.all_resources(Section::Authorities)
    }

    // all_additionals parses all additional Resources.
    pub(crate) fn all_additionals(&mut self) -> Result<Vec<Resource>> {
        self.all_resources(Section::Additionals)
    }

    fn all_resources(&mut self, sec: Section) -> Result<Vec<Resource>> {
        let mut rs = Vec::with_capacity(self.header.count(sec) as usize);
        loop {
            match self.resource(sec) {
                Ok(r) => rs.push(r),
                Err(Error::ErrSectionDone) => return Ok(rs),
                Err(err) => return Err(err),
            }
        }
    }
}
