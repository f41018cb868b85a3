//! # Encoding of responses.
//!
//! [`Encoder::encode`] returns an instance of [`Encoded`] rather than dumping
//! bytes: a value that does not fit the quoted-string grammar is sent as a
//! literal, which splits the response into multiple [`Fragment`]s. Server-sent
//! literals need no continuation handshake, so a consumer may simply write the
//! fragments back to back, but the split keeps line-oriented logging and
//! tracing exact.

use std::{collections::VecDeque, io::Write, str::from_utf8};

use crate::{
    command::{EntryValue, Mailbox, Tag},
    core::{
        escape_quoted,
        indicators::{is_astring_char, is_text_char},
    },
    entry::Entry,
    response::{Code, Data, Response, Status, StatusKind},
    store::AnnotationValue,
};

/// Encoder.
///
/// Implemented for types that know how to encode a specific message.
pub trait Encoder {
    type Message<'a>;

    /// Encode this message.
    ///
    /// This will return an [`Encoded`] message.
    fn encode(&self, message: &Self::Message<'_>) -> Encoded;
}

/// Codec for all server responses.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResponseCodec;

impl Encoder for ResponseCodec {
    type Message<'a> = Response;

    fn encode(&self, message: &Self::Message<'_>) -> Encoded {
        let mut encode_context = EncodeContext::new();
        // Writing into the `Vec` accumulator cannot fail.
        EncodeIntoContext::encode_ctx(message, &mut encode_context).unwrap();

        Encoded {
            items: encode_context.into_items(),
        }
    }
}

/// An encoded message.
///
/// Yields the encoding of a message through [`Fragment`]s.
#[derive(Clone, Debug)]
pub struct Encoded {
    items: VecDeque<Fragment>,
}

impl Encoded {
    /// Dump the (remaining) encoded data without being guided by [`Fragment`]s.
    pub fn dump(self) -> Vec<u8> {
        let mut out = Vec::new();

        for fragment in self.items {
            match fragment {
                Fragment::Line { mut data } => out.append(&mut data),
                Fragment::Literal { mut data } => out.append(&mut data),
            }
        }

        out
    }
}

impl Iterator for Encoded {
    type Item = Fragment;

    fn next(&mut self) -> Option<Self::Item> {
        self.items.pop_front()
    }
}

/// A fraction of an encoded message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Fragment {
    /// A line that is ready to be send.
    Line { data: Vec<u8> },

    /// Literal data following a `{<n>}` or `~{<n>}` prefix line.
    Literal { data: Vec<u8> },
}

//--------------------------------------------------------------------------------------------------

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct EncodeContext {
    accumulator: Vec<u8>,
    items: VecDeque<Fragment>,
}

impl EncodeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self) {
        self.items.push_back(Fragment::Line {
            data: std::mem::take(&mut self.accumulator),
        })
    }

    pub fn push_literal(&mut self) {
        self.items.push_back(Fragment::Literal {
            data: std::mem::take(&mut self.accumulator),
        })
    }

    pub fn into_items(self) -> VecDeque<Fragment> {
        let Self {
            accumulator,
            mut items,
        } = self;

        if !accumulator.is_empty() {
            items.push_back(Fragment::Line { data: accumulator });
        }

        items
    }

    #[cfg(test)]
    pub(crate) fn dump(self) -> Vec<u8> {
        let mut out = Vec::new();

        for item in self.into_items() {
            match item {
                Fragment::Line { data } | Fragment::Literal { data } => {
                    out.extend_from_slice(&data)
                }
            }
        }

        out
    }
}

impl Write for EncodeContext {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.accumulator.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// -------------------------------------------------------------------------------------------------

pub(crate) trait EncodeIntoContext {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()>;
}

// ----- Primitive ---------------------------------------------------------------------------------

impl EncodeIntoContext for u32 {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        ctx.write_all(self.to_string().as_bytes())
    }
}

/// `astring = 1*ASTRING-CHAR / string`
///
/// Bare atom form when possible, quoted when the bytes are TEXT-CHARs,
/// literal otherwise. The empty string encodes as `""`.
fn encode_astring(value: &str, ctx: &mut EncodeContext) -> std::io::Result<()> {
    if !value.is_empty() && value.bytes().all(is_astring_char) {
        ctx.write_all(value.as_bytes())
    } else if value.bytes().all(is_text_char) {
        encode_quoted(value, ctx)
    } else {
        encode_literal(value.as_bytes(), ctx)
    }
}

fn encode_quoted(value: &str, ctx: &mut EncodeContext) -> std::io::Result<()> {
    ctx.write_all(b"\"")?;
    ctx.write_all(escape_quoted(value).as_bytes())?;
    ctx.write_all(b"\"")
}

/// `literal = "{" number "}" CRLF *CHAR8`
fn encode_literal(data: &[u8], ctx: &mut EncodeContext) -> std::io::Result<()> {
    write!(ctx, "{{{}}}\r\n", data.len())?;
    ctx.push_line();
    ctx.write_all(data)?;
    ctx.push_literal();
    Ok(())
}

/// `literal8 = "~{" number "}" CRLF *OCTET`
fn encode_literal8(data: &[u8], ctx: &mut EncodeContext) -> std::io::Result<()> {
    write!(ctx, "~{{{}}}\r\n", data.len())?;
    ctx.push_line();
    ctx.write_all(data)?;
    ctx.push_literal();
    Ok(())
}

impl EncodeIntoContext for Tag {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        ctx.write_all(self.inner().as_bytes())
    }
}

impl EncodeIntoContext for Mailbox {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        encode_astring(self.as_str(), ctx)
    }
}

impl EncodeIntoContext for Entry {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        encode_astring(self.as_ref(), ctx)
    }
}

impl EncodeIntoContext for AnnotationValue {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        if !self.text {
            return encode_literal8(&self.data, ctx);
        }

        // A text value still needs the literal form when it carries bytes the
        // quoted grammar cannot represent (CR, LF, NUL, non-ASCII).
        match from_utf8(&self.data) {
            Ok(value) if value.bytes().all(is_text_char) => encode_quoted(value, ctx),
            _ => encode_literal(&self.data, ctx),
        }
    }
}

impl EncodeIntoContext for EntryValue {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        self.entry.encode_ctx(ctx)?;
        ctx.write_all(b" ")?;
        match &self.value {
            Some(value) => value.encode_ctx(ctx),
            None => ctx.write_all(b"NIL"),
        }
    }
}

// ----- Response ----------------------------------------------------------------------------------

impl EncodeIntoContext for Response {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        match self {
            Response::Data(data) => data.encode_ctx(ctx),
            Response::Status(status) => status.encode_ctx(ctx),
            Response::CommandContinuationRequest { text } => {
                ctx.write_all(b"+ ")?;
                ctx.write_all(text.as_bytes())?;
                ctx.write_all(b"\r\n")
            }
        }
    }
}

impl EncodeIntoContext for Data {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        match self {
            Data::Metadata {
                mailbox,
                entry_values,
            } => {
                ctx.write_all(b"* METADATA ")?;
                mailbox.encode_ctx(ctx)?;
                ctx.write_all(b" (")?;
                if let Some((head, tail)) = entry_values.split_first() {
                    head.encode_ctx(ctx)?;
                    for entry_value in tail {
                        ctx.write_all(b" ")?;
                        entry_value.encode_ctx(ctx)?;
                    }
                }
                ctx.write_all(b")\r\n")
            }
        }
    }
}

impl EncodeIntoContext for Status {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        match &self.tag {
            Some(tag) => tag.encode_ctx(ctx)?,
            None => ctx.write_all(b"*")?,
        }
        ctx.write_all(b" ")?;
        ctx.write_all(match self.kind {
            StatusKind::Ok => b"OK",
            StatusKind::No => b"NO",
            StatusKind::Bad => b"BAD",
        })?;
        if let Some(code) = self.code {
            ctx.write_all(b" [")?;
            code.encode_ctx(ctx)?;
            ctx.write_all(b"]")?;
        }
        ctx.write_all(b" ")?;
        ctx.write_all(self.text.as_bytes())?;
        ctx.write_all(b"\r\n")
    }
}

impl EncodeIntoContext for Code {
    fn encode_ctx(&self, ctx: &mut EncodeContext) -> std::io::Result<()> {
        match self {
            Code::MetadataLongEntries(size) => {
                ctx.write_all(b"METADATA LONGENTRIES ")?;
                size.encode_ctx(ctx)
            }
            Code::MetadataMaxSize(size) => {
                ctx.write_all(b"METADATA MAXSIZE ")?;
                size.encode_ctx(ctx)
            }
            Code::MetadataTooMany => ctx.write_all(b"METADATA TOOMANY"),
            Code::TryCreate => ctx.write_all(b"TRYCREATE"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(response: Response) -> Vec<u8> {
        ResponseCodec.encode(&response).dump()
    }

    #[test]
    fn test_encode_metadata_data() {
        let response = Response::Data(Data::Metadata {
            mailbox: Mailbox::from("INBOX"),
            entry_values: vec![
                EntryValue {
                    entry: Entry::try_from("/private/comment").unwrap(),
                    value: Some(AnnotationValue::text("My own comment")),
                },
                EntryValue {
                    entry: Entry::try_from("/private/missing").unwrap(),
                    value: None,
                },
            ],
        });

        assert_eq!(
            encoded(response),
            b"* METADATA INBOX (/private/comment \"My own comment\" /private/missing NIL)\r\n"
        );
    }

    #[test]
    fn test_encode_account_mailbox_as_empty_quoted() {
        let response = Response::Data(Data::Metadata {
            mailbox: Mailbox::account(),
            entry_values: vec![EntryValue {
                entry: Entry::try_from("/private/vendor/acme/motd").unwrap(),
                value: Some(AnnotationValue::text("")),
            }],
        });

        assert_eq!(
            encoded(response),
            b"* METADATA \"\" (/private/vendor/acme/motd \"\")\r\n"
        );
    }

    #[test]
    fn test_encode_value_forms() {
        // Quoted specials get escaped.
        let mut ctx = EncodeContext::new();
        AnnotationValue::text(r#"say "hi""#)
            .encode_ctx(&mut ctx)
            .unwrap();
        assert_eq!(ctx.dump(), br#""say \"hi\"""#);

        // Text with a newline falls back to a literal.
        let encoded = ResponseCodec.encode(&Response::Data(Data::Metadata {
            mailbox: Mailbox::account(),
            entry_values: vec![EntryValue {
                entry: Entry::try_from("/private/a").unwrap(),
                value: Some(AnnotationValue::text("line1\r\nline2")),
            }],
        }));
        let fragments: Vec<Fragment> = encoded.collect();
        assert_eq!(
            fragments,
            vec![
                Fragment::Line {
                    data: b"* METADATA \"\" (/private/a {12}\r\n".to_vec()
                },
                Fragment::Literal {
                    data: b"line1\r\nline2".to_vec()
                },
                Fragment::Line {
                    data: b")\r\n".to_vec()
                },
            ]
        );

        // Binary values use literal8.
        let mut ctx = EncodeContext::new();
        AnnotationValue::binary(b"a\x00b".to_vec())
            .encode_ctx(&mut ctx)
            .unwrap();
        assert_eq!(ctx.dump(), b"~{3}\r\na\x00b");
    }

    #[test]
    fn test_encode_status_lines() {
        let tag = Tag::try_from("A42").unwrap();

        assert_eq!(
            encoded(Response::Status(Status::ok(tag.clone(), "done"))),
            b"A42 OK done\r\n"
        );
        assert_eq!(
            encoded(Response::Status(Status::ok_with_code(
                tag.clone(),
                Code::MetadataLongEntries(1337),
                "getmetadata done"
            ))),
            b"A42 OK [METADATA LONGENTRIES 1337] getmetadata done\r\n"
        );
        assert_eq!(
            encoded(Response::Status(Status::no(
                tag.clone(),
                Some(Code::MetadataMaxSize(1000000)),
                "value too large"
            ))),
            b"A42 NO [METADATA MAXSIZE 1000000] value too large\r\n"
        );
        assert_eq!(
            encoded(Response::Status(Status::no(
                tag.clone(),
                Some(Code::MetadataTooMany),
                "too many entries"
            ))),
            b"A42 NO [METADATA TOOMANY] too many entries\r\n"
        );
        assert_eq!(
            encoded(Response::Status(Status::no(
                tag.clone(),
                Some(Code::TryCreate),
                "no such mailbox"
            ))),
            b"A42 NO [TRYCREATE] no such mailbox\r\n"
        );
        assert_eq!(
            encoded(Response::Status(Status::bad(Some(tag), "syntax error"))),
            b"A42 BAD syntax error\r\n"
        );
        assert_eq!(
            encoded(Response::CommandContinuationRequest {
                text: "ready for literal data".into()
            }),
            b"+ ready for literal data\r\n"
        );
    }
}
