//! The command grammar for GETMETADATA and SETMETADATA.
//!
//! Parsers use streaming semantics: a partial line yields
//! [`DecodeError::Incomplete`], and a synchronizing literal whose data has
//! not arrived yet yields [`DecodeError::LiteralFound`] so a framing layer
//! can issue the continuation request. Parsing happens before any lock or
//! transaction is taken.

use std::{num::ParseIntError, str::from_utf8};

use abnf_core::streaming::{crlf, dquote, sp};
use nom::{
    branch::alt,
    bytes::streaming::{escaped, tag, tag_no_case, take, take_while1},
    character::streaming::{char, digit1, one_of},
    combinator::{map, map_res, opt, value},
    error::{ErrorKind, FromExternalError, ParseError},
    multi::separated_list1,
    sequence::{delimited, preceded, separated_pair, terminated, tuple},
};

use crate::{
    command::{Command, CommandBody, EntryValue, GetMetadataOption, GetOptions, Mailbox, Tag as CommandTag},
    core::{
        indicators::{is_any_text_char_except_quoted_specials, is_astring_char, is_char8},
        unescape_quoted,
    },
    entry::{Depth, Entry},
    store::AnnotationValue,
};

pub(crate) type MdResult<I, O> = Result<(I, O), nom::Err<MdParseError<I>>>;

/// An extended version of [`nom::error::Error`].
#[derive(Debug)]
pub(crate) struct MdParseError<I> {
    #[allow(unused)]
    pub input: I,
    pub kind: MdErrorKind,
}

/// An extended version of [`nom::error::ErrorKind`].
#[derive(Debug)]
pub(crate) enum MdErrorKind {
    Literal { length: u32, mode: LiteralMode },
    BadNumber,
    BadUtf8,
    BadEntry,
    BadOptions,
    LiteralContainsNull,
    Nom(ErrorKind),
}

impl<I> ParseError<I> for MdParseError<I> {
    fn from_error_kind(input: I, kind: ErrorKind) -> Self {
        Self {
            input,
            kind: MdErrorKind::Nom(kind),
        }
    }

    fn append(input: I, kind: ErrorKind, _: Self) -> Self {
        Self {
            input,
            kind: MdErrorKind::Nom(kind),
        }
    }
}

impl<I> FromExternalError<I, ParseIntError> for MdParseError<I> {
    fn from_external_error(input: I, _: ErrorKind, _: ParseIntError) -> Self {
        Self {
            input,
            kind: MdErrorKind::BadNumber,
        }
    }
}

/// Literal mode, i.e., sync or non-sync.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LiteralMode {
    /// A synchronizing literal, i.e., `{<n>}\r\n<data>`.
    Sync,
    /// A non-synchronizing literal according to RFC 7888, i.e., `{<n>+}\r\n<data>`.
    NonSync,
}

/// The outcome of feeding bytes to [`decode_command`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    /// More data is needed.
    Incomplete,

    /// More data is needed (and further action may be necessary).
    ///
    /// The decoder stopped at the beginning of literal data. When `mode` is
    /// [`LiteralMode::Sync`], a continuation request must be sent to agree
    /// to the receival of the remaining data; a non-synchronizing literal
    /// just needs more bytes.
    LiteralFound { length: u32, mode: LiteralMode },

    /// Decoding failed.
    Failed,
}

/// Decode one full command line, returning the remaining input.
pub fn decode_command(input: &[u8]) -> Result<(&[u8], Command), DecodeError> {
    match command(input) {
        Ok((rem, cmd)) => Ok((rem, cmd)),
        Err(nom::Err::Incomplete(_)) => Err(DecodeError::Incomplete),
        Err(nom::Err::Failure(MdParseError {
            kind: MdErrorKind::Literal { length, mode },
            ..
        })) => Err(DecodeError::LiteralFound { length, mode }),
        Err(_) => Err(DecodeError::Failed),
    }
}

/// Salvage the tag from an otherwise unparseable line, for tagged BAD replies.
pub(crate) fn decode_tag(input: &[u8]) -> Option<CommandTag> {
    match terminated(tag_imap, sp)(input) {
        Ok((_, tag)) => Some(tag),
        Err(_) => None,
    }
}

// ----- Primitives --------------------------------------------------------------------------------

/// `number = 1*DIGIT`
///
/// Unsigned 32-bit integer (0 <= n < 4,294,967,296)
pub(crate) fn number(input: &[u8]) -> MdResult<&[u8], u32> {
    map_res(
        // # Safety
        //
        // `unwrap` is safe because `1*DIGIT` contains ASCII-only characters.
        map(digit1, |val| from_utf8(val).unwrap()),
        str::parse::<u32>,
    )(input)
}

/// `quoted = DQUOTE *QUOTED-CHAR DQUOTE`
pub(crate) fn quoted(input: &[u8]) -> MdResult<&[u8], String> {
    let mut parser = tuple((
        dquote,
        map(
            escaped(
                take_while1(is_any_text_char_except_quoted_specials),
                '\\',
                one_of("\\\""),
            ),
            // # Safety
            //
            // `unwrap` is safe because `val` contains ASCII-only characters.
            |val| from_utf8(val).unwrap(),
        ),
        dquote,
    ));

    let (remaining, (_, quoted, _)) = parser(input)?;

    Ok((remaining, unescape_quoted(quoted).into_owned()))
}

/// `literal = "{" number ["+"] "}" CRLF *CHAR8`
///
/// Number represents the number of CHAR8s. The optional `+` marks a
/// non-synchronizing literal (RFC 7888); both forms are accepted.
pub(crate) fn literal(input: &[u8]) -> MdResult<&[u8], Vec<u8>> {
    let (remaining, (length, mode)) = literal_prefix(b"{")(input)?;

    // Signal that a continuation request could be required.
    // Note: This doesn't trigger when there is data following the literal prefix.
    if remaining.is_empty() {
        return Err(nom::Err::Failure(MdParseError {
            input,
            kind: MdErrorKind::Literal { length, mode },
        }));
    }

    let (remaining, data) = take(length)(remaining)?;

    if data.iter().any(|b| !is_char8(*b)) {
        return Err(nom::Err::Failure(MdParseError {
            input,
            kind: MdErrorKind::LiteralContainsNull,
        }));
    }

    Ok((remaining, data.to_vec()))
}

/// Shared prefix rule: `open number ["+"] "}" CRLF`.
fn literal_prefix(
    open: &'static [u8],
) -> impl FnMut(&[u8]) -> MdResult<&[u8], (u32, LiteralMode)> {
    move |input| {
        let (remaining, (length, plus)) = terminated(
            delimited(tag(open), tuple((number, opt(char('+')))), tag(b"}")),
            crlf,
        )(input)?;

        let mode = match plus {
            Some(_) => LiteralMode::NonSync,
            None => LiteralMode::Sync,
        };

        Ok((remaining, (length, mode)))
    }
}

/// `literal8 = "~{" number ["+"] "}" CRLF *OCTET`
///
/// Defined in RFC 4466; carries arbitrary binary data, NUL included.
pub(crate) fn literal8(input: &[u8]) -> MdResult<&[u8], Vec<u8>> {
    let (remaining, (length, mode)) = literal_prefix(b"~{")(input)?;

    if remaining.is_empty() {
        return Err(nom::Err::Failure(MdParseError {
            input,
            kind: MdErrorKind::Literal { length, mode },
        }));
    }

    let (remaining, data) = take(length)(remaining)?;

    Ok((remaining, data.to_vec()))
}

/// `string = quoted / literal`
pub(crate) fn string(input: &[u8]) -> MdResult<&[u8], Vec<u8>> {
    alt((map(quoted, String::into_bytes), literal))(input)
}

/// `nil = "NIL"`
#[inline]
pub(crate) fn nil(input: &[u8]) -> MdResult<&[u8], &[u8]> {
    tag_no_case(b"NIL")(input)
}

/// `nstring = string / nil`
pub(crate) fn nstring(input: &[u8]) -> MdResult<&[u8], Option<Vec<u8>>> {
    alt((map(string, Some), map(nil, |_| None)))(input)
}

/// `astring = 1*ASTRING-CHAR / string`
pub(crate) fn astring(input: &[u8]) -> MdResult<&[u8], String> {
    alt((
        map(take_while1(is_astring_char), |bytes: &[u8]| {
            // # Safety
            //
            // `unwrap` is safe because `is_astring_char` only accepts ASCII.
            from_utf8(bytes).unwrap().to_owned()
        }),
        astring_string,
    ))(input)
}

fn astring_string(input: &[u8]) -> MdResult<&[u8], String> {
    let (remaining, data) = string(input)?;

    match String::from_utf8(data) {
        Ok(value) => Ok((remaining, value)),
        Err(_) => Err(nom::Err::Failure(MdParseError {
            input,
            kind: MdErrorKind::BadUtf8,
        })),
    }
}

/// `tag = 1*<any ASTRING-CHAR except "+">`
pub(crate) fn tag_imap(input: &[u8]) -> MdResult<&[u8], CommandTag> {
    map(take_while1(|b| is_astring_char(b) && b != b'+'), |val| {
        // # Safety
        //
        // `is_astring_char` ensures that `val` is ASCII.
        CommandTag::unvalidated(from_utf8(val).unwrap().to_owned())
    })(input)
}

/// `mailbox = astring`
///
/// The empty name addresses the account; `INBOX` is normalized.
pub(crate) fn mailbox(input: &[u8]) -> MdResult<&[u8], Mailbox> {
    map(astring, Mailbox::from)(input)
}

// ----- Commands ----------------------------------------------------------------------------------

/// Slash-separated path to entry.
///
/// ```abnf
/// entry = astring
/// ```
pub(crate) fn entry(input: &[u8]) -> MdResult<&[u8], Entry> {
    let (remaining, name) = astring(input)?;

    match Entry::try_from(name) {
        Ok(entry) => Ok((remaining, entry)),
        Err(_) => Err(nom::Err::Failure(MdParseError {
            input,
            kind: MdErrorKind::BadEntry,
        })),
    }
}

/// ```abnf
/// ; Used as a getmetadata-option
/// maxsize-opt = "MAXSIZE" SP number
///
/// ; Used as a getmetadata-option
/// scope-opt = "DEPTH" SP ("0" / "1" / "INFINITY")
/// ```
///
/// No forward-compatible skipping: any other option keyword fails the parse.
pub(crate) fn getmetadata_option(input: &[u8]) -> MdResult<&[u8], GetMetadataOption> {
    alt((
        map(
            preceded(tag_no_case("MAXSIZE "), number),
            GetMetadataOption::MaxSize,
        ),
        map(
            preceded(
                tag_no_case("DEPTH "),
                alt((
                    value(Depth::Null, tag("0")),
                    value(Depth::One, tag("1")),
                    value(Depth::Infinity, tag_no_case("INFINITY")),
                )),
            ),
            GetMetadataOption::Depth,
        ),
    ))(input)
}

/// ```abnf
/// getmetadata-options = "(" getmetadata-option *(SP getmetadata-option) ")"
/// ```
pub(crate) fn getmetadata_options(input: &[u8]) -> MdResult<&[u8], Vec<GetMetadataOption>> {
    delimited(tag("("), separated_list1(sp, getmetadata_option), tag(")"))(input)
}

/// ```abnf
/// entries = entry / "(" entry *(SP entry) ")"
/// ```
pub(crate) fn entries(input: &[u8]) -> MdResult<&[u8], std::collections::BTreeSet<Entry>> {
    alt((
        map(entry, |entry| std::iter::once(entry).collect()),
        map(
            delimited(tag("("), separated_list1(sp, entry), tag(")")),
            |entries| entries.into_iter().collect(),
        ),
    ))(input)
}

/// ```abnf
/// getmetadata = "GETMETADATA" [SP getmetadata-options] SP mailbox SP entries
/// ```
///
/// Note: Empty string for mailbox implies server annotation.
pub(crate) fn getmetadata(input: &[u8]) -> MdResult<&[u8], CommandBody> {
    let mut parser = tuple((
        tag_no_case("GETMETADATA"),
        opt(preceded(sp, getmetadata_options)),
        preceded(sp, mailbox),
        preceded(sp, entries),
    ));

    let (remaining, (_, options, mailbox, entries)) = parser(input)?;

    let options = match GetOptions::resolve(options.unwrap_or_default()) {
        Ok(options) => options,
        Err(_) => {
            return Err(nom::Err::Failure(MdParseError {
                input,
                kind: MdErrorKind::BadOptions,
            }))
        }
    };

    Ok((
        remaining,
        CommandBody::GetMetadata {
            options,
            mailbox,
            entries,
        },
    ))
}

/// ```abnf
/// value = nstring / literal8
/// ```
#[inline]
pub(crate) fn metadata_value(input: &[u8]) -> MdResult<&[u8], Option<AnnotationValue>> {
    alt((
        map(nstring, |value| value.map(AnnotationValue::text)),
        map(literal8, |data| Some(AnnotationValue::binary(data))),
    ))(input)
}

/// ```abnf
/// entry-value = entry SP value
/// ```
#[inline]
pub(crate) fn entry_value(input: &[u8]) -> MdResult<&[u8], EntryValue> {
    map(
        separated_pair(entry, sp, metadata_value),
        |(entry, value)| EntryValue { entry, value },
    )(input)
}

/// ```abnf
/// entry-values = "(" entry-value *(SP entry-value) ")"
/// ```
pub(crate) fn entry_values(input: &[u8]) -> MdResult<&[u8], Vec<EntryValue>> {
    delimited(tag("("), separated_list1(sp, entry_value), tag(")"))(input)
}

/// ```abnf
/// ; empty string for mailbox implies server annotation.
/// setmetadata = "SETMETADATA" SP mailbox SP entry-values
/// ```
pub(crate) fn setmetadata(input: &[u8]) -> MdResult<&[u8], CommandBody> {
    let mut parser = tuple((
        tag_no_case("SETMETADATA"),
        preceded(sp, mailbox),
        preceded(sp, entry_values),
    ));

    let (remaining, (_, mailbox, entry_values)) = parser(input)?;

    Ok((
        remaining,
        CommandBody::SetMetadata {
            mailbox,
            entry_values,
        },
    ))
}

/// `command = tag SP (getmetadata / setmetadata) CRLF`
///
/// The CRLF must directly follow the command; trailing bytes are an error.
pub(crate) fn command(input: &[u8]) -> MdResult<&[u8], Command> {
    map(
        terminated(
            separated_pair(tag_imap, sp, alt((getmetadata, setmetadata))),
            crlf,
        ),
        |(tag, body)| Command { tag, body },
    )(input)
}
