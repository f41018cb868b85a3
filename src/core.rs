//! Byte classes and quoting helpers shared by the parser and the encoder.

use std::borrow::Cow;

pub(crate) mod indicators {
    /// Any 7-bit US-ASCII character, excluding NUL
    ///
    /// CHAR = %x01-7F
    #[allow(non_snake_case)]
    pub(crate) fn is_CHAR(byte: u8) -> bool {
        matches!(byte, 0x01..=0x7f)
    }

    /// Controls
    ///
    /// CTL = %x00-1F / %x7F
    #[allow(non_snake_case)]
    pub(crate) fn is_CTL(byte: u8) -> bool {
        matches!(byte, 0x00..=0x1f | 0x7f)
    }

    /// `quoted-specials = DQUOTE / "\"`
    pub(crate) fn is_quoted_specials(byte: u8) -> bool {
        byte == b'"' || byte == b'\\'
    }

    /// `TEXT-CHAR = %x01-09 / %x0B-0C / %x0E-7F`
    pub(crate) fn is_text_char(byte: u8) -> bool {
        matches!(byte, 0x01..=0x09 | 0x0b..=0x0c | 0x0e..=0x7f)
    }

    pub(crate) fn is_any_text_char_except_quoted_specials(byte: u8) -> bool {
        is_text_char(byte) && !is_quoted_specials(byte)
    }

    /// `list-wildcards = "%" / "*"`
    pub(crate) fn is_list_wildcards(byte: u8) -> bool {
        byte == b'%' || byte == b'*'
    }

    /// `resp-specials = "]"`
    pub(crate) fn is_resp_specials(byte: u8) -> bool {
        byte == b']'
    }

    /// `atom-specials = "(" / ")" / "{" / SP / CTL / list-wildcards / quoted-specials / resp-specials`
    pub(crate) fn is_atom_specials(byte: u8) -> bool {
        match byte {
            b'(' | b')' | b'{' | b' ' => true,
            c if is_CTL(c) => true,
            c if is_list_wildcards(c) => true,
            c if is_quoted_specials(c) => true,
            c if is_resp_specials(c) => true,
            _ => false,
        }
    }

    /// `ATOM-CHAR = <any CHAR except atom-specials>`
    pub(crate) fn is_atom_char(byte: u8) -> bool {
        is_CHAR(byte) && !is_atom_specials(byte)
    }

    /// `ASTRING-CHAR = ATOM-CHAR / resp-specials`
    pub(crate) fn is_astring_char(byte: u8) -> bool {
        is_atom_char(byte) || is_resp_specials(byte)
    }

    /// `CHAR8 = %x01-ff`
    ///
    /// Any OCTET except NUL, %x00
    pub(crate) fn is_char8(byte: u8) -> bool {
        byte != 0
    }
}

/// Escape a string for use inside a quoted string.
///
/// This function only allocates when the input contains quoted-specials.
pub(crate) fn escape_quoted(unescaped: &str) -> Cow<str> {
    let mut escaped = Cow::Borrowed(unescaped);

    if escaped.contains('\\') {
        escaped = Cow::Owned(escaped.replace('\\', "\\\\"));
    }

    if escaped.contains('\"') {
        escaped = Cow::Owned(escaped.replace('"', "\\\""));
    }

    escaped
}

/// Inverse of [`escape_quoted`].
pub(crate) fn unescape_quoted(escaped: &str) -> Cow<str> {
    let mut unescaped = Cow::Borrowed(escaped);

    if unescaped.contains("\\\\") {
        unescaped = Cow::Owned(unescaped.replace("\\\\", "\\"));
    }

    if unescaped.contains("\\\"") {
        unescaped = Cow::Owned(unescaped.replace("\\\"", "\""));
    }

    unescaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quoted() {
        assert_eq!(escape_quoted("alice"), "alice");
        assert_eq!(escape_quoted("\\alice\\"), "\\\\alice\\\\");
        assert_eq!(escape_quoted("alice\""), "alice\\\"");
        assert_eq!(escape_quoted(r#"\alice\ ""#), r#"\\alice\\ \""#);
    }

    #[test]
    fn test_unescape_quoted() {
        assert_eq!(unescape_quoted("alice"), "alice");
        assert_eq!(unescape_quoted("\\\\alice\\\\"), "\\alice\\");
        assert_eq!(unescape_quoted("alice\\\""), "alice\"");
        assert_eq!(unescape_quoted(r#"\\alice\\ \""#), r#"\alice\ ""#);
    }

    #[test]
    fn test_escape_unescape_quoted_does_not_change() {
        let tests = ["", "a", "\\", "\"", "\\\"", "\\\\", "\"\\\""];

        for test in tests {
            assert_eq!(unescape_quoted(&escape_quoted(test)), test);
        }
    }
}
