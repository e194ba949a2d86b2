//! Byte-to-text conversion for shell output
//!
//! Each output channel gets its own [`OutputDecoder`], so a multi-byte character
//! or an escape sequence cut off at the end of one read is completed by the next
//! read of the same channel.
//!
//! - **Utf8Stream**: incremental UTF-8 decoding, escapes passed through
//! - **EscapeStripper**: `vte` parser that keeps printable text, `\n` and `\t`
//!   and drops everything else

use vte::{Parser, Perform};

/// Incremental UTF-8 decoder for one output channel
#[derive(Debug, Default)]
pub struct Utf8Stream {
    /// Bytes of a sequence that was cut off at the end of the previous read
    pending: Vec<u8>,
}

impl Utf8Stream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one read's worth of bytes.
    ///
    /// Invalid bytes become U+FFFD. A truncated sequence at the very end is kept
    /// back and prefixed to the next call.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut data = std::mem::take(&mut self.pending);
        data.extend_from_slice(bytes);

        let mut out = String::with_capacity(data.len());
        let mut rest: &[u8] = &data;

        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            // Incomplete sequence at the end, wait for more
                            self.pending.extend_from_slice(after);
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush whatever is still pending (end of stream)
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            return String::new();
        }
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }
}

/// Collects the plain text a `vte` parser reports
#[derive(Default)]
struct PlainText {
    out: String,
}

impl Perform for PlainText {
    fn print(&mut self, c: char) {
        self.out.push(c);
    }

    fn execute(&mut self, byte: u8) {
        // CR, BEL, BS and the other C0 controls are dropped
        if byte == b'\n' || byte == b'\t' {
            self.out.push(byte as char);
        }
    }

    // CSI, OSC, DCS and ESC dispatches keep their no-op defaults
}

/// Escape-stripping decoder for one output channel.
///
/// Handles CSI, OSC, DCS and two-byte escapes. Parser state survives between
/// reads, so a sequence split across reads is still dropped whole.
pub struct EscapeStripper {
    parser: Parser,
}

impl Default for EscapeStripper {
    fn default() -> Self {
        Self::new()
    }
}

impl EscapeStripper {
    pub fn new() -> Self {
        Self {
            parser: Parser::new(),
        }
    }

    /// Decode one read, returning only its printable text
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut text = PlainText::default();
        for &byte in bytes {
            self.parser.advance(&mut text, byte);
        }
        text.out
    }

    /// End of stream: an unfinished sequence is discarded
    pub fn finish(&mut self) -> String {
        self.parser = Parser::new();
        String::new()
    }
}

/// Per-channel decoder, chosen once per session
pub enum OutputDecoder {
    /// Text exactly as the shell wrote it
    Raw(Utf8Stream),
    /// Escape sequences and control characters removed
    Stripped(EscapeStripper),
}

impl OutputDecoder {
    pub fn new(strip_escapes: bool) -> Self {
        if strip_escapes {
            OutputDecoder::Stripped(EscapeStripper::new())
        } else {
            OutputDecoder::Raw(Utf8Stream::new())
        }
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        match self {
            OutputDecoder::Raw(stream) => stream.decode(bytes),
            OutputDecoder::Stripped(stripper) => stripper.decode(bytes),
        }
    }

    pub fn finish(&mut self) -> String {
        match self {
            OutputDecoder::Raw(stream) => stream.finish(),
            OutputDecoder::Stripped(stripper) => stripper.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(bytes: &[u8]) -> String {
        EscapeStripper::new().decode(bytes)
    }

    #[test]
    fn test_decode_plain_ascii() {
        let mut stream = Utf8Stream::new();
        assert_eq!(stream.decode(b"hello\n"), "hello\n");
        assert_eq!(stream.finish(), "");
    }

    #[test]
    fn test_split_multibyte_is_carried_over() {
        let bytes = "日本".as_bytes();
        let mut stream = Utf8Stream::new();
        // Cut in the middle of the first character
        assert_eq!(stream.decode(&bytes[..2]), "");
        assert_eq!(stream.decode(&bytes[2..4]), "日");
        assert_eq!(stream.decode(&bytes[4..]), "本");
        assert_eq!(stream.finish(), "");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut stream = Utf8Stream::new();
        assert_eq!(stream.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_finish_flushes_truncated_tail() {
        let mut stream = Utf8Stream::new();
        assert_eq!(stream.decode(&[b'x', 0xE6]), "x");
        assert_eq!(stream.finish(), "\u{FFFD}");
        assert_eq!(stream.finish(), "");
    }

    #[test]
    fn test_strip_csi_and_osc() {
        assert_eq!(strip(b"\x1b[32mgreen\x1b[0m plain"), "green plain");
        assert_eq!(strip(b"\x1b]0;my title\x07prompt$ "), "prompt$ ");
        assert_eq!(strip(b"\x1b]2;t\x1b\\ok"), "ok");
    }

    #[test]
    fn test_strip_keeps_newlines_and_tabs() {
        assert_eq!(strip(b"a\r\n\tb\x07\x08"), "a\n\tb");
    }

    #[test]
    fn test_sequences_split_across_reads() {
        let mut stripper = EscapeStripper::new();
        let mut out = String::new();
        for part in [&b"red \x1b[3"[..], b"1mtext\x1b", b"[0m\n"] {
            out.push_str(&stripper.decode(part));
        }
        assert_eq!(out, "red text\n");

        let mut out = String::new();
        for part in [&b"\x1b]0;ti"[..], b"tle\x1b", b"\\$ "] {
            out.push_str(&stripper.decode(part));
        }
        assert_eq!(out, "$ ");
    }

    #[test]
    fn test_stripper_decodes_split_multibyte() {
        let bytes = "é\n".as_bytes();
        let mut stripper = EscapeStripper::new();
        assert_eq!(stripper.decode(&bytes[..1]), "");
        assert_eq!(stripper.decode(&bytes[1..]), "é\n");
    }

    #[test]
    fn test_decoder_choice() {
        let mut raw = OutputDecoder::new(false);
        assert_eq!(raw.decode(b"\x1b[1mb\x1b[0m"), "\x1b[1mb\x1b[0m");
        let mut stripped = OutputDecoder::new(true);
        assert_eq!(stripped.decode(b"\x1b[1mb\x1b[0m"), "b");
        assert_eq!(stripped.finish(), "");
    }
}
