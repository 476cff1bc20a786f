//! Character encoding resolution and incremental decoding.
//!
//! Priority: `charset` on the `Content-Type` header, then a `<meta>` charset
//! declaration sniffed from the first bytes of the body, then UTF-8.

use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use once_cell::sync::Lazy;
use regex::Regex;

/// How many leading body bytes are searched for a `<meta>` charset declaration.
pub const SNIFF_WINDOW: usize = 8 * 1024;

static HEADER_CHARSET_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)charset\s*=\s*["']?([^"';\s]+)"#).expect("valid regex"));

static META_CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?\s*([^"'\s/>;]+)["'\s/>;]"#).expect("valid regex")
});

static HTTP_EQUIV_CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)<meta[^>]+http-equiv\s*=\s*["']?content-type["']?[^>]*content\s*=\s*["']?[^"'>]*charset\s*=\s*([^"'\s>;]+)["'\s>;]"#,
    )
    .expect("valid regex")
});

/// Map a charset label to an encoding, folding the aliases servers commonly
/// send that are not WHATWG labels. Unknown labels yield `None`.
pub fn normalize_charset(label: &str) -> Option<&'static Encoding> {
    let label = label
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_ascii_lowercase();
    let canonical = match label.as_str() {
        "utf8" => "utf-8",
        "shift-jis" | "shiftjis" | "cp932" | "ms932" | "windows-31j" | "sjis" => "shift_jis",
        "eucjp" => "euc-jp",
        "ks_c_5601-1987" | "euckr" => "euc-kr",
        "gb-2312" => "gb2312",
        "big-5" => "big5",
        other => other,
    };
    Encoding::for_label(canonical.as_bytes())
}

/// The encoding named by a `Content-Type` header's `charset` parameter.
pub fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    HEADER_CHARSET_RE
        .captures(content_type)
        .and_then(|c| c.get(1))
        .and_then(|m| normalize_charset(m.as_str()))
}

/// Look for `<meta charset>` or an `http-equiv` content-type declaration in the
/// body prefix. The prefix is read leniently; only ASCII matters here.
///
/// A label only counts once a delimiter follows it, so a prefix that ends
/// midway through `iso-8859-15` is not taken for `iso-8859-1`.
pub fn sniff_meta_charset(prefix: &[u8]) -> Option<&'static Encoding> {
    let window = &prefix[..prefix.len().min(SNIFF_WINDOW)];
    let text = String::from_utf8_lossy(window);

    [&*META_CHARSET_RE, &*HTTP_EQUIV_CHARSET_RE]
        .into_iter()
        .filter_map(|re| re.captures(&text))
        .filter_map(|c| c.get(1))
        .find_map(|m| normalize_charset(m.as_str()))
}

pub fn resolve_encoding(content_type: Option<&str>, prefix: &[u8]) -> &'static Encoding {
    content_type
        .and_then(charset_from_content_type)
        .or_else(|| sniff_meta_charset(prefix))
        .unwrap_or(UTF_8)
}

/// Decode a complete buffer. Invalid sequences become U+FFFD; never fails.
pub fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Incremental decoder used while a body is still streaming in, so the text
/// decoded so far can be inspected between chunks.
pub struct StreamDecoder {
    decoder: Decoder,
    text: String,
}

impl StreamDecoder {
    pub fn new(encoding: &'static Encoding) -> Self {
        StreamDecoder {
            decoder: encoding.new_decoder(),
            text: String::new(),
        }
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.decoder.encoding()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.feed(bytes, false);
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish(mut self) -> String {
        self.feed(&[], true);
        self.text
    }

    fn feed(&mut self, mut bytes: &[u8], last: bool) {
        loop {
            let (result, read, _) = self.decoder.decode_to_string(bytes, &mut self.text, last);
            bytes = &bytes[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => {
                    let needed = self
                        .decoder
                        .max_utf8_buffer_length(bytes.len())
                        .unwrap_or(bytes.len() * 3 + 16);
                    self.text.reserve(needed.max(16));
                }
            }
        }
    }
}
