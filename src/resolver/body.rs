//! Bounded, deadline-aware body reading.

use std::fmt::Display;

use bytes::Bytes;
use encoding_rs::Encoding;
use futures::{FutureExt, Stream, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::FetchFailure;
use crate::resolver::deadline::Deadline;
use crate::resolver::encoding::{
    charset_from_content_type, resolve_encoding, sniff_meta_charset, StreamDecoder, SNIFF_WINDOW,
};

static HEAD_CLOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</head\s*>").expect("valid regex"));

#[derive(Debug, Clone, Copy)]
pub struct BodyLimits {
    /// Hard cap on raw bytes accepted from the stream.
    pub max_bytes: usize,
    /// Raw bytes still accepted once `</head>` has been decoded.
    pub head_tail_bytes: usize,
}

#[derive(Debug)]
pub struct BodyText {
    pub text: String,
    pub encoding: &'static Encoding,
    pub bytes_read: usize,
    /// Reading stopped at a byte cap (or a late stream error) rather than EOF.
    pub truncated: bool,
    pub head_complete: bool,
}

/// Read `stream` until EOF or a byte cap, decoding as it goes.
///
/// The encoding is fixed as soon as the header names one, a `<meta>` charset
/// is sniffed, or [`SNIFF_WINDOW`] bytes are buffered without finding one.
pub async fn read_limited<S, E>(
    mut stream: S,
    content_type: Option<&str>,
    limits: BodyLimits,
    deadline: Deadline,
) -> Result<BodyText, FetchFailure>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut decoder = content_type
        .and_then(charset_from_content_type)
        .map(StreamDecoder::new);
    let mut pending: Vec<u8> = Vec::new();
    let mut cap = limits.max_bytes;
    let mut bytes_read = 0usize;
    let mut truncated = false;
    let mut ended = false;
    let mut head_complete = false;
    let mut scan_from = 0usize;

    while bytes_read < cap {
        let chunk = match deadline.run(stream.next()).await? {
            None => {
                ended = true;
                break;
            }
            Some(Ok(chunk)) => chunk,
            Some(Err(e)) if bytes_read == 0 => {
                return Err(FetchFailure::Network(format!("response stream error: {e}")));
            }
            Some(Err(e)) => {
                tracing::debug!(error = %e, bytes_read, "Body stream failed mid-read; keeping partial body");
                truncated = true;
                break;
            }
        };

        let take = chunk.len().min(cap - bytes_read);
        let accepted = &chunk[..take];
        bytes_read += take;
        if take < chunk.len() {
            truncated = true;
        }

        match decoder.as_mut() {
            Some(decoder) => decoder.push(accepted),
            None => {
                pending.extend_from_slice(accepted);
                if pending.len() >= SNIFF_WINDOW || sniff_meta_charset(&pending).is_some() {
                    let mut fresh = StreamDecoder::new(resolve_encoding(None, &pending));
                    fresh.push(&pending);
                    pending.clear();
                    decoder = Some(fresh);
                }
            }
        }

        if !head_complete {
            if let Some(decoder) = decoder.as_ref() {
                let text = decoder.text();
                if HEAD_CLOSE_RE.is_match_at(text, scan_from) {
                    head_complete = true;
                    cap = cap.min(bytes_read.saturating_add(limits.head_tail_bytes));
                } else {
                    scan_from = floor_char_boundary(text, text.len().saturating_sub(8));
                }
            }
        }

        if truncated {
            break;
        }
    }

    if bytes_read >= cap && !truncated && !ended {
        // The cap was filled exactly. Only an end of stream that is already
        // available counts as a complete body; anything else is discarded.
        truncated = !matches!(stream.next().now_or_never(), Some(None));
    }

    let decoder = match decoder {
        Some(mut decoder) => {
            decoder.push(&pending);
            decoder
        }
        None => {
            let mut fresh = StreamDecoder::new(resolve_encoding(None, &pending));
            fresh.push(&pending);
            fresh
        }
    };
    let encoding = decoder.encoding();
    let text = decoder.finish();

    if !head_complete {
        head_complete = HEAD_CLOSE_RE.is_match(&text);
    }

    if truncated {
        tracing::debug!(bytes_read, head_complete, "Body read stopped at byte cap");
    }

    Ok(BodyText {
        text,
        encoding,
        bytes_read,
        truncated,
        head_complete,
    })
}

fn floor_char_boundary(text: &str, mut index: usize) -> usize {
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }
    index
}
