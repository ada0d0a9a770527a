use thiserror::Error;

use crate::http::headers::HeaderMap;
use crate::http::request::{Method, Request};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed request line")]
    InvalidRequest,
    #[error("unknown method")]
    InvalidMethod,
    #[error("malformed header")]
    InvalidHeader,
    #[error("invalid Content-Length")]
    InvalidContentLength,
    /// Only `chunked` framing is understood.
    #[error("unsupported Transfer-Encoding")]
    UnsupportedTransferEncoding,
    #[error("malformed chunked body")]
    InvalidChunk,
    #[error("request headers too large")]
    HeadersTooLarge,
    #[error("incomplete request")]
    Incomplete,
}

/// Upper bound on the request line plus headers.
pub const MAX_HEADER_BYTES: usize = 64 * 1024;

const MAX_CHUNK_LINE: usize = 4096;

pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    // Look for header/body separator
    let headers_end = match find_headers_end(buf) {
        Some(end) => end,
        None if buf.len() > MAX_HEADER_BYTES => return Err(ParseError::HeadersTooLarge),
        None => return Err(ParseError::Incomplete),
    };
    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let headers_str = std::str::from_utf8(header_bytes)
        .map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest);
    let mut parts = request_line?.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let path = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    if !version.starts_with("HTTP/") {
        return Err(ParseError::InvalidRequest);
    }

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;

    // Headers
    let mut headers = HeaderMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or(ParseError::InvalidHeader)?;

        if key.is_empty() || key.trim() != key {
            return Err(ParseError::InvalidHeader);
        }

        headers.append(key, value.trim());
    }

    let transfer_encoding = headers
        .get("Transfer-Encoding")
        .map(|v| v.trim().to_ascii_lowercase());

    let (body, body_len) = match transfer_encoding.as_deref() {
        Some("chunked") => {
            // framing is ours to strip; the outbound client sets its own
            headers.remove("Transfer-Encoding");
            headers.remove("Content-Length");
            decode_chunked(body_bytes)?
        }
        Some("identity") | None => {
            let content_length = headers
                .get("Content-Length")
                .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
                .transpose()?
                .unwrap_or(0);

            if body_bytes.len() < content_length {
                return Err(ParseError::Incomplete);
            }
            (body_bytes[..content_length].to_vec(), content_length)
        }
        Some(_) => return Err(ParseError::UnsupportedTransferEncoding),
    };

    let request = Request {
        method,
        path: path.to_string(),
        version: version.to_string(),
        headers,
        body,
        remote_addr: None,
    };

    let total_consumed = headers_end + 4 + body_len;
    Ok((request, total_consumed))
}

/// Whether `buf` holds a complete head that asks for `100 Continue`.
pub fn expects_continue(buf: &[u8]) -> bool {
    let Some(headers_end) = find_headers_end(buf) else {
        return false;
    };
    let Ok(head) = std::str::from_utf8(&buf[..headers_end]) else {
        return false;
    };

    head.split("\r\n").skip(1).any(|line| {
        line.split_once(':').is_some_and(|(key, value)| {
            key.eq_ignore_ascii_case("Expect") && value.trim().eq_ignore_ascii_case("100-continue")
        })
    })
}

/// Decodes a chunked body, returning it with the number of bytes consumed.
fn decode_chunked(buf: &[u8]) -> Result<(Vec<u8>, usize), ParseError> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let line_end = find_line_end(&buf[pos..])?;
        let line = std::str::from_utf8(&buf[pos..pos + line_end])
            .map_err(|_| ParseError::InvalidChunk)?;
        let size_str = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_str, 16).map_err(|_| ParseError::InvalidChunk)?;
        pos += line_end + 2;

        if size == 0 {
            // trailer fields, then an empty line
            loop {
                let end = find_line_end(&buf[pos..])?;
                pos += end + 2;
                if end == 0 {
                    return Ok((body, pos));
                }
            }
        }

        let data_end = pos.checked_add(size).ok_or(ParseError::InvalidChunk)?;
        let chunk_end = data_end.checked_add(2).ok_or(ParseError::InvalidChunk)?;
        if buf.len() < chunk_end {
            return Err(ParseError::Incomplete);
        }
        if &buf[data_end..chunk_end] != b"\r\n" {
            return Err(ParseError::InvalidChunk);
        }

        body.extend_from_slice(&buf[pos..data_end]);
        pos = chunk_end;
    }
}

/// Position of the next CRLF; size lines and trailers are kept short.
fn find_line_end(buf: &[u8]) -> Result<usize, ParseError> {
    match buf.windows(2).position(|w| w == b"\r\n") {
        Some(end) if end <= MAX_CHUNK_LINE => Ok(end),
        Some(_) => Err(ParseError::InvalidChunk),
        None if buf.len() > MAX_CHUNK_LINE => Err(ParseError::InvalidChunk),
        None => Err(ParseError::Incomplete),
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn pipelined_requests_consume_one_at_a_time() {
        let req = b"GET /a HTTP/1.1\r\n\r\nGET /b HTTP/1.1\r\n\r\n";

        let (first, consumed) = parse_http_request(req).unwrap();
        let (second, _) = parse_http_request(&req[consumed..]).unwrap();

        assert_eq!(first.path, "/a");
        assert_eq!(second.path, "/b");
    }

    #[test]
    fn oversized_headers_are_rejected() {
        let req = vec![b'a'; MAX_HEADER_BYTES + 1];

        assert!(matches!(
            parse_http_request(&req),
            Err(ParseError::HeadersTooLarge)
        ));
    }

    #[test]
    fn chunked_body_with_extensions_and_trailers() {
        let body = b"4;ext=1\r\nWiki\r\n5\r\npedia\r\n0\r\nX-Checksum: abc\r\n\r\nGET";

        let (decoded, consumed) = decode_chunked(body).unwrap();

        assert_eq!(decoded, b"Wikipedia".to_vec());
        assert_eq!(&body[consumed..], b"GET");
    }

    #[test]
    fn chunked_body_waits_for_more_data() {
        for partial in [&b"5\r\nhel"[..], b"5\r\nhello\r\n", b"5\r\nhello\r\n0\r\n", b"a"] {
            assert!(matches!(decode_chunked(partial), Err(ParseError::Incomplete)));
        }
    }

    #[test]
    fn chunked_body_rejects_bad_framing() {
        assert!(matches!(decode_chunked(b"zz\r\n"), Err(ParseError::InvalidChunk)));
        assert!(matches!(decode_chunked(b"2\r\nabc\r\n"), Err(ParseError::InvalidChunk)));
        assert!(matches!(
            decode_chunked(b"ffffffffffffffff\r\nx"),
            Err(ParseError::InvalidChunk) | Err(ParseError::Incomplete)
        ));
    }

    #[test]
    fn expect_continue_needs_a_complete_head() {
        assert!(expects_continue(b"POST / HTTP/1.1\r\nExpect: 100-continue\r\n\r\n"));
        assert!(!expects_continue(b"POST / HTTP/1.1\r\nExpect: 100-continue\r\n"));
        assert!(!expects_continue(b"POST / HTTP/1.1\r\nContent-Length: 1\r\n\r\n"));
    }
}
