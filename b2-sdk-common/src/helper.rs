use crate::Error;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use sha1::{Digest, Sha1};
use std::io::{self, Read};

/// b2要求文件名、file info按UTF-8进行percent-encode，`/`保持原样
const B2_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// 十六进制sha1的长度
pub const SHA1_HEX_LEN: u64 = 40;

pub fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, B2_ENCODE_SET).to_string()
}

pub fn percent_decode(s: &str) -> Result<String, Error> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|cow| cow.into_owned())
        .map_err(|_| Error::InvalidUtf8(s.to_owned()))
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// 流式计算sha1
pub fn sha1_hex_from_reader(reader: &mut impl Read) -> io::Result<String> {
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// 先输出内部reader的全部内容，读完后再输出这些内容的40位十六进制sha1
///
/// 对应上传时`X-Bz-Content-Sha1: hex_digits_at_end`的用法
pub struct HexDigitsAtEnd<R> {
    inner: R,
    hasher: Option<Sha1>,
    digits: Vec<u8>,
    pos: usize,
}

impl<R: Read> HexDigitsAtEnd<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Some(Sha1::new()),
            digits: Vec::new(),
            pos: 0,
        }
    }
}

impl<R: Read> Read for HexDigitsAtEnd<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        if self.hasher.is_some() {
            let n = self.inner.read(buf)?;
            if n > 0 {
                if let Some(hasher) = self.hasher.as_mut() {
                    hasher.update(&buf[..n]);
                }
                return Ok(n);
            }
            // 内容读完，切换为输出digest
            if let Some(hasher) = self.hasher.take() {
                self.digits = hex::encode(hasher.finalize()).into_bytes();
            }
        }

        let remaining = &self.digits[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

pub fn into_header_map<'a>(
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<HeaderMap, Error> {
    let mut map = HeaderMap::new();
    for (k, v) in pairs {
        let name = HeaderName::from_bytes(k.as_bytes()).map_err(|e| Error::InvalidHeader {
            name: k.to_owned(),
            reason: e.to_string(),
        })?;
        let value = HeaderValue::from_str(v).map_err(|e| Error::InvalidHeader {
            name: k.to_owned(),
            reason: e.to_string(),
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// 非可见ASCII的header值会被跳过
pub fn from_header_map(map: &HeaderMap) -> Vec<(String, String)> {
    map.iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.as_str().to_owned(), s.to_owned())))
        .collect()
}

#[test]
fn percent_encode_test() {
    assert_eq!(percent_encode("a/b c.txt"), "a/b%20c.txt");
    assert_eq!(percent_encode("~x_y-z"), "~x_y-z");
    assert_eq!(percent_encode("\u{4e2d}"), "%E4%B8%AD");
    assert_eq!(percent_encode("a+b=c&d"), "a%2Bb%3Dc%26d");
}

#[test]
fn percent_decode_test() {
    assert_eq!(percent_decode("a/b%20c.txt").unwrap(), "a/b c.txt");
    assert_eq!(percent_decode("%E4%B8%AD").unwrap(), "\u{4e2d}");
    assert!(percent_decode("%FF").is_err());
}

#[test]
fn sha1_hex_test() {
    assert_eq!(
        sha1_hex(b"hello world"),
        "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
    );
    let mut reader: &[u8] = b"hello world";
    assert_eq!(
        sha1_hex_from_reader(&mut reader).unwrap(),
        "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
    );
}

#[test]
fn hex_digits_at_end_test() {
    let mut out = String::new();
    HexDigitsAtEnd::new(&b"hello world"[..])
        .read_to_string(&mut out)
        .unwrap();
    assert_eq!(out, "hello world2aae6c35c94fcfb415dbe95f408b9ce91ee846ed");
    assert_eq!(out.len() as u64, 11 + SHA1_HEX_LEN);
}

#[test]
fn header_map_test() {
    let map = into_header_map([("X-Bz-File-Name", "a%20b"), ("Authorization", "t")]).unwrap();
    assert_eq!(map.get("x-bz-file-name").unwrap(), "a%20b");
    assert!(into_header_map([("User-Agent", "bad\r\nvalue")]).is_err());
    assert!(into_header_map([("bad name", "v")]).is_err());

    let pairs = from_header_map(&map);
    assert!(pairs.contains(&("authorization".to_owned(), "t".to_owned())));
}
