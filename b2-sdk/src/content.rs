//! 上传的内容来源和下载的内容去向

use crate::Error;
use crate::headers::{self, Headers};
use b2_sdk_common::helper::{HexDigitsAtEnd, SHA1_HEX_LEN, sha1_hex, sha1_hex_from_reader};
use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

// region:    --- content source
/// 上传内容的来源
///
/// `open`每次调用都应该返回一个从头开始的新reader，上传失败后可以重新打开再传一次。
pub trait ContentSource: Send + Sync {
    fn content_length(&self) -> io::Result<u64>;

    /// 十六进制的sha1，返回`None`时会在body末尾追加sha1
    fn sha1_or_none(&self) -> io::Result<Option<String>>;

    /// 会作为`src_last_modified_millis`的file info发送
    fn src_last_modified_millis(&self) -> io::Result<Option<i64>>;

    fn open(&self) -> io::Result<Box<dyn Read + Send>>;
}

/// 内存中的数据，sha1在创建时计算
#[derive(Clone)]
pub struct BytesContentSource {
    data: Arc<Vec<u8>>,
    sha1: String,
    src_last_modified_millis: Option<i64>,
}

impl BytesContentSource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        let data = data.into();
        let sha1 = sha1_hex(&data);
        Self {
            data: Arc::new(data),
            sha1,
            src_last_modified_millis: None,
        }
    }

    pub fn with_src_last_modified_millis(mut self, millis: i64) -> Self {
        self.src_last_modified_millis = Some(millis);
        self
    }
}

impl ContentSource for BytesContentSource {
    fn content_length(&self) -> io::Result<u64> {
        Ok(self.data.len() as u64)
    }

    fn sha1_or_none(&self) -> io::Result<Option<String>> {
        Ok(Some(self.sha1.clone()))
    }

    fn src_last_modified_millis(&self) -> io::Result<Option<i64>> {
        Ok(self.src_last_modified_millis)
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(io::Cursor::new(SharedBytes(self.data.clone()))))
    }
}

struct SharedBytes(Arc<Vec<u8>>);

impl AsRef<[u8]> for SharedBytes {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// 本地文件，长度和修改时间取自文件的metadata
///
/// 没有通过[`FileContentSource::with_sha1`]指定sha1时，上传使用`hex_digits_at_end`，
/// 文件只需要读一遍。
#[derive(Debug, Clone)]
pub struct FileContentSource {
    path: PathBuf,
    sha1: Option<String>,
}

impl FileContentSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sha1: None,
        }
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }

    /// 先把文件完整读一遍算出sha1
    pub fn with_computed_sha1(mut self) -> io::Result<Self> {
        let mut file = File::open(&self.path)?;
        self.sha1 = Some(sha1_hex_from_reader(&mut file)?);
        Ok(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ContentSource for FileContentSource {
    fn content_length(&self) -> io::Result<u64> {
        Ok(std::fs::metadata(&self.path)?.len())
    }

    fn sha1_or_none(&self) -> io::Result<Option<String>> {
        Ok(self.sha1.clone())
    }

    fn src_last_modified_millis(&self) -> io::Result<Option<i64>> {
        let modified = std::fs::metadata(&self.path)?.modified()?;
        let millis = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .ok();
        Ok(millis)
    }

    fn open(&self) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

/// 一次上传所需的内容信息
///
/// 持有打开的reader，`take_input`把它交给传输层；无论上传成功、失败还是提前返回，
/// reader都会随着drop被关闭。
pub(crate) struct ContentDetailsForUpload {
    content_length: u64,
    sha1_header_value: String,
    input: Option<Box<dyn Read + Send>>,
}

impl ContentDetailsForUpload {
    pub(crate) fn new(source: &dyn ContentSource) -> Result<Self, Error> {
        let source_length = source
            .content_length()
            .map_err(|e| Error::local("read_failed", format!("failed to get length from source: {e}")))?;
        let sha1 = source
            .sha1_or_none()
            .map_err(|e| Error::local("read_failed", format!("failed to get sha1 from source: {e}")))?;
        let input = source
            .open()
            .map_err(|e| Error::local("read_failed", format!("failed to open source: {e}")))?;

        let details = match sha1 {
            Some(sha1) => Self {
                content_length: source_length,
                sha1_header_value: sha1,
                input: Some(input),
            },
            None => Self {
                content_length: source_length + SHA1_HEX_LEN,
                sha1_header_value: headers::HEX_DIGITS_AT_END.to_owned(),
                input: Some(Box::new(HexDigitsAtEnd::new(input))),
            },
        };
        Ok(details)
    }

    /// 发送的字节数，使用`hex_digits_at_end`时包含末尾的40个字节
    pub(crate) fn content_length(&self) -> u64 {
        self.content_length
    }

    pub(crate) fn sha1_header_value(&self) -> &str {
        &self.sha1_header_value
    }

    pub(crate) fn take_input(&mut self) -> Result<Box<dyn Read + Send>, Error> {
        self.input
            .take()
            .ok_or_else(|| Error::Common("content input already taken".to_owned()))
    }
}
// endregion: --- content source

// region:    --- content sink
/// 下载内容的去向，`input`只在调用期间有效
pub trait ContentSink {
    fn read_content(&mut self, headers: &Headers, input: &mut dyn Read) -> Result<(), Error>;
}

/// 把内容和响应头保存在内存中
#[derive(Debug, Default)]
pub struct MemorySink {
    headers: Option<Headers>,
    bytes: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn headers(&self) -> Option<&Headers> {
        self.headers.as_ref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl ContentSink for MemorySink {
    fn read_content(&mut self, headers: &Headers, input: &mut dyn Read) -> Result<(), Error> {
        self.bytes.clear();
        input.read_to_end(&mut self.bytes)?;
        self.headers = Some(headers.clone());
        Ok(())
    }
}

/// 写入本地文件
///
/// 开启`verify_sha1`后，如果响应头带有sha1（且不是`none`），写完后会校验，不一致则返回错误。
/// 带range的下载不要开启校验，响应头中的sha1是整个文件的。
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
    verify_sha1: bool,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            verify_sha1: false,
        }
    }

    pub fn verify_sha1(mut self, verify: bool) -> Self {
        self.verify_sha1 = verify;
        self
    }
}

impl ContentSink for FileSink {
    fn read_content(&mut self, headers: &Headers, input: &mut dyn Read) -> Result<(), Error> {
        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = input.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            writer.write_all(&buf[..n])?;
        }
        writer.flush()?;

        if self.verify_sha1 {
            if let Some(expected) = headers.content_sha1().filter(|s| *s != "none") {
                let actual = hex::encode(hasher.finalize());
                // 大文件的sha1可能以`unverified:`开头
                let expected = expected.strip_prefix("unverified:").unwrap_or(expected);
                if !actual.eq_ignore_ascii_case(expected) {
                    return Err(Error::local(
                        "sha1_mismatch",
                        format!("sha1 of downloaded content is {actual}, expected {expected}"),
                    ));
                }
            }
        }
        Ok(())
    }
}
// endregion: --- content sink
