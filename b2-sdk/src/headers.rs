//! 请求头/响应头
//!
//! header名称不区分大小写，`set`会覆盖同名（忽略大小写）的旧值。

use crate::Error;
use b2_sdk_common::helper::{from_header_map, into_header_map, percent_decode};
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;

pub const AUTHORIZATION: &str = "Authorization";
pub const USER_AGENT: &str = "User-Agent";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const RANGE: &str = "Range";

pub const TEST_MODE: &str = "X-Bz-Test-Mode";
pub const FILE_NAME: &str = "X-Bz-File-Name";
pub const FILE_ID: &str = "X-Bz-File-Id";
pub const CONTENT_SHA1: &str = "X-Bz-Content-Sha1";
pub const UPLOAD_TIMESTAMP: &str = "X-Bz-Upload-Timestamp";
pub const PART_NUMBER: &str = "X-Bz-Part-Number";
pub const FILE_INFO_PREFIX: &str = "X-Bz-Info-";
pub const SRC_LAST_MODIFIED_MILLIS: &str = "X-Bz-Info-src_last_modified_millis";

/// 内容的sha1追加在body末尾时，`X-Bz-Content-Sha1`的取值
pub const HEX_DIGITS_AT_END: &str = "hex_digits_at_end";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    // key为小写名称，value为(原始名称, 值)
    entries: BTreeMap<String, (String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        self.entries
            .insert(name.to_ascii_lowercase(), (name, value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按小写名称排序输出(原始名称, 值)
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn to_header_map(&self) -> Result<HeaderMap, Error> {
        Ok(into_header_map(self.iter())?)
    }

    pub fn from_header_map(map: &HeaderMap) -> Self {
        let mut headers = Headers::new();
        for (k, v) in from_header_map(map) {
            headers.set(k, v);
        }
        headers
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get(CONTENT_LENGTH).and_then(|v| v.trim().parse().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get(CONTENT_TYPE)
    }

    pub fn file_id(&self) -> Option<&str> {
        self.get(FILE_ID)
    }

    /// 响应头中的文件名是percent-encoded的，这里返回解码后的值
    pub fn file_name(&self) -> Result<Option<String>, Error> {
        self.get(FILE_NAME)
            .map(|v| percent_decode(v).map_err(Error::from))
            .transpose()
    }

    pub fn content_sha1(&self) -> Option<&str> {
        self.get(CONTENT_SHA1)
    }

    pub fn upload_timestamp(&self) -> Option<i64> {
        self.get(UPLOAD_TIMESTAMP).and_then(|v| v.trim().parse().ok())
    }

    /// 所有`X-Bz-Info-*`，key去掉前缀，key和value都解码
    pub fn file_infos(&self) -> Result<BTreeMap<String, String>, Error> {
        let prefix = FILE_INFO_PREFIX.to_ascii_lowercase();
        let mut infos = BTreeMap::new();
        for (lower, (_, v)) in &self.entries {
            if let Some(key) = lower.strip_prefix(&prefix) {
                infos.insert(percent_decode(key)?, percent_decode(v)?);
            }
        }
        Ok(infos)
    }
}
