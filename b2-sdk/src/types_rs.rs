//! b2api/v1的请求和响应结构
//!
//! [B2 API文档](https://www.backblaze.com/apidocs/introduction-to-the-b2-native-api)
//!
//! 所有请求都是不可变的值，分页用的`with_start*`方法返回一个新的请求，原请求不变。

use crate::content::ContentSource;
use crate::progress::UploadListener;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;

/// 让服务端根据文件名推断content type
pub const AUTO_CONTENT_TYPE: &str = "b2/x-auto";

// region:    --- common
/// 服务端的测试模式，通过`X-Bz-Test-Mode`发送
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestMode {
    FailSomeUploads,
    ExpireSomeAccountAuthorizationTokens,
    ForceCapExceeded,
}

impl TestMode {
    pub fn value_for_header(&self) -> &'static str {
        match self {
            TestMode::FailSomeUploads => "fail_some_uploads",
            TestMode::ExpireSomeAccountAuthorizationTokens => {
                "expire_some_account_authorization_tokens"
            }
            TestMode::ForceCapExceeded => "force_cap_exceeded",
        }
    }
}

impl std::str::FromStr for TestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail_some_uploads" => Ok(TestMode::FailSomeUploads),
            "expire_some_account_authorization_tokens" => {
                Ok(TestMode::ExpireSomeAccountAuthorizationTokens)
            }
            "force_cap_exceeded" => Ok(TestMode::ForceCapExceeded),
            other => Err(format!("unknown test mode: {other}")),
        }
    }
}

/// 下载时的字节范围，`end`包含在内
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn between(start: u64, end: u64) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    pub fn starting_at(start: u64) -> Self {
        Self { start, end: None }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "bytes={}-{}", self.start, end),
            None => write!(f, "bytes={}-", self.start),
        }
    }
}

fn millis_to_date_time(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000).ok()
}
// endregion: --- common

// region:    --- authorize account
#[derive(Builder, Clone)]
#[builder(on(String, into))]
pub struct AuthorizeAccountRequest {
    pub account_id: String,
    pub application_key: String,
}

impl fmt::Debug for AuthorizeAccountRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizeAccountRequest")
            .field("account_id", &self.account_id)
            .field("application_key", &"***")
            .finish()
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountAuthorization {
    pub account_id: String,
    pub authorization_token: String,
    pub api_url: String,
    pub download_url: String,
    #[serde(default)]
    pub recommended_part_size: u64,
    #[serde(default)]
    pub absolute_minimum_part_size: u64,
}
// endregion: --- authorize account

// region:    --- bucket
pub struct BucketTypes;

impl BucketTypes {
    pub const ALL_PUBLIC: &'static str = "allPublic";
    pub const ALL_PRIVATE: &'static str = "allPrivate";
    pub const SNAPSHOT: &'static str = "snapshot";
}

#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRule {
    pub file_name_prefix: String,
    pub days_from_uploading_to_hiding: Option<u32>,
    pub days_from_hiding_to_deleting: Option<u32>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub account_id: String,
    pub bucket_id: String,
    pub bucket_name: String,
    pub bucket_type: String,
    #[serde(default)]
    pub bucket_info: BTreeMap<String, String>,
    #[serde(default)]
    pub lifecycle_rules: Vec<LifecycleRule>,
    #[serde(default)]
    pub revision: u64,
}

/// `accountId`由webifier从账号授权中填入
#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct CreateBucketRequest {
    pub bucket_name: String,
    pub bucket_type: String,
    #[builder(default)]
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub bucket_info: BTreeMap<String, String>,
    #[builder(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lifecycle_rules: Vec<LifecycleRule>,
}

#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize, Debug, Clone, Default)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct ListBucketsRequest {
    pub bucket_id: Option<String>,
    pub bucket_name: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ListBucketsResponse {
    pub buckets: Vec<Bucket>,
}

#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct UpdateBucketRequest {
    pub bucket_id: String,
    pub bucket_type: Option<String>,
    pub bucket_info: Option<BTreeMap<String, String>>,
    pub lifecycle_rules: Option<Vec<LifecycleRule>>,
    /// 只有当前revision等于该值时才更新
    pub if_revision_is: Option<u64>,
}

#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct DeleteBucketRequest {
    pub bucket_id: String,
}
// endregion: --- bucket

// region:    --- file version
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Upload,
    Start,
    Hide,
    Folder,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FileVersion {
    pub file_id: Option<String>,
    pub file_name: String,
    #[serde(default)]
    pub content_length: u64,
    pub content_type: Option<String>,
    pub content_sha1: Option<String>,
    #[serde(default)]
    pub file_info: BTreeMap<String, String>,
    pub action: Action,
    #[serde(default)]
    pub upload_timestamp: i64,
}

impl FileVersion {
    pub fn is_upload(&self) -> bool {
        self.action == Action::Upload
    }

    pub fn is_hide(&self) -> bool {
        self.action == Action::Hide
    }

    pub fn upload_time(&self) -> Option<OffsetDateTime> {
        millis_to_date_time(self.upload_timestamp)
    }
}

#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct GetFileInfoRequest {
    pub file_id: String,
}

#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct HideFileRequest {
    pub bucket_id: String,
    pub file_name: String,
}

#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileVersionRequest {
    pub file_name: String,
    pub file_id: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFileVersionResponse {
    pub file_id: String,
    pub file_name: String,
}
// endregion: --- file version

// region:    --- upload
#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct GetUploadUrlRequest {
    pub bucket_id: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub bucket_id: String,
    pub upload_url: String,
    pub authorization_token: String,
}

#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct GetUploadPartUrlRequest {
    pub file_id: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadPartUrlResponse {
    pub file_id: String,
    pub upload_url: String,
    pub authorization_token: String,
}

/// - `content_type`默认为`b2/x-auto`
/// - `file_info`的key和value在发送时都会percent-encode，并加上`X-Bz-Info-`前缀
#[derive(Builder, Clone)]
#[builder(on(String, into))]
pub struct UploadFileRequest {
    pub file_name: String,
    #[builder(default = AUTO_CONTENT_TYPE.to_owned())]
    pub content_type: String,
    pub content_source: Arc<dyn ContentSource>,
    #[builder(default)]
    pub file_info: BTreeMap<String, String>,
    pub listener: Option<Arc<dyn UploadListener>>,
}

/// `part_number`从1开始；`part_count`和`start_byte`只用于进度上报
#[derive(Builder, Clone)]
pub struct UploadPartRequest {
    pub part_number: u32,
    pub content_source: Arc<dyn ContentSource>,
    pub listener: Option<Arc<dyn UploadListener>>,
    pub part_count: Option<u32>,
    #[builder(default)]
    pub start_byte: u64,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub file_id: String,
    pub part_number: u32,
    pub content_length: u64,
    pub content_sha1: String,
    #[serde(default)]
    pub upload_timestamp: i64,
}

impl Part {
    pub fn upload_time(&self) -> Option<OffsetDateTime> {
        millis_to_date_time(self.upload_timestamp)
    }
}
// endregion: --- upload

// region:    --- large file
#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct StartLargeFileRequest {
    pub bucket_id: String,
    pub file_name: String,
    #[builder(default = AUTO_CONTENT_TYPE.to_owned())]
    pub content_type: String,
    #[builder(default)]
    pub file_info: BTreeMap<String, String>,
}

#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct FinishLargeFileRequest {
    pub file_id: String,
    pub part_sha1_array: Vec<String>,
}

#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct CancelLargeFileRequest {
    pub file_id: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CancelLargeFileResponse {
    pub file_id: String,
    pub account_id: String,
    pub bucket_id: String,
    pub file_name: String,
}
// endregion: --- large file

// region:    --- list file versions
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize, Debug, Clone, PartialEq, Eq)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct ListFileVersionsRequest {
    pub bucket_id: String,
    pub start_file_name: Option<String>,
    pub start_file_id: Option<String>,
    pub max_file_count: Option<u32>,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
}

impl ListFileVersionsRequest {
    pub fn with_start(&self, start_file_name: Option<String>, start_file_id: Option<String>) -> Self {
        Self {
            start_file_name,
            start_file_id,
            ..self.clone()
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListFileVersionsResponse {
    pub files: Vec<FileVersion>,
    pub next_file_name: Option<String>,
    pub next_file_id: Option<String>,
}
// endregion: --- list file versions

// region:    --- list file names
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize, Debug, Clone, PartialEq, Eq)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct ListFileNamesRequest {
    pub bucket_id: String,
    pub start_file_name: Option<String>,
    pub max_file_count: Option<u32>,
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
}

impl ListFileNamesRequest {
    pub fn with_start_file_name(&self, start_file_name: Option<String>) -> Self {
        Self {
            start_file_name,
            ..self.clone()
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListFileNamesResponse {
    pub files: Vec<FileVersion>,
    pub next_file_name: Option<String>,
}
// endregion: --- list file names

// region:    --- list unfinished large files
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize, Debug, Clone, PartialEq, Eq)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct ListUnfinishedLargeFilesRequest {
    pub bucket_id: String,
    pub name_prefix: Option<String>,
    pub start_file_id: Option<String>,
    pub max_file_count: Option<u32>,
}

impl ListUnfinishedLargeFilesRequest {
    pub fn with_start_file_id(&self, start_file_id: Option<String>) -> Self {
        Self {
            start_file_id,
            ..self.clone()
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListUnfinishedLargeFilesResponse {
    pub files: Vec<FileVersion>,
    pub next_file_id: Option<String>,
}
// endregion: --- list unfinished large files

// region:    --- list parts
#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize, Debug, Clone, PartialEq, Eq)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct ListPartsRequest {
    pub file_id: String,
    pub start_part_number: Option<u32>,
    pub max_part_count: Option<u32>,
}

impl ListPartsRequest {
    pub fn with_start_part_number(&self, start_part_number: Option<u32>) -> Self {
        Self {
            start_part_number,
            ..self.clone()
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ListPartsResponse {
    pub parts: Vec<Part>,
    pub next_part_number: Option<u32>,
}
// endregion: --- list parts

// region:    --- download
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(on(String, into))]
pub struct DownloadByIdRequest {
    pub file_id: String,
    pub range: Option<ByteRange>,
    /// 覆盖响应的`Content-Disposition`
    pub b2_content_disposition: Option<String>,
}

#[derive(Builder, Debug, Clone, PartialEq, Eq)]
#[builder(on(String, into))]
pub struct DownloadByNameRequest {
    pub bucket_name: String,
    pub file_name: String,
    pub range: Option<ByteRange>,
    pub b2_content_disposition: Option<String>,
}

#[serde_with::skip_serializing_none]
#[derive(Builder, Serialize, Debug, Clone)]
#[builder(on(String, into))]
#[serde(rename_all = "camelCase")]
pub struct GetDownloadAuthorizationRequest {
    pub bucket_id: String,
    pub file_name_prefix: String,
    pub valid_duration_in_seconds: u64,
    pub b2_content_disposition: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadAuthorization {
    pub bucket_id: String,
    pub file_name_prefix: String,
    pub authorization_token: String,
}
// endregion: --- download
