//! 把类型化的请求翻译为b2 HTTP请求，再把响应翻译回类型化的结果
//!
//! 除了构造时的配置（user agent、master url、test mode），webifier不保存任何状态，可以在线程间共享。

use crate::Error;
use crate::content::{ContentDetailsForUpload, ContentSink};
use crate::error::RequestCategory;
use crate::headers::{self, Headers};
use crate::progress::{ByteProgressFilter, PartContext, ProgressReader, UploadState};
use crate::types_rs::*;
use crate::web_api_client::WebApiClient;
use b2_sdk_common::helper::percent_encode;
use base64::{Engine, engine::general_purpose};
use bon::bon;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

pub const API_VERSION_PATH: &str = "b2api/v1/";
pub const DEFAULT_MASTER_URL: &str = "https://api.backblazeb2.com/";

// authorize_account的参数都在header中
#[derive(Serialize)]
struct Empty {}

// 需要accountId的请求，accountId取自账号授权
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WithAccountId<'a, T: Serialize> {
    account_id: &'a str,
    #[serde(flatten)]
    request: &'a T,
}

pub struct StorageClientWebifier {
    web_api_client: Arc<dyn WebApiClient>,
    user_agent: String,
    // 只用于authorize_account，总是以`/`结尾
    master_url: String,
    test_mode: Option<TestMode>,
    progress_interval: Duration,
}

#[bon]
impl StorageClientWebifier {
    /// - `user_agent`中包含ASCII控制字符（包括`\r`、`\n`）时返回错误
    /// - `progress_interval`：`Transferring`进度事件的最小间隔
    #[builder(on(String, into))]
    pub fn new(
        web_api_client: Arc<dyn WebApiClient>,
        user_agent: String,
        #[builder(default = DEFAULT_MASTER_URL.to_owned())] master_url: String,
        test_mode: Option<TestMode>,
        #[builder(default = ByteProgressFilter::DEFAULT_INTERVAL)]
        progress_interval: Duration,
    ) -> Result<Self, Error> {
        check_user_agent(&user_agent)?;
        let master_url = if master_url.ends_with('/') {
            master_url
        } else {
            format!("{master_url}/")
        };
        Ok(Self {
            web_api_client,
            user_agent,
            master_url,
            test_mode,
            progress_interval,
        })
    }
}

fn check_user_agent(user_agent: &str) -> Result<(), Error> {
    if user_agent.chars().any(|c| (c as u32) < 32) {
        return Err(Error::Common("control character in user-agent!".to_owned()));
    }
    Ok(())
}

fn ensure_trailing_slash(url: &str) -> String {
    if url.ends_with('/') {
        url.to_owned()
    } else {
        format!("{url}/")
    }
}

pub(crate) fn basic_authorization_value(account_id: &str, application_key: &str) -> String {
    let value = format!("{account_id}:{application_key}");
    format!("Basic {}", general_purpose::STANDARD.encode(value))
}

/// b2ContentDisposition存在时返回以`separator`开头的query参数，否则返回空字符串
fn maybe_b2_content_disposition(separator: char, b2_content_disposition: Option<&str>) -> String {
    match b2_content_disposition {
        Some(v) => format!("{separator}b2ContentDisposition={}", percent_encode(v)),
        None => String::new(),
    }
}

pub fn make_url(account_auth: &AccountAuthorization, api_name: &str) -> String {
    format!(
        "{}{}{}",
        ensure_trailing_slash(&account_auth.api_url),
        API_VERSION_PATH,
        api_name
    )
}

pub fn make_download_by_id_url(
    account_auth: &AccountAuthorization,
    file_id: &str,
    b2_content_disposition: Option<&str>,
) -> String {
    format!(
        "{}{}b2_download_file_by_id?fileId={}{}",
        ensure_trailing_slash(&account_auth.download_url),
        API_VERSION_PATH,
        file_id,
        maybe_b2_content_disposition('&', b2_content_disposition)
    )
}

pub fn make_download_by_name_url(
    account_auth: &AccountAuthorization,
    bucket_name: &str,
    file_name: &str,
    b2_content_disposition: Option<&str>,
) -> String {
    format!(
        "{}file/{}/{}{}",
        ensure_trailing_slash(&account_auth.download_url),
        bucket_name,
        percent_encode(file_name),
        maybe_b2_content_disposition('?', b2_content_disposition)
    )
}

impl StorageClientWebifier {
    pub fn master_url(&self) -> &str {
        &self.master_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn close(&self) {
        self.web_api_client.close();
    }

    // region:    --- helpers
    fn set_common_headers(&self, headers: &mut Headers) {
        headers.set(headers::USER_AGENT, self.user_agent.as_str());
        // 不是每个请求都受test mode影响，简单起见每个请求都带上
        if let Some(mode) = self.test_mode {
            headers.set(headers::TEST_MODE, mode.value_for_header());
        }
    }

    fn make_headers(&self, account_auth: &AccountAuthorization) -> Headers {
        let mut headers = Headers::new();
        headers.set(headers::AUTHORIZATION, account_auth.authorization_token.as_str());
        self.set_common_headers(&mut headers);
        headers
    }

    fn post_json<Req, Resp>(&self, url: &str, headers: &Headers, request: &Req) -> Result<Resp, Error>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let request = serde_json::to_value(request)?;
        let resp = self
            .web_api_client
            .post_json_return_json(url, headers, &request)?;
        Ok(serde_json::from_value(resp)?)
    }

    fn call<Req, Resp>(
        &self,
        account_auth: &AccountAuthorization,
        api_name: &str,
        request: &Req,
    ) -> Result<Resp, Error>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        self.post_json(
            &make_url(account_auth, api_name),
            &self.make_headers(account_auth),
            request,
        )
    }

    fn call_with_account_id<Req, Resp>(
        &self,
        account_auth: &AccountAuthorization,
        api_name: &str,
        request: &Req,
    ) -> Result<Resp, Error>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let request = WithAccountId {
            account_id: &account_auth.account_id,
            request,
        };
        self.call(account_auth, api_name, &request)
    }
    // endregion: --- helpers

    // region:    --- account
    pub fn authorize_account(
        &self,
        request: &AuthorizeAccountRequest,
    ) -> Result<AccountAuthorization, Error> {
        let mut headers = Headers::new();
        headers.set(
            headers::AUTHORIZATION,
            basic_authorization_value(&request.account_id, &request.application_key),
        );
        self.set_common_headers(&mut headers);

        let url = format!("{}{}b2_authorize_account", self.master_url, API_VERSION_PATH);
        self.post_json(&url, &headers, &Empty {})
            .map_err(|e| e.with_request_category(RequestCategory::AccountAuthorization))
    }
    // endregion: --- account

    // region:    --- bucket
    pub fn create_bucket(
        &self,
        account_auth: &AccountAuthorization,
        request: &CreateBucketRequest,
    ) -> Result<Bucket, Error> {
        self.call_with_account_id(account_auth, "b2_create_bucket", request)
    }

    pub fn list_buckets(
        &self,
        account_auth: &AccountAuthorization,
        request: &ListBucketsRequest,
    ) -> Result<ListBucketsResponse, Error> {
        self.call_with_account_id(account_auth, "b2_list_buckets", request)
    }

    pub fn update_bucket(
        &self,
        account_auth: &AccountAuthorization,
        request: &UpdateBucketRequest,
    ) -> Result<Bucket, Error> {
        self.call_with_account_id(account_auth, "b2_update_bucket", request)
    }

    pub fn delete_bucket(
        &self,
        account_auth: &AccountAuthorization,
        request: &DeleteBucketRequest,
    ) -> Result<Bucket, Error> {
        self.call_with_account_id(account_auth, "b2_delete_bucket", request)
    }
    // endregion: --- bucket

    // region:    --- upload
    pub fn get_upload_url(
        &self,
        account_auth: &AccountAuthorization,
        request: &GetUploadUrlRequest,
    ) -> Result<UploadUrlResponse, Error> {
        self.call(account_auth, "b2_get_upload_url", request)
    }

    pub fn get_upload_part_url(
        &self,
        account_auth: &AccountAuthorization,
        request: &GetUploadPartUrlRequest,
    ) -> Result<UploadPartUrlResponse, Error> {
        self.call(account_auth, "b2_get_upload_part_url", request)
    }

    /// 上传小文件
    ///
    /// listener依次收到`WaitingToStart`、`Starting`、`Transferring`，最后是`Succeeded`或`Failed`。
    /// 401错误会被标记为[`RequestCategory::Uploading`]。
    pub fn upload_file(
        &self,
        upload_url: &UploadUrlResponse,
        request: &UploadFileRequest,
    ) -> Result<FileVersion, Error> {
        let source = request.content_source.as_ref();
        let mut content = ContentDetailsForUpload::new(source)?;
        let content_len = content.content_length();
        let filter = Arc::new(ByteProgressFilter::new(
            request.listener.clone(),
            PartContext::small_file(content_len),
            self.progress_interval,
        ));

        filter.report(UploadState::WaitingToStart, 0);
        filter.report(UploadState::Starting, 0);

        let mut attempt = || -> Result<FileVersion, Error> {
            let mut headers = Headers::new();
            headers
                .set(headers::AUTHORIZATION, upload_url.authorization_token.as_str())
                .set(headers::FILE_NAME, percent_encode(&request.file_name))
                .set(headers::CONTENT_TYPE, request.content_type.as_str())
                .set(headers::CONTENT_SHA1, content.sha1_header_value());
            self.set_common_headers(&mut headers);

            // 来源能提供修改时间时才发送
            let last_mod_millis = source.src_last_modified_millis().map_err(|e| {
                Error::local(
                    "read_failed",
                    format!("failed to get lastModified from source: {e}"),
                )
            })?;
            if let Some(millis) = last_mod_millis {
                headers.set(headers::SRC_LAST_MODIFIED_MILLIS, millis.to_string());
            }

            // TODO 是否应该校验key只包含合法字符，而不是直接percent-encode
            for (k, v) in &request.file_info {
                headers.set(
                    format!("{}{}", headers::FILE_INFO_PREFIX, percent_encode(k)),
                    percent_encode(v),
                );
            }

            let input = ProgressReader::new(content.take_input()?, filter.clone());
            let resp = self.web_api_client.post_data_return_json(
                &upload_url.upload_url,
                &headers,
                Box::new(input),
                content_len,
            )?;
            Ok(serde_json::from_value(resp)?)
        };

        match attempt() {
            Ok(version) => {
                filter.report(UploadState::Succeeded, content_len);
                Ok(version)
            }
            Err(e) => {
                filter.report(UploadState::Failed, filter.bytes_so_far());
                Err(e.with_request_category(RequestCategory::Uploading))
            }
        }
    }

    /// 上传大文件的一个part，设置了listener时和[`Self::upload_file`]一样上报进度
    pub fn upload_part(
        &self,
        upload_part_url: &UploadPartUrlResponse,
        request: &UploadPartRequest,
    ) -> Result<Part, Error> {
        let mut content = ContentDetailsForUpload::new(request.content_source.as_ref())?;
        let content_len = content.content_length();
        let context = PartContext {
            part_index: request.part_number.saturating_sub(1),
            part_count: request.part_count.unwrap_or(request.part_number),
            start_byte: request.start_byte,
            length: content_len,
        };
        let filter = Arc::new(ByteProgressFilter::new(
            request.listener.clone(),
            context,
            self.progress_interval,
        ));

        filter.report(UploadState::WaitingToStart, 0);
        filter.report(UploadState::Starting, 0);

        let mut attempt = || -> Result<Part, Error> {
            let mut headers = Headers::new();
            headers
                .set(
                    headers::AUTHORIZATION,
                    upload_part_url.authorization_token.as_str(),
                )
                .set(headers::PART_NUMBER, request.part_number.to_string())
                .set(headers::CONTENT_SHA1, content.sha1_header_value());
            self.set_common_headers(&mut headers);

            let input = ProgressReader::new(content.take_input()?, filter.clone());
            let resp = self.web_api_client.post_data_return_json(
                &upload_part_url.upload_url,
                &headers,
                Box::new(input),
                content_len,
            )?;
            Ok(serde_json::from_value(resp)?)
        };

        match attempt() {
            Ok(part) => {
                filter.report(UploadState::Succeeded, content_len);
                Ok(part)
            }
            Err(e) => {
                filter.report(UploadState::Failed, filter.bytes_so_far());
                Err(e.with_request_category(RequestCategory::Uploading))
            }
        }
    }
    // endregion: --- upload

    // region:    --- large file
    pub fn start_large_file(
        &self,
        account_auth: &AccountAuthorization,
        request: &StartLargeFileRequest,
    ) -> Result<FileVersion, Error> {
        self.call(account_auth, "b2_start_large_file", request)
    }

    pub fn finish_large_file(
        &self,
        account_auth: &AccountAuthorization,
        request: &FinishLargeFileRequest,
    ) -> Result<FileVersion, Error> {
        self.call(account_auth, "b2_finish_large_file", request)
    }

    pub fn cancel_large_file(
        &self,
        account_auth: &AccountAuthorization,
        request: &CancelLargeFileRequest,
    ) -> Result<CancelLargeFileResponse, Error> {
        self.call(account_auth, "b2_cancel_large_file", request)
    }

    pub fn list_parts(
        &self,
        account_auth: &AccountAuthorization,
        request: &ListPartsRequest,
    ) -> Result<ListPartsResponse, Error> {
        self.call(account_auth, "b2_list_parts", request)
    }

    pub fn list_unfinished_large_files(
        &self,
        account_auth: &AccountAuthorization,
        request: &ListUnfinishedLargeFilesRequest,
    ) -> Result<ListUnfinishedLargeFilesResponse, Error> {
        self.call(account_auth, "b2_list_unfinished_large_files", request)
    }
    // endregion: --- large file

    // region:    --- files
    pub fn list_file_versions(
        &self,
        account_auth: &AccountAuthorization,
        request: &ListFileVersionsRequest,
    ) -> Result<ListFileVersionsResponse, Error> {
        self.call(account_auth, "b2_list_file_versions", request)
    }

    pub fn list_file_names(
        &self,
        account_auth: &AccountAuthorization,
        request: &ListFileNamesRequest,
    ) -> Result<ListFileNamesResponse, Error> {
        self.call(account_auth, "b2_list_file_names", request)
    }

    pub fn delete_file_version(
        &self,
        account_auth: &AccountAuthorization,
        request: &DeleteFileVersionRequest,
    ) -> Result<DeleteFileVersionResponse, Error> {
        self.call(account_auth, "b2_delete_file_version", request)
    }

    pub fn get_file_info(
        &self,
        account_auth: &AccountAuthorization,
        request: &GetFileInfoRequest,
    ) -> Result<FileVersion, Error> {
        self.call(account_auth, "b2_get_file_info", request)
    }

    pub fn hide_file(
        &self,
        account_auth: &AccountAuthorization,
        request: &HideFileRequest,
    ) -> Result<FileVersion, Error> {
        self.call(account_auth, "b2_hide_file", request)
    }
    // endregion: --- files

    // region:    --- download
    pub fn get_download_authorization(
        &self,
        account_auth: &AccountAuthorization,
        request: &GetDownloadAuthorizationRequest,
    ) -> Result<DownloadAuthorization, Error> {
        self.call(account_auth, "b2_get_download_authorization", request)
    }

    /// 不缓冲响应，直接把body流式交给`sink`
    pub fn download_by_id(
        &self,
        account_auth: &AccountAuthorization,
        request: &DownloadByIdRequest,
        sink: &mut dyn ContentSink,
    ) -> Result<(), Error> {
        let url = self.get_download_by_id_url(account_auth, request);
        self.download_guts(account_auth, &url, request.range, sink)
    }

    /// 只生成url不发请求，可以嵌入网页等地方使用
    pub fn get_download_by_id_url(
        &self,
        account_auth: &AccountAuthorization,
        request: &DownloadByIdRequest,
    ) -> String {
        make_download_by_id_url(
            account_auth,
            &request.file_id,
            request.b2_content_disposition.as_deref(),
        )
    }

    pub fn download_by_name(
        &self,
        account_auth: &AccountAuthorization,
        request: &DownloadByNameRequest,
        sink: &mut dyn ContentSink,
    ) -> Result<(), Error> {
        let url = self.get_download_by_name_url(account_auth, request);
        self.download_guts(account_auth, &url, request.range, sink)
    }

    pub fn get_download_by_name_url(
        &self,
        account_auth: &AccountAuthorization,
        request: &DownloadByNameRequest,
    ) -> String {
        make_download_by_name_url(
            account_auth,
            &request.bucket_name,
            &request.file_name,
            request.b2_content_disposition.as_deref(),
        )
    }

    fn download_guts(
        &self,
        account_auth: &AccountAuthorization,
        url: &str,
        range: Option<ByteRange>,
        sink: &mut dyn ContentSink,
    ) -> Result<(), Error> {
        let mut headers = self.make_headers(account_auth);
        if let Some(range) = range {
            headers.set(headers::RANGE, range.to_string());
        }
        self.web_api_client.get_content(url, &headers, sink)
    }
    // endregion: --- download
}
