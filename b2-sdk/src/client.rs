//! 面向使用者的客户端
//!
//! [`StorageClient`]持有webifier和账号授权，每个操作都自动带上授权。授权过期后（
//! 错误的[`RequestCategory`](crate::RequestCategory)为`AccountAuthorization`或`Other`
//! 的401）由调用方决定何时调用[`StorageClient::reauthorize`]。

use crate::config::ClientConfig;
use crate::content::ContentSink;
use crate::list::ListIter;
use crate::types_rs::*;
use crate::web_api_client::{ReqwestWebApiClient, WebApiClient};
use crate::webifier::StorageClientWebifier;
use crate::Error;
use std::sync::Arc;
use tracing::info;

pub struct StorageClient {
    webifier: StorageClientWebifier,
    credentials: AuthorizeAccountRequest,
    account_auth: AccountAuthorization,
}

impl StorageClient {
    /// 使用基于reqwest的传输层，创建时立即授权
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let web_api_client = ReqwestWebApiClient::builder()
            .maybe_connect_timeout(config.connect_timeout())
            .maybe_timeout(config.timeout())
            .build()?;
        Self::with_web_api_client(config, Arc::new(web_api_client))
    }

    /// 使用自定义的传输层，创建时立即授权
    pub fn with_web_api_client(
        config: ClientConfig,
        web_api_client: Arc<dyn WebApiClient>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let webifier = StorageClientWebifier::builder()
            .web_api_client(web_api_client)
            .user_agent(config.user_agent)
            .master_url(config.master_url)
            .maybe_test_mode(config.test_mode)
            .build()?;
        let credentials = AuthorizeAccountRequest::builder()
            .account_id(config.account_id)
            .application_key(config.application_key)
            .build();
        let account_auth = authorize(&webifier, &credentials)?;
        Ok(Self {
            webifier,
            credentials,
            account_auth,
        })
    }

    /// 重新获取账号授权，失败时保留原来的授权
    pub fn reauthorize(&mut self) -> Result<(), Error> {
        self.account_auth = authorize(&self.webifier, &self.credentials)?;
        Ok(())
    }

    pub fn account_authorization(&self) -> &AccountAuthorization {
        &self.account_auth
    }

    pub fn account_id(&self) -> &str {
        &self.account_auth.account_id
    }

    pub fn webifier(&self) -> &StorageClientWebifier {
        &self.webifier
    }

    pub fn close(&self) {
        self.webifier.close();
    }
}

fn authorize(
    webifier: &StorageClientWebifier,
    credentials: &AuthorizeAccountRequest,
) -> Result<AccountAuthorization, Error> {
    let auth = webifier.authorize_account(credentials)?;
    info!(
        account_id = %auth.account_id,
        api_url = %auth.api_url,
        "b2 account authorized"
    );
    Ok(auth)
}

impl StorageClient {
    // region:    --- bucket
    pub fn create_bucket(&self, request: &CreateBucketRequest) -> Result<Bucket, Error> {
        self.webifier.create_bucket(&self.account_auth, request)
    }

    pub fn list_buckets(&self, request: &ListBucketsRequest) -> Result<ListBucketsResponse, Error> {
        self.webifier.list_buckets(&self.account_auth, request)
    }

    /// 按名称查找bucket，不存在时返回`None`
    pub fn get_bucket_by_name(&self, bucket_name: &str) -> Result<Option<Bucket>, Error> {
        let request = ListBucketsRequest::builder()
            .bucket_name(bucket_name)
            .build();
        let resp = self.list_buckets(&request)?;
        Ok(resp
            .buckets
            .into_iter()
            .find(|b| b.bucket_name == bucket_name))
    }

    pub fn update_bucket(&self, request: &UpdateBucketRequest) -> Result<Bucket, Error> {
        self.webifier.update_bucket(&self.account_auth, request)
    }

    pub fn delete_bucket(&self, request: &DeleteBucketRequest) -> Result<Bucket, Error> {
        self.webifier.delete_bucket(&self.account_auth, request)
    }
    // endregion: --- bucket

    // region:    --- upload
    pub fn get_upload_url(&self, request: &GetUploadUrlRequest) -> Result<UploadUrlResponse, Error> {
        self.webifier.get_upload_url(&self.account_auth, request)
    }

    pub fn get_upload_part_url(
        &self,
        request: &GetUploadPartUrlRequest,
    ) -> Result<UploadPartUrlResponse, Error> {
        self.webifier.get_upload_part_url(&self.account_auth, request)
    }

    pub fn upload_file(
        &self,
        upload_url: &UploadUrlResponse,
        request: &UploadFileRequest,
    ) -> Result<FileVersion, Error> {
        self.webifier.upload_file(upload_url, request)
    }

    /// 获取一个上传url然后上传；需要上传多个文件时，复用[`Self::get_upload_url`]的结果更高效
    pub fn upload_small_file(
        &self,
        bucket_id: &str,
        request: &UploadFileRequest,
    ) -> Result<FileVersion, Error> {
        let upload_url = self.get_upload_url(&GetUploadUrlRequest::builder().bucket_id(bucket_id).build())?;
        self.upload_file(&upload_url, request)
    }

    pub fn upload_part(
        &self,
        upload_part_url: &UploadPartUrlResponse,
        request: &UploadPartRequest,
    ) -> Result<Part, Error> {
        self.webifier.upload_part(upload_part_url, request)
    }
    // endregion: --- upload

    // region:    --- large file
    pub fn start_large_file(&self, request: &StartLargeFileRequest) -> Result<FileVersion, Error> {
        self.webifier.start_large_file(&self.account_auth, request)
    }

    pub fn finish_large_file(&self, request: &FinishLargeFileRequest) -> Result<FileVersion, Error> {
        self.webifier.finish_large_file(&self.account_auth, request)
    }

    pub fn cancel_large_file(
        &self,
        request: &CancelLargeFileRequest,
    ) -> Result<CancelLargeFileResponse, Error> {
        self.webifier.cancel_large_file(&self.account_auth, request)
    }

    pub fn list_parts(&self, request: &ListPartsRequest) -> Result<ListPartsResponse, Error> {
        self.webifier.list_parts(&self.account_auth, request)
    }

    pub fn list_unfinished_large_files(
        &self,
        request: &ListUnfinishedLargeFilesRequest,
    ) -> Result<ListUnfinishedLargeFilesResponse, Error> {
        self.webifier
            .list_unfinished_large_files(&self.account_auth, request)
    }
    // endregion: --- large file

    // region:    --- files
    pub fn list_file_versions(
        &self,
        request: &ListFileVersionsRequest,
    ) -> Result<ListFileVersionsResponse, Error> {
        self.webifier.list_file_versions(&self.account_auth, request)
    }

    pub fn list_file_names(&self, request: &ListFileNamesRequest) -> Result<ListFileNamesResponse, Error> {
        self.webifier.list_file_names(&self.account_auth, request)
    }

    pub fn delete_file_version(
        &self,
        request: &DeleteFileVersionRequest,
    ) -> Result<DeleteFileVersionResponse, Error> {
        self.webifier.delete_file_version(&self.account_auth, request)
    }

    pub fn get_file_info(&self, request: &GetFileInfoRequest) -> Result<FileVersion, Error> {
        self.webifier.get_file_info(&self.account_auth, request)
    }

    pub fn hide_file(&self, request: &HideFileRequest) -> Result<FileVersion, Error> {
        self.webifier.hide_file(&self.account_auth, request)
    }
    // endregion: --- files

    // region:    --- download
    pub fn get_download_authorization(
        &self,
        request: &GetDownloadAuthorizationRequest,
    ) -> Result<DownloadAuthorization, Error> {
        self.webifier
            .get_download_authorization(&self.account_auth, request)
    }

    pub fn download_by_id(
        &self,
        request: &DownloadByIdRequest,
        sink: &mut dyn ContentSink,
    ) -> Result<(), Error> {
        self.webifier
            .download_by_id(&self.account_auth, request, sink)
    }

    pub fn get_download_by_id_url(&self, request: &DownloadByIdRequest) -> String {
        self.webifier
            .get_download_by_id_url(&self.account_auth, request)
    }

    pub fn download_by_name(
        &self,
        request: &DownloadByNameRequest,
        sink: &mut dyn ContentSink,
    ) -> Result<(), Error> {
        self.webifier
            .download_by_name(&self.account_auth, request, sink)
    }

    pub fn get_download_by_name_url(&self, request: &DownloadByNameRequest) -> String {
        self.webifier
            .get_download_by_name_url(&self.account_auth, request)
    }
    // endregion: --- download

    // region:    --- listing
    /// 惰性遍历所有文件版本，需要时才请求下一页
    pub fn file_versions(&self, request: ListFileVersionsRequest) -> ListIter<'_, ListFileVersionsRequest> {
        ListIter::new(self, request)
    }

    pub fn file_names(&self, request: ListFileNamesRequest) -> ListIter<'_, ListFileNamesRequest> {
        ListIter::new(self, request)
    }

    pub fn unfinished_large_files(
        &self,
        request: ListUnfinishedLargeFilesRequest,
    ) -> ListIter<'_, ListUnfinishedLargeFilesRequest> {
        ListIter::new(self, request)
    }

    pub fn parts(&self, request: ListPartsRequest) -> ListIter<'_, ListPartsRequest> {
        ListIter::new(self, request)
    }
    // endregion: --- listing
}
