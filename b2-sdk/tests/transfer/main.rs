use b2_sdk::content::{ContentSink, FileContentSource, FileSink, MemorySink};
use b2_sdk::headers::{self, Headers};
use b2_sdk::progress::{UploadProgress, UploadState};
use b2_sdk::types_rs::*;
use b2_sdk::web_api_client::WebApiClient;
use b2_sdk::{ClientConfig, Error, RequestCategory, StorageClient};
use serde_json::{Value, json};
use std::io::Read;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const HELLO_SHA1: &str = "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed";

/// 内存中的b2：保存上传的内容，下载时返回
#[derive(Default)]
struct InMemoryB2 {
    stored: Mutex<Option<(Headers, Vec<u8>)>>,
    download_urls: Mutex<Vec<(String, Headers)>>,
    reject_uploads: bool,
}

impl WebApiClient for InMemoryB2 {
    fn post_json_return_json(
        &self,
        url: &str,
        _headers: &Headers,
        request: &Value,
    ) -> Result<Value, Error> {
        match url.rsplit('/').next().unwrap() {
            "b2_authorize_account" => Ok(json!({
                "accountId": "acct",
                "authorizationToken": "token",
                "apiUrl": "https://api.example.com",
                "downloadUrl": "https://f001.example.com",
                "recommendedPartSize": 100000000,
                "absoluteMinimumPartSize": 5000000
            })),
            "b2_get_upload_url" => Ok(json!({
                "bucketId": request["bucketId"],
                "uploadUrl": "https://pod.example.com/b2api/v1/b2_upload_file/x",
                "authorizationToken": "upload-token"
            })),
            other => panic!("unexpected api {other}"),
        }
    }

    fn post_data_return_json(
        &self,
        _url: &str,
        headers: &Headers,
        mut input: Box<dyn Read + Send>,
        content_length: u64,
    ) -> Result<Value, Error> {
        let mut body = Vec::new();
        input.read_to_end(&mut body)?;
        assert_eq!(body.len() as u64, content_length);
        if self.reject_uploads {
            return Err(Error::from_response(
                401,
                r#"{"status":401,"code":"expired_auth_token","message":"upload token expired"}"#,
            ));
        }

        let sha1 = match headers.content_sha1() {
            Some(headers::HEX_DIGITS_AT_END) => {
                let n = body.len() - 40;
                String::from_utf8(body.split_off(n)).unwrap()
            }
            Some(sha1) => sha1.to_owned(),
            None => panic!("missing sha1"),
        };
        let file_name = headers.file_name()?.unwrap();
        let mut stored_headers = Headers::new();
        stored_headers
            .set(headers::CONTENT_SHA1, sha1.as_str())
            .set(headers::CONTENT_LENGTH, body.len().to_string())
            .set(headers::FILE_NAME, headers.get(headers::FILE_NAME).unwrap());
        for (k, v) in headers.iter() {
            if k.to_ascii_lowercase().starts_with("x-bz-info-") {
                stored_headers.set(k, v);
            }
        }
        let resp = json!({
            "fileId": "4_zfile",
            "fileName": file_name,
            "contentLength": body.len(),
            "contentType": headers.content_type(),
            "contentSha1": sha1,
            "fileInfo": headers.file_infos()?,
            "action": "upload",
            "uploadTimestamp": 1533777892000i64
        });
        *self.stored.lock().unwrap() = Some((stored_headers, body));
        Ok(resp)
    }

    fn get_content(
        &self,
        url: &str,
        headers: &Headers,
        sink: &mut dyn ContentSink,
    ) -> Result<(), Error> {
        self.download_urls
            .lock()
            .unwrap()
            .push((url.to_owned(), headers.clone()));
        let stored = self.stored.lock().unwrap();
        let (resp_headers, body) = stored.as_ref().unwrap();
        sink.read_content(resp_headers, &mut body.as_slice())
    }
}

fn storage_client(b2: Arc<InMemoryB2>) -> StorageClient {
    let config = ClientConfig::builder()
        .account_id("acct")
        .application_key("key")
        .build()
        .unwrap();
    StorageClient::with_web_api_client(config, b2).unwrap()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("b2-sdk-transfer-{}-{name}", std::process::id()))
}

#[test]
fn upload_file_without_sha1_then_download_and_verify() {
    let b2 = Arc::new(InMemoryB2::default());
    let client = storage_client(b2.clone());

    let src = temp_path("src.txt");
    std::fs::write(&src, b"hello world").unwrap();
    let events: Arc<Mutex<Vec<UploadProgress>>> = Arc::default();
    let recorder = events.clone();

    let request = UploadFileRequest::builder()
        .file_name("docs/hello world.txt")
        .content_type("text/plain")
        .content_source(Arc::new(FileContentSource::new(&src)))
        .file_info([("author".to_owned(), "J\u{f6}rg".to_owned())].into())
        .listener(Arc::new(move |p: &UploadProgress| {
            recorder.lock().unwrap().push(*p)
        }))
        .build();
    let version = client.upload_small_file("bucket-1", &request).unwrap();
    assert_eq!(version.file_name, "docs/hello world.txt");
    assert_eq!(version.content_sha1.as_deref(), Some(HELLO_SHA1));
    assert_eq!(version.content_length, 11);
    assert_eq!(
        version.file_info.get("author").map(String::as_str),
        Some("J\u{f6}rg")
    );
    assert!(version.file_info.contains_key("src_last_modified_millis"));

    {
        let events = events.lock().unwrap();
        assert_eq!(events[0].state, UploadState::WaitingToStart);
        assert_eq!(events[1].state, UploadState::Starting);
        let last = events.last().unwrap();
        assert_eq!(last.state, UploadState::Succeeded);
        // hex_digits_at_end的40个字节也计入长度
        assert_eq!(last.length, 51);
        assert_eq!(events.iter().filter(|p| p.is_terminal()).count(), 1);
    }

    let dst = temp_path("dst.txt");
    let mut sink = FileSink::new(&dst).verify_sha1(true);
    client
        .download_by_name(
            &DownloadByNameRequest::builder()
                .bucket_name("my-bucket")
                .file_name("docs/hello world.txt")
                .build(),
            &mut sink,
        )
        .unwrap();
    assert_eq!(std::fs::read(&dst).unwrap(), b"hello world");

    let (url, headers) = b2.download_urls.lock().unwrap()[0].clone();
    assert_eq!(url, "https://f001.example.com/file/my-bucket/docs/hello%20world.txt");
    assert_eq!(headers.get("Authorization"), Some("token"));

    std::fs::remove_file(&src).unwrap();
    std::fs::remove_file(&dst).unwrap();
}

#[test]
fn download_by_id_with_range_into_memory() {
    let b2 = Arc::new(InMemoryB2::default());
    let client = storage_client(b2.clone());
    let request = UploadFileRequest::builder()
        .file_name("a.txt")
        .content_source(Arc::new(b2_sdk::content::BytesContentSource::new("hello world")))
        .build();
    client.upload_small_file("bucket-1", &request).unwrap();

    let download = DownloadByIdRequest::builder()
        .file_id("4_zfile")
        .range(ByteRange::starting_at(6))
        .b2_content_disposition("attachment")
        .build();
    assert_eq!(
        client.get_download_by_id_url(&download),
        "https://f001.example.com/b2api/v1/b2_download_file_by_id?fileId=4_zfile&b2ContentDisposition=attachment"
    );

    let mut sink = MemorySink::new();
    client.download_by_id(&download, &mut sink).unwrap();
    assert_eq!(sink.bytes(), b"hello world");
    assert_eq!(sink.headers().unwrap().content_sha1(), Some(HELLO_SHA1));

    let (_, headers) = b2.download_urls.lock().unwrap()[0].clone();
    assert_eq!(headers.get("Range"), Some("bytes=6-"));
}

#[test]
fn rejected_upload_is_tagged_uploading_and_reports_failure() {
    let b2 = Arc::new(InMemoryB2 {
        reject_uploads: true,
        ..Default::default()
    });
    let client = storage_client(b2);
    let events: Arc<Mutex<Vec<UploadProgress>>> = Arc::default();
    let recorder = events.clone();

    let request = UploadFileRequest::builder()
        .file_name("a.txt")
        .content_source(Arc::new(b2_sdk::content::BytesContentSource::new("hello world")))
        .listener(Arc::new(move |p: &UploadProgress| {
            recorder.lock().unwrap().push(*p)
        }))
        .build();
    let err = client.upload_small_file("bucket-1", &request).unwrap_err();
    assert!(err.is_unauthorized());
    assert_eq!(err.request_category(), Some(RequestCategory::Uploading));

    let events = events.lock().unwrap();
    let last = events.last().unwrap();
    assert_eq!(last.state, UploadState::Failed);
    assert_eq!(last.bytes_so_far, 11);
    assert!(events.iter().all(|p| p.state != UploadState::Succeeded));
}
