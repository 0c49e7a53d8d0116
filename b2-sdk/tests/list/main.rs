use b2_sdk::content::ContentSink;
use b2_sdk::headers::Headers;
use b2_sdk::types_rs::*;
use b2_sdk::web_api_client::WebApiClient;
use b2_sdk::{ClientConfig, Error, StorageClient};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::sync::{Arc, Mutex};

/// 按api名称返回预设的响应，记录每个请求的body
#[derive(Default)]
struct ScriptedClient {
    responses: Mutex<HashMap<String, VecDeque<Result<Value, Error>>>>,
    requests: Mutex<Vec<(String, Value)>>,
}

impl ScriptedClient {
    fn new() -> Self {
        let client = Self::default();
        client.push(
            "b2_authorize_account",
            Ok(json!({
                "accountId": "acct",
                "authorizationToken": "token",
                "apiUrl": "https://api.example.com",
                "downloadUrl": "https://f001.example.com",
                "recommendedPartSize": 100000000,
                "absoluteMinimumPartSize": 5000000
            })),
        );
        client
    }

    fn push(&self, api: &str, resp: Result<Value, Error>) {
        self.responses
            .lock()
            .unwrap()
            .entry(api.to_owned())
            .or_default()
            .push_back(resp);
    }

    fn bodies(&self, api: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == api)
            .map(|(_, body)| body.clone())
            .collect()
    }

    fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl WebApiClient for ScriptedClient {
    fn post_json_return_json(
        &self,
        url: &str,
        _headers: &Headers,
        request: &Value,
    ) -> Result<Value, Error> {
        let api = url.rsplit('/').next().unwrap().to_owned();
        self.requests
            .lock()
            .unwrap()
            .push((api.clone(), request.clone()));
        self.responses
            .lock()
            .unwrap()
            .get_mut(&api)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| panic!("no scripted response for {api}"))
    }

    fn post_data_return_json(
        &self,
        _url: &str,
        _headers: &Headers,
        _input: Box<dyn Read + Send>,
        _content_length: u64,
    ) -> Result<Value, Error> {
        unimplemented!()
    }

    fn get_content(
        &self,
        _url: &str,
        _headers: &Headers,
        _sink: &mut dyn ContentSink,
    ) -> Result<(), Error> {
        unimplemented!()
    }
}

fn storage_client(scripted: Arc<ScriptedClient>) -> StorageClient {
    let config = ClientConfig::builder()
        .account_id("acct")
        .application_key("key")
        .build()
        .unwrap();
    StorageClient::with_web_api_client(config, scripted).unwrap()
}

fn file(name: &str, id: &str) -> Value {
    json!({
        "fileId": id,
        "fileName": name,
        "contentLength": 1,
        "contentType": "text/plain",
        "contentSha1": "356a192b7913b04c54574d18c28d46e6395428ab",
        "fileInfo": {},
        "action": "upload",
        "uploadTimestamp": 1533777892000i64
    })
}

fn names(files: Vec<FileVersion>) -> Vec<String> {
    files.into_iter().map(|f| f.file_name).collect()
}

#[test]
fn file_versions_concatenates_pages_and_carries_cursor() {
    let scripted = Arc::new(ScriptedClient::new());
    scripted.push(
        "b2_list_file_versions",
        Ok(json!({
            "files": [file("a.txt", "id-a"), file("b.txt", "id-b")],
            "nextFileName": "c.txt",
            "nextFileId": "id-c"
        })),
    );
    scripted.push(
        "b2_list_file_versions",
        Ok(json!({
            "files": [file("c.txt", "id-c")],
            "nextFileName": null,
            "nextFileId": null
        })),
    );
    let client = storage_client(scripted.clone());

    let request = ListFileVersionsRequest::builder()
        .bucket_id("bucket-1")
        .prefix("")
        .max_file_count(2)
        .build();
    let files: Vec<FileVersion> = client
        .file_versions(request)
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(names(files), ["a.txt", "b.txt", "c.txt"]);

    let bodies = scripted.bodies("b2_list_file_versions");
    assert_eq!(
        bodies,
        vec![
            json!({"bucketId": "bucket-1", "prefix": "", "maxFileCount": 2}),
            json!({
                "bucketId": "bucket-1",
                "prefix": "",
                "maxFileCount": 2,
                "startFileName": "c.txt",
                "startFileId": "id-c"
            }),
        ]
    );
}

#[test]
fn listing_is_lazy() {
    let scripted = Arc::new(ScriptedClient::new());
    scripted.push(
        "b2_list_file_names",
        Ok(json!({"files": [file("a.txt", "id-a")], "nextFileName": "b.txt"})),
    );
    let client = storage_client(scripted.clone());
    let after_auth = scripted.call_count();

    let mut iter = client.file_names(ListFileNamesRequest::builder().bucket_id("bucket-1").build());
    assert_eq!(scripted.call_count(), after_auth);

    assert_eq!(iter.next().unwrap().unwrap().file_name, "a.txt");
    assert_eq!(scripted.call_count(), after_auth + 1);
}

#[test]
fn empty_page_with_cursor_keeps_paging() {
    let scripted = Arc::new(ScriptedClient::new());
    scripted.push(
        "b2_list_file_names",
        Ok(json!({"files": [], "nextFileName": "m.txt"})),
    );
    scripted.push(
        "b2_list_file_names",
        Ok(json!({"files": [file("m.txt", "id-m")]})),
    );
    let client = storage_client(scripted.clone());

    let files: Vec<_> = client
        .file_names(ListFileNamesRequest::builder().bucket_id("bucket-1").build())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(names(files), ["m.txt"]);
    assert_eq!(
        scripted.bodies("b2_list_file_names")[1],
        json!({"bucketId": "bucket-1", "startFileName": "m.txt"})
    );
}

#[test]
fn done_makes_no_more_calls() {
    let scripted = Arc::new(ScriptedClient::new());
    scripted.push(
        "b2_list_unfinished_large_files",
        Ok(json!({"files": [file("big.bin", "id-big")], "nextFileId": null})),
    );
    let client = storage_client(scripted.clone());

    let mut iter = client.unfinished_large_files(
        ListUnfinishedLargeFilesRequest::builder()
            .bucket_id("bucket-1")
            .build(),
    );
    assert!(iter.next().unwrap().is_ok());
    let calls = scripted.call_count();
    assert!(iter.next().is_none());
    assert!(iter.next().is_none());
    assert_eq!(scripted.call_count(), calls);
}

#[test]
fn error_is_yielded_once_then_iterator_is_finished() {
    let scripted = Arc::new(ScriptedClient::new());
    scripted.push(
        "b2_list_parts",
        Ok(json!({
            "parts": [{
                "fileId": "f1",
                "partNumber": 1,
                "contentLength": 5000000,
                "contentSha1": "356a192b7913b04c54574d18c28d46e6395428ab",
                "uploadTimestamp": 1533777892000i64
            }],
            "nextPartNumber": 2
        })),
    );
    scripted.push(
        "b2_list_parts",
        Err(Error::from_response(
            503,
            r#"{"status":503,"code":"service_unavailable","message":"busy"}"#,
        )),
    );
    let client = storage_client(scripted.clone());

    let mut iter = client.parts(ListPartsRequest::builder().file_id("f1").build());
    assert_eq!(iter.next().unwrap().unwrap().part_number, 1);
    let err = iter.next().unwrap().unwrap_err();
    assert_eq!(err.status(), Some(503));
    let calls = scripted.call_count();
    assert!(iter.next().is_none());
    assert_eq!(scripted.call_count(), calls);

    assert_eq!(
        scripted.bodies("b2_list_parts")[1],
        json!({"fileId": "f1", "startPartNumber": 2})
    );
}

#[test]
fn independent_iterators_over_same_request() {
    let scripted = Arc::new(ScriptedClient::new());
    for _ in 0..2 {
        scripted.push(
            "b2_list_file_names",
            Ok(json!({"files": [file("a.txt", "id-a")], "nextFileName": "b.txt"})),
        );
    }
    for _ in 0..2 {
        scripted.push(
            "b2_list_file_names",
            Ok(json!({"files": [file("b.txt", "id-b")]})),
        );
    }
    let client = storage_client(scripted.clone());
    let request = ListFileNamesRequest::builder().bucket_id("bucket-1").build();

    let mut first = client.file_names(request.clone());
    let mut second = client.file_names(request);
    assert_eq!(first.next().unwrap().unwrap().file_name, "a.txt");
    assert_eq!(second.next().unwrap().unwrap().file_name, "a.txt");
    assert_eq!(first.next().unwrap().unwrap().file_name, "b.txt");
    assert_eq!(second.next().unwrap().unwrap().file_name, "b.txt");
    assert!(first.next().is_none());
    assert!(second.next().is_none());
}
