use b2_sdk::content::{BytesContentSource, MemorySink};
use b2_sdk::types_rs::*;
use b2_sdk::{ClientConfig, StorageClient};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Deserialize, Debug)]
pub struct B2Config {
    pub bucket_name: String,
    #[serde(flatten)]
    pub client: ClientConfig,
}

impl B2Config {
    pub fn get_conf() -> Self {
        let file_str = std::fs::read_to_string("tests/b2/config.toml").unwrap();
        toml::from_str(&file_str).unwrap()
    }
}

fn get_client() -> (StorageClient, String) {
    let conf = B2Config::get_conf();
    (StorageClient::new(conf.client).unwrap(), conf.bucket_name)
}

fn get_or_create_bucket(client: &StorageClient, bucket_name: &str) -> Bucket {
    match client.get_bucket_by_name(bucket_name).unwrap() {
        Some(b) => b,
        None => client
            .create_bucket(
                &CreateBucketRequest::builder()
                    .bucket_name(bucket_name)
                    .bucket_type(BucketTypes::ALL_PRIVATE)
                    .build(),
            )
            .unwrap(),
    }
}

#[test]
#[ignore]
fn list_buckets_test() {
    let (client, _) = get_client();
    let res = client.list_buckets(&ListBucketsRequest::default());
    match res {
        Ok(s) => println!("res:\n{:#?}", s),
        Err(e) => println!("{}", e),
    }
}

#[test]
#[ignore]
fn upload_list_download_delete_test() {
    let (client, bucket_name) = get_client();
    let bucket = get_or_create_bucket(&client, &bucket_name);

    let request = UploadFileRequest::builder()
        .file_name("b2-sdk-test/hello world.txt")
        .content_type("text/plain")
        .content_source(Arc::new(BytesContentSource::new("hello world")))
        .file_info([("author".to_owned(), "b2-sdk".to_owned())].into())
        .build();
    let version = client
        .upload_small_file(&bucket.bucket_id, &request)
        .unwrap();
    println!("uploaded:\n{:#?}", version);

    let listed: Vec<FileVersion> = client
        .file_versions(
            ListFileVersionsRequest::builder()
                .bucket_id(&bucket.bucket_id)
                .prefix("b2-sdk-test/")
                .max_file_count(1)
                .build(),
        )
        .collect::<Result<_, _>>()
        .unwrap();
    assert!(listed.iter().any(|f| f.file_id == version.file_id));

    let mut sink = MemorySink::new();
    client
        .download_by_name(
            &DownloadByNameRequest::builder()
                .bucket_name(&bucket.bucket_name)
                .file_name(&version.file_name)
                .range(ByteRange::between(0, 4))
                .build(),
            &mut sink,
        )
        .unwrap();
    assert_eq!(sink.bytes(), b"hello");

    for f in listed {
        if let Some(file_id) = f.file_id {
            client
                .delete_file_version(
                    &DeleteFileVersionRequest::builder()
                        .file_name(f.file_name)
                        .file_id(file_id)
                        .build(),
                )
                .unwrap();
        }
    }
}

#[test]
#[ignore]
fn large_file_test() {
    let (client, bucket_name) = get_client();
    let bucket = get_or_create_bucket(&client, &bucket_name);
    let min_part = client.account_authorization().absolute_minimum_part_size as usize;

    let started = client
        .start_large_file(
            &StartLargeFileRequest::builder()
                .bucket_id(&bucket.bucket_id)
                .file_name("b2-sdk-test/large.bin")
                .build(),
        )
        .unwrap();
    let file_id = started.file_id.unwrap();

    let part_url = client
        .get_upload_part_url(&GetUploadPartUrlRequest::builder().file_id(&file_id).build())
        .unwrap();
    let mut sha1s = Vec::new();
    for (i, data) in [vec![b'a'; min_part], vec![b'b'; 10]].into_iter().enumerate() {
        let part = client
            .upload_part(
                &part_url,
                &UploadPartRequest::builder()
                    .part_number(i as u32 + 1)
                    .part_count(2)
                    .content_source(Arc::new(BytesContentSource::new(data)))
                    .build(),
            )
            .unwrap();
        sha1s.push(part.content_sha1);
    }

    let parts: Vec<Part> = client
        .parts(ListPartsRequest::builder().file_id(&file_id).max_part_count(1).build())
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(parts.len(), 2);

    let unfinished = client
        .unfinished_large_files(
            ListUnfinishedLargeFilesRequest::builder()
                .bucket_id(&bucket.bucket_id)
                .build(),
        )
        .filter_map(Result::ok)
        .any(|f| f.file_id.as_deref() == Some(file_id.as_str()));
    assert!(unfinished);

    let finished = client
        .finish_large_file(
            &FinishLargeFileRequest::builder()
                .file_id(&file_id)
                .part_sha1_array(sha1s)
                .build(),
        )
        .unwrap();
    println!("finished:\n{:#?}", finished);

    client
        .delete_file_version(
            &DeleteFileVersionRequest::builder()
                .file_name(finished.file_name)
                .file_id(file_id)
                .build(),
        )
        .unwrap();
}
