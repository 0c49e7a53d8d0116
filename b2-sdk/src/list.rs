//! 分页列表
//!
//! b2的list接口每次最多返回一页，响应中带有下一页的游标。[`ListIter`]把分页隐藏起来，
//! 调用方只看到一个逐项返回结果的迭代器：
//!
//! - 第一次`next`时用原始请求取第一页
//! - 当前页耗尽且有游标时，用游标替换请求中的起始字段，取下一页
//! - 游标缺失即结束，之后不再发请求
//! - 取页出错时返回该错误，之后迭代器只返回`None`

use crate::Error;
use crate::client::StorageClient;
use crate::types_rs::*;
use std::iter::FusedIterator;
use std::vec;
use tracing::debug;

/// 一页列表结果：当前页的条目和下一页的游标
pub trait ListResponse {
    type Item;
    type Cursor;

    /// 游标为`None`表示没有下一页
    fn into_page(self) -> (Vec<Self::Item>, Option<Self::Cursor>);
}

/// 可以分页的list请求
pub trait ListRequest: Clone {
    type Response: ListResponse;

    const API_NAME: &'static str;

    fn fetch(&self, client: &StorageClient) -> Result<Self::Response, Error>;

    /// 返回一个新请求，起始字段被`cursor`替换，其它字段不变
    fn with_cursor(&self, cursor: ListCursor<Self>) -> Self;
}

pub type ListItem<R> = <<R as ListRequest>::Response as ListResponse>::Item;
pub type ListCursor<R> = <<R as ListRequest>::Response as ListResponse>::Cursor;

enum State<R: ListRequest> {
    Start,
    Page {
        items: vec::IntoIter<ListItem<R>>,
        next: Option<ListCursor<R>>,
    },
    Done,
}

/// 惰性的分页迭代器，只能向前，单个迭代器不在线程间共享
///
/// 多个迭代器可以同时遍历同一个请求，各自保存自己的游标。
pub struct ListIter<'c, R: ListRequest> {
    client: &'c StorageClient,
    template: R,
    state: State<R>,
}

impl<'c, R: ListRequest> ListIter<'c, R> {
    pub fn new(client: &'c StorageClient, request: R) -> Self {
        Self {
            client,
            template: request,
            state: State::Start,
        }
    }

    fn fetch(&mut self, request: &R) -> Option<Result<ListItem<R>, Error>> {
        debug!(api = R::API_NAME, "fetching list page");
        match request.fetch(self.client) {
            Ok(resp) => {
                let (items, next) = resp.into_page();
                self.state = State::Page {
                    items: items.into_iter(),
                    next,
                };
                None
            }
            Err(e) => {
                self.state = State::Done;
                Some(Err(e))
            }
        }
    }
}

impl<R: ListRequest> Iterator for ListIter<'_, R> {
    type Item = Result<ListItem<R>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Start => {
                    let request = self.template.clone();
                    if let Some(err) = self.fetch(&request) {
                        return Some(err);
                    }
                }
                State::Page { mut items, next } => {
                    if let Some(item) = items.next() {
                        self.state = State::Page { items, next };
                        return Some(Ok(item));
                    }
                    // 当前页已耗尽，即使是空页，只要有游标就继续
                    let cursor = next?;
                    let request = self.template.with_cursor(cursor);
                    if let Some(err) = self.fetch(&request) {
                        return Some(err);
                    }
                }
                State::Done => return None,
            }
        }
    }
}

impl<R: ListRequest> FusedIterator for ListIter<'_, R> {}

// region:    --- file versions
/// (nextFileName, nextFileId)
impl ListResponse for ListFileVersionsResponse {
    type Item = FileVersion;
    type Cursor = (Option<String>, Option<String>);

    fn into_page(self) -> (Vec<FileVersion>, Option<Self::Cursor>) {
        let cursor = match (self.next_file_name, self.next_file_id) {
            (None, None) => None,
            cursor => Some(cursor),
        };
        (self.files, cursor)
    }
}

impl ListRequest for ListFileVersionsRequest {
    type Response = ListFileVersionsResponse;

    const API_NAME: &'static str = "b2_list_file_versions";

    fn fetch(&self, client: &StorageClient) -> Result<Self::Response, Error> {
        client.list_file_versions(self)
    }

    fn with_cursor(&self, (name, id): ListCursor<Self>) -> Self {
        self.with_start(name, id)
    }
}
// endregion: --- file versions

// region:    --- file names
impl ListResponse for ListFileNamesResponse {
    type Item = FileVersion;
    type Cursor = String;

    fn into_page(self) -> (Vec<FileVersion>, Option<String>) {
        (self.files, self.next_file_name)
    }
}

impl ListRequest for ListFileNamesRequest {
    type Response = ListFileNamesResponse;

    const API_NAME: &'static str = "b2_list_file_names";

    fn fetch(&self, client: &StorageClient) -> Result<Self::Response, Error> {
        client.list_file_names(self)
    }

    fn with_cursor(&self, cursor: String) -> Self {
        self.with_start_file_name(Some(cursor))
    }
}
// endregion: --- file names

// region:    --- unfinished large files
impl ListResponse for ListUnfinishedLargeFilesResponse {
    type Item = FileVersion;
    type Cursor = String;

    fn into_page(self) -> (Vec<FileVersion>, Option<String>) {
        (self.files, self.next_file_id)
    }
}

impl ListRequest for ListUnfinishedLargeFilesRequest {
    type Response = ListUnfinishedLargeFilesResponse;

    const API_NAME: &'static str = "b2_list_unfinished_large_files";

    fn fetch(&self, client: &StorageClient) -> Result<Self::Response, Error> {
        client.list_unfinished_large_files(self)
    }

    fn with_cursor(&self, cursor: String) -> Self {
        self.with_start_file_id(Some(cursor))
    }
}
// endregion: --- unfinished large files

// region:    --- parts
impl ListResponse for ListPartsResponse {
    type Item = Part;
    type Cursor = u32;

    fn into_page(self) -> (Vec<Part>, Option<u32>) {
        (self.parts, self.next_part_number)
    }
}

impl ListRequest for ListPartsRequest {
    type Response = ListPartsResponse;

    const API_NAME: &'static str = "b2_list_parts";

    fn fetch(&self, client: &StorageClient) -> Result<Self::Response, Error> {
        client.list_parts(self)
    }

    fn with_cursor(&self, cursor: u32) -> Self {
        self.with_start_part_number(Some(cursor))
    }
}
// endregion: --- parts
