//! HTTP传输层
//!
//! webifier只负责拼url、header和body，真正发请求的是[`WebApiClient`]。默认实现基于
//! `reqwest::blocking`，测试时可以换成内存中的实现。

use crate::Error;
use crate::content::ContentSink;
use crate::headers::Headers;
use bon::bon;
use reqwest::blocking::{Body, Client, Response};
use serde_json::Value;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, warn};

pub trait WebApiClient: Send + Sync {
    /// POST json，返回json
    fn post_json_return_json(&self, url: &str, headers: &Headers, request: &Value)
    -> Result<Value, Error>;

    /// POST已知长度的字节流，返回json
    fn post_data_return_json(
        &self,
        url: &str,
        headers: &Headers,
        input: Box<dyn Read + Send>,
        content_length: u64,
    ) -> Result<Value, Error>;

    /// GET，成功时把响应头和body交给`sink`
    fn get_content(&self, url: &str, headers: &Headers, sink: &mut dyn ContentSink)
    -> Result<(), Error>;

    fn close(&self) {}
}

pub struct ReqwestWebApiClient {
    http_client: Client,
}

#[bon]
impl ReqwestWebApiClient {
    /// - `connect_timeout`：建立连接的超时时间
    /// - `timeout`：整个请求的超时时间，不设置则不限制（大文件上传下载可能需要很久）
    #[builder]
    pub fn new(connect_timeout: Option<Duration>, timeout: Option<Duration>) -> Result<Self, Error> {
        let mut builder = Client::builder().timeout(timeout);
        if let Some(d) = connect_timeout {
            builder = builder.connect_timeout(d);
        }
        Ok(Self {
            http_client: builder.build()?,
        })
    }
}

fn check_response(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text()?;
    let e = Error::from_response(status.as_u16(), &body);
    warn!(status = status.as_u16(), error = %e, "b2 request failed");
    Err(e)
}

fn parse_json_response(resp: Response) -> Result<Value, Error> {
    let resp = check_response(resp)?;
    let bytes = resp.bytes()?;
    serde_json::from_slice(&bytes).map_err(|e| {
        Error::Common(format!(
            "parse response json error: {}, response text: {}",
            e,
            String::from_utf8_lossy(&bytes)
        ))
    })
}

impl WebApiClient for ReqwestWebApiClient {
    fn post_json_return_json(
        &self,
        url: &str,
        headers: &Headers,
        request: &Value,
    ) -> Result<Value, Error> {
        debug!(url, "POST json");
        let resp = self
            .http_client
            .post(url)
            .headers(headers.to_header_map()?)
            .json(request)
            .send()?;
        parse_json_response(resp)
    }

    fn post_data_return_json(
        &self,
        url: &str,
        headers: &Headers,
        input: Box<dyn Read + Send>,
        content_length: u64,
    ) -> Result<Value, Error> {
        debug!(url, content_length, "POST data");
        let resp = self
            .http_client
            .post(url)
            .headers(headers.to_header_map()?)
            .body(Body::sized(input, content_length))
            .send()?;
        parse_json_response(resp)
    }

    fn get_content(
        &self,
        url: &str,
        headers: &Headers,
        sink: &mut dyn ContentSink,
    ) -> Result<(), Error> {
        debug!(url, "GET content");
        let resp = self
            .http_client
            .get(url)
            .headers(headers.to_header_map()?)
            .send()?;
        let mut resp = check_response(resp)?;
        let resp_headers = Headers::from_header_map(resp.headers());
        sink.read_content(&resp_headers, &mut resp)
    }
}
