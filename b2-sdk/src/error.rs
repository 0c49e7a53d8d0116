use serde::Deserialize;
use std::fmt;

/// 发生401时请求所属的类别，用来区分"账号凭证失效"和"上传url的token过期"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestCategory {
    #[default]
    Other,
    AccountAuthorization,
    Uploading,
}

impl fmt::Display for RequestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestCategory::Other => "other",
            RequestCategory::AccountAuthorization => "account_authorization",
            RequestCategory::Uploading => "uploading",
        };
        f.write_str(s)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("error: {0}")]
    Common(String),
    #[error("local error ({code}): {message}")]
    Local { code: String, message: String },
    #[error("unauthorized ({category}): {status}, code: {code}, message: {message}")]
    Unauthorized {
        status: u16,
        code: String,
        message: String,
        category: RequestCategory,
    },
    #[error("request api failed: {status}, code: {code}, message: {message}")]
    RequestAPIFailed {
        status: u16,
        code: String,
        message: String,
    },
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
    #[error("helper error: {0}")]
    Helper(#[from] b2_sdk_common::Error),
}

// b2出错时返回的json
#[derive(Deserialize)]
struct ErrorResponse {
    status: Option<u16>,
    code: String,
    message: Option<String>,
}

impl Error {
    /// 根据非2xx的响应构造错误，401会被转为[`Error::Unauthorized`]
    pub fn from_response(status: u16, body: &str) -> Self {
        let (status, code, message) = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(resp) => (
                resp.status.unwrap_or(status),
                resp.code,
                resp.message.unwrap_or_default(),
            ),
            Err(_) => (status, "unknown".to_owned(), body.to_owned()),
        };

        if status == 401 {
            Error::Unauthorized {
                status,
                code,
                message,
                category: RequestCategory::Other,
            }
        } else {
            Error::RequestAPIFailed {
                status,
                code,
                message,
            }
        }
    }

    pub(crate) fn local(code: &str, message: impl Into<String>) -> Self {
        Error::Local {
            code: code.to_owned(),
            message: message.into(),
        }
    }

    /// 只对[`Error::Unauthorized`]生效，其它错误原样返回
    pub fn with_request_category(self, category: RequestCategory) -> Self {
        match self {
            Error::Unauthorized {
                status,
                code,
                message,
                ..
            } => Error::Unauthorized {
                status,
                code,
                message,
                category,
            },
            other => other,
        }
    }

    pub fn request_category(&self) -> Option<RequestCategory> {
        match self {
            Error::Unauthorized { category, .. } => Some(*category),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Unauthorized { status, .. } | Error::RequestAPIFailed { status, .. } => {
                Some(*status)
            }
            Error::Reqwest(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Unauthorized { .. })
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}
