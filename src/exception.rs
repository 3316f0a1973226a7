// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求处理生命周期中可能出现的各类失败情况，分为三层：
//!
//! - [`Exception`]：报文解析阶段的错误，发生在任何处理器介入之前，统一映射为 `400`。
//! - [`WebException`]：处理器可恢复的失败，由分发器一对一地转换为对应状态码的响应。
//! - [`GenerationError`]：页面或 JSON 生成过程中的意外失败，带有完整的 `source()` 链，
//!   最终以 `500` 呈现给调用方。

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::store::{StoreError, StoreState};

/// 报文解析阶段的异常类型。
#[derive(Debug, Copy, Clone, PartialEq, Error)]
pub enum Exception {
    /// 客户端发送的请求字节流无法解析为合法的 UTF-8 字符串。
    #[error("Request bytes can't be parsed in UTF-8")]
    RequestIsNotUtf8,
    /// 请求行缺少方法、路径或版本之一。
    #[error("Malformed request line")]
    MalformedRequestLine,
    /// 客户端使用了服务器暂不支持的 HTTP 方法。
    #[error("Unsupported request method")]
    UnSupportedRequestMethod,
    /// 客户端使用了服务器不支持的 HTTP 协议版本。
    #[error("Unsupported HTTP version")]
    UnsupportedHttpVersion,
}

/// 处理器抛出的可恢复异常，分发器会将其映射为固定的响应。
#[derive(Debug, Error)]
pub enum WebException {
    /// 资源名称、标识符未知，或目标格式不合法。对应 `404`。
    #[error("not found: {0}")]
    NotFound(String),
    /// 显式拒绝访问。对应 `403`。
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// 当前没有任何服务器能提供所请求的全网视图。对应 `404` 的“服务器不存在”变体。
    #[error("no server is serving this view")]
    NoBackingServers,
    /// 无法解析请求的主体身份。对应 `401`。
    #[error(transparent)]
    AuthenticationFailure(AuthFailure),
    /// 生成过程中的意外失败。对应 `500`。
    #[error("internal error: {0}")]
    Internal(#[from] GenerationError),
}

/// 页面生成失败的原因。
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("rendering failed: {0}")]
    Render(String),
    #[error("data store query failed")]
    Store(#[from] StoreError),
    #[error("{0} disappeared from the data store during generation")]
    Vanished(String),
    #[error("I/O error while generating response")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization failed")]
    Json(#[from] serde_json::Error),
    #[error("handler panicked: {0}")]
    Panicked(String),
}

/// 认证失败的具体原因。
///
/// 其 `Display` 文本会直接写入 `WWW-Authenticate` 头的 `realm`，因此不能包含双引号。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// 请求没有携带 `Authorization` 头
    NoUserPresent,
    /// `Authorization` 头无法解码
    MalformedHeader,
    /// 用户不存在
    UserDoesNotExist,
    /// 用户名与密码不匹配
    UserPassMismatch,
    /// 存储未处于 `OPEN` 状态，无法校验密码；分发器会把它转为 503 而不是 401
    DatabaseNotOpen(StoreState),
    /// 校验密码时发生内部错误（通常是认证后端配置错误）
    ErrorWhileCheckingPassword,
}

impl FailReason {
    /// 是否属于内部错误。内部错误会在 401 页面中展示完整的原因链，方便运维排查。
    pub fn is_internal(&self) -> bool {
        matches!(self, FailReason::ErrorWhileCheckingPassword)
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::NoUserPresent => write!(f, "User and Password not specified"),
            FailReason::MalformedHeader => write!(f, "Authorization header could not be decoded"),
            FailReason::UserDoesNotExist => write!(f, "User does not exist"),
            FailReason::UserPassMismatch => write!(f, "User and Password did not match"),
            FailReason::DatabaseNotOpen(state) => write!(f, "Database is {}", state),
            FailReason::ErrorWhileCheckingPassword => {
                write!(f, "Error occurred while checking the password")
            }
        }
    }
}

/// 认证失败：原因以及可选的底层错误。
#[derive(Debug, Clone)]
pub struct AuthFailure {
    reason: FailReason,
    cause: Option<Arc<dyn StdError + Send + Sync>>,
}

impl AuthFailure {
    pub fn new(reason: FailReason) -> Self {
        Self {
            reason,
            cause: None,
        }
    }

    pub fn with_cause(reason: FailReason, cause: impl StdError + Send + Sync + 'static) -> Self {
        Self {
            reason,
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn reason(&self) -> FailReason {
        self.reason
    }

    pub fn cause(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "authentication failed: {}", self.reason)
    }
}

impl StdError for AuthFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

impl From<AuthFailure> for WebException {
    fn from(failure: AuthFailure) -> Self {
        WebException::AuthenticationFailure(failure)
    }
}
