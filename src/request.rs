// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求处理模块
//!
//! 负责将 TCP 流中读取的原始字节解析为强类型的 `Request` 结构体。它涵盖了：
//! 1. 请求行（Request-Line）的解析（方法、路径、版本）。
//! 2. 管线用到的 HTTP 标头（`User-Agent`、`Accept`、`Authorization`）的提取。
//! 3. 内容协商（Content Negotiation）相关的编码解析。
//! 4. 由路径派生出不可变的 [`RequestTarget`]。

use crate::{exception::Exception, param::*, target::RequestTarget};
use log::error;

/// 表示一个完整的 HTTP 请求元数据。
///
/// 该结构体不包含请求体（Body），只用于路由分发和权限校验。
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP 请求方法（GET, POST 等）
    method: HttpRequestMethod,
    /// 请求的资源路径（包含查询字符串）
    path: String,
    /// HTTP 协议版本
    version: HttpVersion,
    /// 客户端标识字符串
    user_agent: String,
    /// 客户端支持的压缩编码列表（按解析顺序排列）
    accept_encoding: Vec<HttpEncoding>,
    /// 客户端接受的内容类型（MIME）
    accept: Option<String>,
    /// `Authorization` 头的原始值
    authorization: Option<String>,
    /// 由路径解析出的请求目标
    target: RequestTarget,
}

impl Request {
    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 验证编码：确保请求数据是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、路径和协议版本。
    /// 3. 迭代解析标头：识别并解析 `User-Agent`, `Accept`, `Authorization`, `Accept-Encoding`。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据，尾部的 `\0` 填充会被忽略。
    /// * `id` - 连接 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let end = buffer.iter().position(|&b| b == 0).unwrap_or(buffer.len());
        let request_string = match std::str::from_utf8(&buffer[..end]) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut request_lines = request_string.split(CRLF);

        // 1. 解析请求行 (e.g., "GET /player/Alice HTTP/1.1")
        let first_line = request_lines.next().unwrap_or("");
        let first_line_parts: Vec<&str> = first_line.split(' ').collect();

        if first_line_parts.len() < 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, first_line);
            return Err(Exception::MalformedRequestLine);
        }

        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::UnSupportedRequestMethod);
            }
        };

        let version_str = first_line_parts[first_line_parts.len() - 1].to_uppercase();
        let version = match version_str.as_str() {
            "HTTP/1.1" => HttpVersion::V1_1,
            _ => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };

        // 路径中可能包含空格，虽然不规范但通过 join 尝试恢复
        let path = first_line_parts[1..first_line_parts.len() - 1].join(" ");

        // 2. 迭代各行解析 Headers，头部在第一个空行处结束
        let mut user_agent = String::new();
        let mut accept_encoding = vec![];
        let mut accept = None;
        let mut authorization = None;
        for line in request_lines.take_while(|line| !line.is_empty()) {
            let (name, value) = match line.split_once(':') {
                Some((name, value)) => (name.trim().to_lowercase(), value.trim()),
                None => continue,
            };
            match name.as_str() {
                "user-agent" => user_agent = value.to_string(),
                "accept" => accept = Some(value.to_string()),
                "authorization" => authorization = Some(value.to_string()),
                // 只要包含关键词即视为支持
                "accept-encoding" => {
                    if value.contains("gzip") {
                        accept_encoding.push(HttpEncoding::Gzip);
                    }
                    if value.contains("deflate") {
                        accept_encoding.push(HttpEncoding::Deflate);
                    }
                    if value.contains("br") {
                        accept_encoding.push(HttpEncoding::Br);
                    }
                }
                _ => {}
            }
        }

        let target = RequestTarget::parse(&path);
        Ok(Self {
            method,
            path,
            version,
            user_agent,
            accept_encoding,
            accept,
            authorization,
            target,
        })
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    /// 获取请求路径（含查询参数）
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn accept_encoding(&self) -> &[HttpEncoding] {
        &self.accept_encoding
    }

    pub fn accept(&self) -> Option<&str> {
        self.accept.as_deref()
    }

    pub fn authorization(&self) -> Option<&str> {
        self.authorization.as_deref()
    }

    pub fn target(&self) -> &RequestTarget {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 验证常规 GET 请求的解析，包括 Path、Target 和 Headers
    #[test]
    fn test_parse_get_request() {
        let request_str = "GET /player/Alice HTTP/1.1\r\nHost: localhost:8804\r\nUser-Agent: Test-Browser\r\nAccept-Encoding: gzip, deflate, br\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Get);
        assert_eq!(request.path(), "/player/Alice");
        assert_eq!(request.target().segments(), &["player".to_string(), "Alice".to_string()]);
        assert_eq!(request.user_agent(), "Test-Browser");
        assert!(request.accept_encoding().contains(&HttpEncoding::Gzip));
        assert!(request.accept_encoding().contains(&HttpEncoding::Deflate));
        assert!(request.accept_encoding().contains(&HttpEncoding::Br));
    }

    /// 验证 `Authorization` 头被原样保留
    #[test]
    fn test_parse_authorization() {
        let request_str =
            "GET /network HTTP/1.1\r\nAuthorization: Basic YWxpY2U6c2VjcmV0\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.authorization(), Some("Basic YWxpY2U6c2VjcmV0"));
    }

    /// 读缓冲区尾部的零填充不影响解析
    #[test]
    fn test_zero_padded_buffer() {
        let mut buffer = b"HEAD /players HTTP/1.1\r\nHost: x\r\n\r\n".to_vec();
        buffer.resize(1024, 0);

        let request = Request::try_from(&buffer, 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Head);
        assert_eq!(request.target().first(), Some("players"));
    }

    /// 确保不支持的 HTTP 方法（如 DELETE）会返回错误
    #[test]
    fn test_unsupported_method() {
        let request_str = "DELETE /resource HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert_eq!(result.unwrap_err(), Exception::UnSupportedRequestMethod);
    }

    /// 确保不支持的版本（如 HTTP/2.0）被正确拒绝
    #[test]
    fn test_unsupported_http_version() {
        let request_str = "GET / HTTP/2.0\r\nHost: localhost\r\n\r\n";
        let result = Request::try_from(request_str.as_bytes(), 0);
        assert_eq!(result.unwrap_err(), Exception::UnsupportedHttpVersion);
    }

    #[test]
    fn test_malformed_request_line() {
        let result = Request::try_from(b"GET\r\n\r\n", 0);
        assert_eq!(result.unwrap_err(), Exception::MalformedRequestLine);
    }

    /// 验证 UTF-8 编码检查
    #[test]
    fn test_invalid_utf8() {
        let buffer = vec![0xFF, 0xFE, 0xFD];
        let result = Request::try_from(&buffer, 0);
        assert_eq!(result.unwrap_err(), Exception::RequestIsNotUtf8);
    }

    /// 验证 Header 字段名是否大小写不敏感
    #[test]
    fn test_case_insensitive_headers() {
        let request_str = "GET / HTTP/1.1\r\nhost: localhost\r\nuser-agent: Test\r\naccept-encoding: gzip\r\naccept: application/json\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.user_agent(), "Test");
        assert_eq!(request.accept(), Some("application/json"));
        assert!(request.accept_encoding().contains(&HttpEncoding::Gzip));
    }

    /// 请求体中的冒号不会被误认为头部
    #[test]
    fn test_body_not_parsed_as_headers() {
        let request_str =
            "POST /submit HTTP/1.1\r\nContent-Length: 22\r\n\r\nAuthorization: fake-one";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.method(), HttpRequestMethod::Post);
        assert_eq!(request.authorization(), None);
    }

    /// 确保带查询参数的路径能完整提取，而目标中不含查询参数
    #[test]
    fn test_path_with_query_string() {
        let request_str = "GET /players?sort=name HTTP/1.1\r\nHost: localhost\r\n\r\n";

        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();

        assert_eq!(request.path(), "/players?sort=name");
        assert_eq!(request.target().len(), 1);
    }

    /// 验证请求方法的小写兼容性处理
    #[test]
    fn test_lowercase_method() {
        let request_str = "get / HTTP/1.1\r\nHost: localhost\r\n\r\n";
        let request = Request::try_from(request_str.as_bytes(), 0).unwrap();
        assert_eq!(request.method(), HttpRequestMethod::Get);
    }
}
