// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应
//!
//! `Response` 是不可变的值：状态码、MIME 类型、正文字节与附加头部。
//! 缓存中的响应以 `Arc<Response>` 的形式在并发请求之间共享，
//! 内容编码（gzip/br/deflate）与 `Date` 头在写出时按每个请求单独确定，
//! 不会修改缓存中的原始正文。

use crate::param::*;

use brotli::enc::{self, backward_references::BrotliEncoderParams};
use bytes::Bytes;
use chrono::prelude::*;
use flate2::{
    write::{DeflateEncoder, GzEncoder},
    Compression,
};
use log::{debug, error};

use std::io::{self, Write};

#[derive(Debug, Clone)]
pub struct Response {
    status_code: u16,
    information: String,
    content_type: Option<String>,
    content: Bytes,
    headers: Vec<(String, String)>,
}

impl Response {
    /// 以给定状态码构造空响应。未登记的状态码会被记录并降级为 500。
    pub fn with_status(code: u16) -> Self {
        let (status_code, information) = match STATUS_CODES.get(&code) {
            Some(&info) => (code, info.to_string()),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                (500, "Internal Server Error".to_string())
            }
        };
        Self {
            status_code,
            information,
            content_type: None,
            content: Bytes::new(),
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, mime: &str, content: impl Into<Bytes>) -> Self {
        self.content_type = Some(mime.to_string());
        self.content = content.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// 序列化为 HTTP/1.1 报文。
    ///
    /// `accept_encoding` 为客户端声明支持的编码；对已经压缩过的类型（图片、字体）不再压缩。
    /// `headonly` 为真时只写出头部，但 `Content-Length` 仍反映完整正文的长度。
    pub fn to_wire(&self, accept_encoding: &[HttpEncoding], headonly: bool) -> Vec<u8> {
        let mime = self.content_type.as_deref().unwrap_or("");
        let mut encoding = if self.content.is_empty() || should_skip_compression(mime) {
            None
        } else {
            decide_encoding(accept_encoding)
        };
        let body: Vec<u8> = match encoding {
            None => self.content.to_vec(),
            Some(_) => match compress(self.content.to_vec(), encoding) {
                Ok(c) => c,
                Err(e) => {
                    error!("压缩响应内容失败: {}，返回未压缩内容", e);
                    encoding = None;
                    self.content.to_vec()
                }
            },
        };

        let mut header = String::new();
        header.push_str(&format!(
            "HTTP/{} {} {}{}",
            HttpVersion::V1_1,
            self.status_code,
            self.information,
            CRLF
        ));
        if let Some(t) = &self.content_type {
            header.push_str(&["Content-Type: ", t, CRLF].concat());
        }
        if let Some(e) = encoding {
            header.push_str(&format!("Content-encoding: {}{}", e, CRLF));
        }
        header.push_str(&format!("Content-Length: {}{}", body.len(), CRLF));
        // 缓存的响应可能存活很久，Date 取写出时刻
        header.push_str(&["Date: ", &format_date(&Utc::now()), CRLF].concat());
        header.push_str(&["Server: ", SERVER_NAME, CRLF].concat());
        for (name, value) in &self.headers {
            header.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        header.push_str(CRLF);

        match headonly {
            true => header.into_bytes(),
            false => [header.as_bytes(), &body].concat(),
        }
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        self.to_wire(&[], false)
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// 正文按 UTF-8 有损解码，主要供日志与测试使用。
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.content).to_string()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc2822()
}

fn compress(data: Vec<u8>, mode: Option<HttpEncoding>) -> io::Result<Vec<u8>> {
    let original_size = data.len();
    let result = match mode {
        Some(HttpEncoding::Gzip) => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Deflate) => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&data)?;
            encoder.finish()
        }
        Some(HttpEncoding::Br) => {
            let params = BrotliEncoderParams::default();
            let mut output = Vec::new();
            enc::BrotliCompress(&mut io::Cursor::new(data), &mut output, &params)?;
            Ok(output)
        }
        None => Ok(data),
    };

    if let Ok(ref compressed) = result {
        debug!(
            "压缩完成: {:?}, 原始大小: {} bytes, 压缩后: {} bytes",
            mode,
            original_size,
            compressed.len()
        );
    }

    result
}

fn should_skip_compression(mime_type: &str) -> bool {
    let skip_types = [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/x-icon",
        "font/woff",
        "font/woff2",
        "application/vnd.ms-fontobject",
    ];

    skip_types
        .iter()
        .any(|&skip_type| mime_type.starts_with(skip_type))
}

// 优先级：gzip > br > deflate
fn decide_encoding(accept_encoding: &[HttpEncoding]) -> Option<HttpEncoding> {
    if accept_encoding.contains(&HttpEncoding::Gzip) {
        Some(HttpEncoding::Gzip)
    } else if accept_encoding.contains(&HttpEncoding::Br) {
        Some(HttpEncoding::Br)
    } else if accept_encoding.contains(&HttpEncoding::Deflate) {
        Some(HttpEncoding::Deflate)
    } else {
        None
    }
}
