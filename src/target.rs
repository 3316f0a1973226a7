// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求目标
//!
//! 将请求路径拆分为有序的路径段。`/player/Alice/raw?x=1` 会被解析为
//! `["player", "Alice", "raw"]`：查询字符串被丢弃，空段被忽略。
//! 解析完成后目标不可变，处理器只读取它。

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequestTarget {
    segments: Vec<String>,
}

impl RequestTarget {
    pub fn parse(path: &str) -> Self {
        let path = match path.split_once('?') {
            Some((before, _)) => before,
            None => path,
        };
        let path = match path.split_once('#') {
            Some((before, _)) => before,
            None => path,
        };
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(decode_segment)
            .collect();
        Self { segments }
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    pub fn first(&self) -> Option<&str> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// 去掉路由段之后剩余的目标，分发器把它交给匹配到的处理器。
    pub fn tail(&self) -> RequestTarget {
        Self {
            segments: self.segments.iter().skip(1).cloned().collect(),
        }
    }
}

impl fmt::Display for RequestTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

/// 解码 `%XX` 转义。非法转义原样保留，解码结果不是 UTF-8 时退回原始段。
fn decode_segment(segment: &str) -> String {
    if !segment.contains('%') {
        return segment.to_string();
    }
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(high), Some(low)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                decoded.push(high << 4 | low);
                i += 3;
                continue;
            }
        }
        decoded.push(bytes[i]);
        i += 1;
    }
    String::from_utf8(decoded).unwrap_or_else(|_| segment.to_string())
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}
