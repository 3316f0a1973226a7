// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::param::STATUS_CODES;

pub struct HtmlBuilder {
    title: String,
    css: String,
    body: String,
}

const BASE_CSS: &str = r"
            body {
                width: 48em;
                margin: 0 auto;
                font-family: Tahoma, Verdana, Arial, sans-serif;
            }
            table {
                border-collapse: collapse;
                width: 100%;
            }
            td, th {
                padding: 8px;
                text-align: left;
            }
            ";

impl HtmlBuilder {
    pub fn new(title: &str, body: String) -> Self {
        Self {
            title: escape_html(title),
            css: BASE_CSS.to_string(),
            body,
        }
    }

    // note 作为 HTML 片段直接插入，调用方负责转义其中的用户输入
    pub fn from_status_code(code: u16, note: Option<&str>) -> Self {
        let reason = STATUS_CODES.get(&code).copied().unwrap_or("Unknown Status");
        let description = note.unwrap_or(reason);
        let body = format!(
            r"
            <h1>{} {}</h1>
            <p>{}</p>
            ",
            code, reason, description
        );
        Self {
            title: format!("{} {}", code, reason),
            css: BASE_CSS.to_string(),
            body,
        }
    }

    pub fn build(&self) -> String {
        format!(
            r##"<!DOCTYPE html>
            <html>
                <head>
                    <meta charset="utf-8">
                    <title>{}</title>
                    <style>{}</style>
                </head>
                <body>
                {}
                </body>
            </html>"##,
            self.title, self.css, self.body
        )
    }
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 毫秒数格式化为 `1d 2h 3m 4s` 的形式，省略为零的高位单位。
pub fn format_duration(ms: u64) -> String {
    let units = [("d", 86_400), ("h", 3_600), ("m", 60)];
    let mut seconds = ms / 1000;
    let mut parts = Vec::new();

    for (suffix, size) in units {
        if seconds >= size || !parts.is_empty() {
            parts.push(format!("{}{}", seconds / size, suffix));
            seconds %= size;
        }
    }
    parts.push(format!("{}s", seconds));
    parts.join(" ")
}
