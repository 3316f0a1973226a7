// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 响应工厂
//!
//! 为成功与每一种错误情况构造具体的 [`Response`]，让处理器不必重复拼装错误页。
//!
//! 工厂的公开构造方法都是全函数，不会失败：成功正文生成失败时，会退化为携带原因的 `500`。
//! 唯一的例外是供缓存填充使用的生成方法（`player_page` 等），它们返回
//! `Result<Response, GenerationError>`，以便失败能传回调用方而不被写进缓存。

use std::error::Error as StdError;
use std::io;
use std::path::Path;
use std::sync::Arc;

use log::error;
use serde_json::Value;
use uuid::Uuid;

use crate::exception::{AuthFailure, GenerationError};
use crate::param::*;
use crate::render::PageRenderer;
use crate::resources::{ResourceKind, ResourceLoader};
use crate::response::Response;
use crate::store::{Database, StoreState};
use crate::util::{escape_html, HtmlBuilder};

/// 渲染原因链时最多展开的层数，防止环状的原因链导致无限循环。
pub const MAX_CAUSE_DEPTH: usize = 16;

const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

const FAVICON: &str = "favicon.ico";

const FORBIDDEN_MESSAGE: &str = "Your user is not authorized to view this page.<br>\
    If you believe this is an error contact staff to change your access level.";

pub struct ResponseFactory {
    db: Arc<dyn Database>,
    renderer: Arc<dyn PageRenderer>,
    resources: Arc<dyn ResourceLoader>,
}

impl ResponseFactory {
    pub fn new(
        db: Arc<dyn Database>,
        renderer: Arc<dyn PageRenderer>,
        resources: Arc<dyn ResourceLoader>,
    ) -> Self {
        Self {
            db,
            renderer,
            resources,
        }
    }

    // --- 成功响应 ---

    pub fn html(&self, html: String) -> Response {
        Response::with_status(200).with_body(MIME_HTML, html)
    }

    pub fn json(&self, value: &Value) -> Response {
        Response::with_status(200).with_body(MIME_JSON, value.to_string())
    }

    /// 把生成结果转换为响应；失败时返回带原因的 500，本身永不失败。
    pub fn page(
        &self,
        result: Result<Response, GenerationError>,
        description: &str,
    ) -> Response {
        result.unwrap_or_else(|e| {
            error!("{}: {}", description, e);
            self.internal_error_500(&e, description)
        })
    }

    // --- 缓存填充使用的生成方法 ---

    pub fn player_page(&self, uuid: Uuid) -> Result<Response, GenerationError> {
        let player = self
            .db
            .player(uuid)?
            .ok_or_else(|| GenerationError::Vanished(format!("player {}", uuid)))?;
        let servers = self.db.servers()?;
        Ok(self.html(self.renderer.player_page(&player, &servers)?))
    }

    pub fn raw_player_json(&self, uuid: Uuid) -> Result<Response, GenerationError> {
        let player = self
            .db
            .player(uuid)?
            .ok_or_else(|| GenerationError::Vanished(format!("player {}", uuid)))?;
        Ok(self.json(&self.renderer.raw_player(&player)?))
    }

    pub fn server_page(&self, uuid: Uuid) -> Result<Response, GenerationError> {
        let server = self
            .db
            .server(uuid)?
            .ok_or_else(|| GenerationError::Vanished(format!("server {}", uuid)))?;
        let players = self.db.players()?;
        Ok(self.html(self.renderer.server_page(&server, &players)?))
    }

    pub fn network_page(&self) -> Result<Response, GenerationError> {
        let servers = self.db.servers()?;
        let players = self.db.players()?;
        Ok(self.html(self.renderer.network_page(&servers, &players)?))
    }

    pub fn players_page(&self) -> Result<Response, GenerationError> {
        let players = self.db.players()?;
        Ok(self.html(self.renderer.players_page(&players)?))
    }

    pub fn tab_json(&self, tab: &str, server: Option<Uuid>) -> Result<Response, GenerationError> {
        let server = match server {
            Some(uuid) => Some(
                self.db
                    .server(uuid)?
                    .ok_or_else(|| GenerationError::Vanished(format!("server {}", uuid)))?,
            ),
            None => None,
        };
        let players = self.db.players()?;
        Ok(self.json(&self.renderer.tab(tab, server.as_ref(), &players)?))
    }

    // --- 静态资源 ---

    pub fn javascript(&self, name: &str) -> Response {
        self.resource(ResourceKind::JavaScript, name)
    }

    pub fn css(&self, name: &str) -> Response {
        self.resource(ResourceKind::Css, name)
    }

    pub fn image(&self, name: &str) -> Response {
        self.resource(ResourceKind::Image, name)
    }

    pub fn font(&self, name: &str) -> Response {
        self.resource(ResourceKind::Font, name)
    }

    pub fn resource(&self, kind: ResourceKind, name: &str) -> Response {
        match self.resources.load(kind, name) {
            Ok(bytes) => Response::with_status(200).with_body(resource_mime(kind, name), bytes),
            Err(e) if matches!(e.kind(), io::ErrorKind::NotFound | io::ErrorKind::InvalidInput) => {
                self.not_found_404("Resource not found.")
            }
            Err(e) => self.page(
                Err(e.into()),
                &format!("Failed to load {}/{}", kind.directory(), name),
            ),
        }
    }

    /// `/favicon.ico`。与其他静态资源不同，缺失图标属于部署错误，按 500 处理。
    pub fn favicon(&self) -> Response {
        match self.resources.load(ResourceKind::Image, FAVICON) {
            Ok(bytes) => Response::with_status(200)
                .with_body(resource_mime(ResourceKind::Image, FAVICON), bytes),
            Err(e) => self.page(Err(e.into()), "Failed to load favicon"),
        }
    }

    pub fn redirect(&self, location: &str) -> Response {
        Response::with_status(302).with_header("Location", location)
    }

    // --- 错误响应 ---

    fn error_page(&self, code: u16, message: &str) -> Response {
        let html = HtmlBuilder::from_status_code(code, Some(message)).build();
        Response::with_status(code).with_body(MIME_HTML, html)
    }

    /// `OPTIONS` 的应答，列出管线接受的方法。
    pub fn options_204(&self) -> Response {
        Response::with_status(204).with_header("Allow", ALLOWED_METHODS)
    }

    pub fn method_not_allowed_405(&self) -> Response {
        self.error_page(405, "This resource only supports GET and HEAD requests.")
            .with_header("Allow", ALLOWED_METHODS)
    }

    pub fn bad_request_400(&self, message: &str) -> Response {
        self.error_page(400, &escape_html(message))
    }

    pub fn not_found_404(&self, message: &str) -> Response {
        self.error_page(404, message)
    }

    pub fn uuid_not_found_404(&self) -> Response {
        self.not_found_404("Player UUID was not found in the database.")
    }

    pub fn player_not_found_404(&self) -> Response {
        self.not_found_404("Player has not played on this server.")
    }

    pub fn server_not_found_404(&self) -> Response {
        self.not_found_404("Server doesn't exist.")
    }

    pub fn forbidden_403(&self) -> Response {
        self.error_page(403, FORBIDDEN_MESSAGE)
    }

    pub fn forbidden_403_with(&self, message: &str) -> Response {
        self.error_page(403, &escape_html(message))
    }

    pub fn database_not_open_503(&self, state: StoreState) -> Response {
        self.error_page(
            503,
            &format!("Database is {} - Please try again later.", state),
        )
    }

    /// 401 响应，附带 `WWW-Authenticate: Basic realm="<原因>"`。
    ///
    /// 原因属于内部错误时，正文中会展开原因链，供运维排查认证后端的配置问题；
    /// 普通的凭据错误只显示原因文本。
    pub fn basic_auth_401(&self, failure: &AuthFailure) -> Response {
        let reason = failure.reason();
        let mut message = String::from(
            "Authentication Failed.<br>\
            - Ensure you have registered a user<br>\
            - Check that the username and password are correct<br>\
            - Username and password are case-sensitive<br><br>",
        );
        message.push_str(&format!("Error: {}", escape_html(&reason.to_string())));
        if reason.is_internal() {
            if let Some(cause) = failure.cause() {
                for line in cause_chain(cause) {
                    message.push_str("<br>&nbsp;&nbsp;&nbsp;&nbsp;");
                    message.push_str(&escape_html(&line));
                }
            }
        }
        self.error_page(401, &message).with_header(
            "WWW-Authenticate",
            &format!("Basic realm=\"{}\"", reason),
        )
    }

    /// 500 响应：通用描述加上原因摘要，不包含原因链。
    pub fn internal_error_500(&self, cause: &dyn StdError, description: &str) -> Response {
        self.error_page(
            500,
            &format!(
                "{}<br>Cause: {}",
                escape_html(description),
                escape_html(&cause.to_string())
            ),
        )
    }
}

/// 把错误及其 `source()` 链展开为有序的文本行：第一行是错误本身，
/// 之后每一层以 `Caused by: ` 开头。最多展开 [`MAX_CAUSE_DEPTH`] 层。
pub fn cause_chain(error: &(dyn StdError + 'static)) -> Vec<String> {
    let mut lines = vec![error.to_string()];
    let mut current = error.source();
    while let Some(cause) = current {
        if lines.len() >= MAX_CAUSE_DEPTH {
            lines.push("... (cause chain truncated)".to_string());
            break;
        }
        lines.push(format!("Caused by: {}", cause));
        current = cause.source();
    }
    lines
}

/// 脚本与样式表按种类确定 MIME；图片与字体按扩展名查表，无法识别时退回字节流。
fn resource_mime(kind: ResourceKind, name: &str) -> &'static str {
    match kind {
        ResourceKind::JavaScript => MIME_JS,
        ResourceKind::Css => MIME_CSS,
        ResourceKind::Image | ResourceKind::Font => Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(mime_for_extension)
            .unwrap_or(OCTET_STREAM),
    }
}
