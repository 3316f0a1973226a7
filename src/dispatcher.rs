// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求分发
//!
//! 一个请求依次经过 RECEIVED → PARSED → AUTHORIZED → HANDLED → RESPONDED 五个阶段：
//!
//! 1. 按目标的第一段查找路由，找不到返回 404；
//! 2. 处理器需要登录时解析主体身份，失败返回 401；
//! 3. 处理器的授权谓词为假时返回 403；
//! 4. 调用处理器，把 [`WebException`] 一对一地映射为响应；处理器中的 panic 被捕获并转为 500。
//!
//! 分发器本身不持有可变状态，可以通过 `Arc` 在所有连接任务之间共享。

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, warn};

use crate::auth::{Authenticator, WebUser};
use crate::cache::ResponseCache;
use crate::exception::{AuthFailure, FailReason, GenerationError, WebException};
use crate::factory::{cause_chain, ResponseFactory};
use crate::handlers::{
    FaviconHandler, NetworkPageHandler, PageHandler, PlayerPageHandler, PlayersPageHandler,
    ResourceHandler, RootPageHandler, ServerPageHandler, TabJsonHandler,
};
use crate::param::HttpRequestMethod;
use crate::request::Request;
use crate::resources::ResourceKind;
use crate::response::Response;
use crate::store::{Database, UuidResolver};
use crate::target::RequestTarget;

const INTERNAL_ERROR_DESCRIPTION: &str = "Failed to generate the requested page";

/// 根路径 `/` 重定向的目标。
const ROOT_REDIRECT: &str = "/network";

pub struct Dispatcher {
    routes: HashMap<String, Arc<dyn PageHandler>>,
    authenticator: Option<Arc<dyn Authenticator>>,
    factory: Arc<ResponseFactory>,
}

impl Dispatcher {
    pub fn new(factory: Arc<ResponseFactory>) -> Self {
        Self {
            routes: HashMap::new(),
            authenticator: None,
            factory,
        }
    }

    /// 未设置认证器时不解析主体，所有处理器都可直接访问。
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// 注册路由。`name` 为目标的第一段，空字符串对应根路径 `/`。
    pub fn route(mut self, name: &str, handler: Arc<dyn PageHandler>) -> Self {
        if self.routes.insert(name.to_string(), handler).is_some() {
            warn!("路由{}被重复注册，旧的处理器已被替换", name);
        }
        self
    }

    /// 注册全部页面、JSON 与静态资源路由。
    pub fn with_standard_routes(
        self,
        db: Arc<dyn Database>,
        resolver: Arc<dyn UuidResolver>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        let factory = Arc::clone(&self.factory);
        let mut dispatcher = self
            .route(
                "player",
                Arc::new(PlayerPageHandler::new(
                    db.clone(),
                    resolver.clone(),
                    cache.clone(),
                    factory.clone(),
                )),
            )
            .route(
                "server",
                Arc::new(ServerPageHandler::new(
                    db.clone(),
                    resolver,
                    cache.clone(),
                    factory.clone(),
                )),
            )
            .route(
                "network",
                Arc::new(NetworkPageHandler::new(
                    db.clone(),
                    cache.clone(),
                    factory.clone(),
                )),
            )
            .route(
                "players",
                Arc::new(PlayersPageHandler::new(
                    db.clone(),
                    cache.clone(),
                    factory.clone(),
                )),
            )
            .route("json", Arc::new(TabJsonHandler::new(db, cache, factory.clone())))
            .route("", Arc::new(RootPageHandler::new(ROOT_REDIRECT, factory.clone())))
            .route("favicon.ico", Arc::new(FaviconHandler::new(factory.clone())));
        for kind in [
            ResourceKind::JavaScript,
            ResourceKind::Css,
            ResourceKind::Image,
            ResourceKind::Font,
        ] {
            dispatcher = dispatcher.route(
                kind.directory(),
                Arc::new(ResourceHandler::new(kind, factory.clone())),
            );
        }
        dispatcher
    }

    pub fn has_route(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn dispatch(&self, request: &Request, id: u128) -> Arc<Response> {
        debug!("[ID{}]RECEIVED {} {}", id, request.method(), request.path());

        match request.method() {
            HttpRequestMethod::Get | HttpRequestMethod::Head => {}
            HttpRequestMethod::Options => return Arc::new(self.factory.options_204()),
            HttpRequestMethod::Post => {
                debug!("[ID{}]不接受的请求方法：{}", id, request.method());
                return Arc::new(self.factory.method_not_allowed_405());
            }
        }

        let target = request.target();
        let route = target.first().unwrap_or("");
        let handler = match self.routes.get(route) {
            Some(handler) => handler,
            None => {
                debug!("[ID{}]没有与{}匹配的路由", id, target);
                return Arc::new(self.factory.not_found_404("Page does not exist."));
            }
        };
        let sub_target = target.tail();
        debug!("[ID{}]PARSED route={} target={:?}", id, route, sub_target.segments());

        let user = if handler.requires_authentication() {
            match self.resolve_user(request, id) {
                Ok(user) => user,
                Err(response) => return response,
            }
        } else {
            None
        };
        if let Some(user) = &user {
            if !handler.is_authorized(user, &sub_target) {
                debug!("[ID{}]用户{}无权访问{}", id, user.name(), target);
                return Arc::new(self.factory.forbidden_403());
            }
        }
        debug!("[ID{}]AUTHORIZED", id);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handler.get_response(request, &sub_target)
        }));
        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => self.exception_response(e, request, user.as_ref(), id),
            Err(payload) => {
                let cause = GenerationError::Panicked(panic_message(payload.as_ref()));
                self.internal_error(&cause, request, user.as_ref(), id)
            }
        };
        debug!("[ID{}]HANDLED {}", id, response.status_code());
        response
    }

    fn resolve_user(&self, request: &Request, id: u128) -> Result<Option<WebUser>, Arc<Response>> {
        let authenticator = match &self.authenticator {
            Some(authenticator) => authenticator,
            None => return Ok(None),
        };
        match authenticator.authenticate(request) {
            Ok(user) => Ok(Some(user)),
            Err(failure) => {
                debug!("[ID{}]认证失败：{}", id, failure.reason());
                Err(Arc::new(self.authentication_failure(&failure)))
            }
        }
    }

    // 存储不可用时无法校验密码，这不是凭据问题，按 503 应答
    fn authentication_failure(&self, failure: &AuthFailure) -> Response {
        match failure.reason() {
            FailReason::DatabaseNotOpen(state) => self.factory.database_not_open_503(state),
            _ => self.factory.basic_auth_401(failure),
        }
    }

    fn exception_response(
        &self,
        exception: WebException,
        request: &Request,
        user: Option<&WebUser>,
        id: u128,
    ) -> Arc<Response> {
        let response = match exception {
            WebException::NotFound(detail) => {
                debug!("[ID{}]目标不存在：{}", id, detail);
                self.factory.not_found_404("Page does not exist.")
            }
            WebException::Forbidden(message) => self.factory.forbidden_403_with(&message),
            WebException::NoBackingServers => self.factory.server_not_found_404(),
            WebException::AuthenticationFailure(failure) => self.authentication_failure(&failure),
            WebException::Internal(cause) => return self.internal_error(&cause, request, user, id),
        };
        Arc::new(response)
    }

    fn internal_error(
        &self,
        cause: &GenerationError,
        request: &Request,
        user: Option<&WebUser>,
        id: u128,
    ) -> Arc<Response> {
        error!(
            "[ID{}]处理请求时发生内部错误 user={} method={} path={} target={:?}\n{}",
            id,
            user.map_or("-", WebUser::name),
            request.method(),
            request.path(),
            request.target().segments(),
            cause_chain(cause).join("\n"),
        );
        Arc::new(self.factory.internal_error_500(cause, INTERNAL_ERROR_DESCRIPTION))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
