// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! `/js`、`/css`、`/img`、`/fonts` 下的静态资源。无需登录，也不进入响应缓存。

use std::sync::Arc;

use log::warn;

use crate::auth::{AccessPolicy, WebUser};
use crate::exception::WebException;
use crate::factory::ResponseFactory;
use crate::request::Request;
use crate::resources::{is_safe_relative, ResourceKind};
use crate::response::Response;
use crate::target::RequestTarget;

use super::PageHandler;

pub struct ResourceHandler {
    kind: ResourceKind,
    factory: Arc<ResponseFactory>,
}

impl ResourceHandler {
    pub fn new(kind: ResourceKind, factory: Arc<ResponseFactory>) -> Self {
        Self { kind, factory }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl PageHandler for ResourceHandler {
    fn get_response(
        &self,
        _request: &Request,
        target: &RequestTarget,
    ) -> Result<Arc<Response>, WebException> {
        let name = target.segments().join("/");
        if !is_safe_relative(&name) {
            warn!("拒绝非法的资源路径：{}", target);
            return Err(WebException::NotFound(target.to_string()));
        }
        Ok(Arc::new(self.factory.resource(self.kind, &name)))
    }

    fn is_authorized(&self, user: &WebUser, target: &RequestTarget) -> bool {
        AccessPolicy::Public.allows(user, target)
    }

    fn requires_authentication(&self) -> bool {
        AccessPolicy::Public.requires_authentication()
    }
}
