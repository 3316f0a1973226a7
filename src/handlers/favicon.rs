// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 浏览器自动请求的 `/favicon.ico`。

use std::sync::Arc;

use crate::auth::{AccessPolicy, WebUser};
use crate::exception::WebException;
use crate::factory::ResponseFactory;
use crate::request::Request;
use crate::response::Response;
use crate::target::RequestTarget;

use super::PageHandler;

pub struct FaviconHandler {
    factory: Arc<ResponseFactory>,
}

impl FaviconHandler {
    pub fn new(factory: Arc<ResponseFactory>) -> Self {
        Self { factory }
    }
}

impl PageHandler for FaviconHandler {
    fn get_response(
        &self,
        _request: &Request,
        _target: &RequestTarget,
    ) -> Result<Arc<Response>, WebException> {
        Ok(Arc::new(self.factory.favicon()))
    }

    fn is_authorized(&self, user: &WebUser, target: &RequestTarget) -> bool {
        AccessPolicy::Public.allows(user, target)
    }

    fn requires_authentication(&self) -> bool {
        AccessPolicy::Public.requires_authentication()
    }
}
