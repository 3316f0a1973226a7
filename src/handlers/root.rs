// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 根路径 `/` 重定向到一个固定的入口页面。

use std::sync::Arc;

use crate::auth::{AccessPolicy, WebUser};
use crate::exception::WebException;
use crate::factory::ResponseFactory;
use crate::request::Request;
use crate::response::Response;
use crate::target::RequestTarget;

use super::PageHandler;

pub struct RootPageHandler {
    location: String,
    factory: Arc<ResponseFactory>,
}

impl RootPageHandler {
    pub fn new(location: &str, factory: Arc<ResponseFactory>) -> Self {
        Self {
            location: location.to_string(),
            factory,
        }
    }
}

impl PageHandler for RootPageHandler {
    fn get_response(
        &self,
        _request: &Request,
        target: &RequestTarget,
    ) -> Result<Arc<Response>, WebException> {
        if !target.is_empty() {
            return Err(WebException::NotFound(target.to_string()));
        }
        Ok(Arc::new(self.factory.redirect(&self.location)))
    }

    // 重定向本身不泄露任何数据，目标页面会再做一次授权
    fn is_authorized(&self, user: &WebUser, target: &RequestTarget) -> bool {
        AccessPolicy::Public.allows(user, target)
    }

    fn requires_authentication(&self) -> bool {
        AccessPolicy::Public.requires_authentication()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing;
    use crate::store::MemoryDatabase;

    #[test]
    fn test_redirects_to_entry_page() {
        let factory = testing::factory(Arc::new(MemoryDatabase::new()));
        let handler = RootPageHandler::new("/network", factory);
        let request = testing::get("/");

        let response = handler
            .get_response(&request, &request.target().tail())
            .unwrap();

        assert_eq!(response.status_code(), 302);
        assert_eq!(response.header("Location"), Some("/network"));
        assert!(!handler.requires_authentication());
    }

    #[test]
    fn test_rejects_extra_segments() {
        let factory = testing::factory(Arc::new(MemoryDatabase::new()));
        let handler = RootPageHandler::new("/network", factory);
        let target = RequestTarget::from_segments(["unexpected"]);
        let result = handler.get_response(&testing::get("/"), &target);
        assert!(matches!(result, Err(WebException::NotFound(_))));
    }
}
