// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! `/network`：全网视图，需要至少一台代理服务器提供数据。

use std::sync::Arc;

use crate::auth::{AccessPolicy, WebUser};
use crate::cache::ResponseCache;
use crate::exception::{GenerationError, WebException};
use crate::factory::ResponseFactory;
use crate::identity::ResourceIdentity;
use crate::request::Request;
use crate::response::Response;
use crate::store::Database;
use crate::target::RequestTarget;

use super::{unavailable, PageHandler};

pub struct NetworkPageHandler {
    db: Arc<dyn Database>,
    cache: Arc<ResponseCache>,
    factory: Arc<ResponseFactory>,
    policy: AccessPolicy,
}

impl NetworkPageHandler {
    pub fn new(
        db: Arc<dyn Database>,
        cache: Arc<ResponseCache>,
        factory: Arc<ResponseFactory>,
    ) -> Self {
        Self {
            db,
            cache,
            factory,
            policy: AccessPolicy::Threshold(0),
        }
    }
}

impl PageHandler for NetworkPageHandler {
    fn get_response(
        &self,
        _request: &Request,
        _target: &RequestTarget,
    ) -> Result<Arc<Response>, WebException> {
        if let Some(response) = unavailable(self.db.as_ref(), &self.factory) {
            return Ok(response);
        }
        let servers = self.db.servers().map_err(GenerationError::from)?;
        if !servers.iter().any(|s| s.is_proxy) {
            return Err(WebException::NoBackingServers);
        }
        Ok(self
            .cache
            .get_or_cache(&ResourceIdentity::network(), || {
                self.factory.network_page()
            })?)
    }

    fn is_authorized(&self, user: &WebUser, target: &RequestTarget) -> bool {
        self.policy.allows(user, target)
    }
}
