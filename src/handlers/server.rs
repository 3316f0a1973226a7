// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! `/server/<name|uuid>`

use std::sync::Arc;

use crate::auth::{AccessPolicy, WebUser};
use crate::cache::ResponseCache;
use crate::exception::{GenerationError, WebException};
use crate::factory::ResponseFactory;
use crate::identity::ResourceIdentity;
use crate::request::Request;
use crate::response::Response;
use crate::store::{Database, UuidResolver};
use crate::target::RequestTarget;

use super::{unavailable, uuid_or_resolve, PageHandler};

pub struct ServerPageHandler {
    db: Arc<dyn Database>,
    resolver: Arc<dyn UuidResolver>,
    cache: Arc<ResponseCache>,
    factory: Arc<ResponseFactory>,
    policy: AccessPolicy,
}

impl ServerPageHandler {
    pub fn new(
        db: Arc<dyn Database>,
        resolver: Arc<dyn UuidResolver>,
        cache: Arc<ResponseCache>,
        factory: Arc<ResponseFactory>,
    ) -> Self {
        Self {
            db,
            resolver,
            cache,
            factory,
            policy: AccessPolicy::Threshold(0),
        }
    }
}

impl PageHandler for ServerPageHandler {
    fn get_response(
        &self,
        _request: &Request,
        target: &RequestTarget,
    ) -> Result<Arc<Response>, WebException> {
        let identifier = target
            .first()
            .ok_or_else(|| WebException::NotFound("no server specified".to_string()))?;
        if target.len() > 1 {
            return Err(WebException::NotFound(target.to_string()));
        }

        let uuid = match uuid_or_resolve(identifier, |name| self.resolver.server_uuid(name)) {
            Some(uuid) => uuid,
            None => return Ok(Arc::new(self.factory.server_not_found_404())),
        };
        if let Some(response) = unavailable(self.db.as_ref(), &self.factory) {
            return Ok(response);
        }
        if self
            .db
            .server(uuid)
            .map_err(GenerationError::from)?
            .is_none()
        {
            return Ok(Arc::new(self.factory.server_not_found_404()));
        }

        Ok(self
            .cache
            .get_or_cache(&ResourceIdentity::server(uuid), || {
                self.factory.server_page(uuid)
            })?)
    }

    fn is_authorized(&self, user: &WebUser, target: &RequestTarget) -> bool {
        self.policy.allows(user, target)
    }
}
