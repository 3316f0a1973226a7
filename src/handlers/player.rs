// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! `/player/<name|uuid>[/raw]`

use std::sync::Arc;

use log::debug;

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

const RAW: &str = "raw";

pub struct PlayerPageHandler {
    db: Arc<dyn Database>,
    resolver: Arc<dyn UuidResolver>,
    cache: Arc<ResponseCache>,
    factory: Arc<ResponseFactory>,
    policy: AccessPolicy,
}

impl PlayerPageHandler {
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
            policy: AccessPolicy::ThresholdOrSelf(1),
        }
    }
}

impl PageHandler for PlayerPageHandler {
    fn get_response(
        &self,
        _request: &Request,
        target: &RequestTarget,
    ) -> Result<Arc<Response>, WebException> {
        let identifier = target
            .first()
            .ok_or_else(|| WebException::NotFound("no player specified".to_string()))?;
        let raw = match target.get(1) {
            None => false,
            Some(segment) if segment.eq_ignore_ascii_case(RAW) && target.len() == 2 => true,
            Some(_) => return Err(WebException::NotFound(target.to_string())),
        };

        let uuid = match uuid_or_resolve(identifier, |name| self.resolver.player_uuid(name)) {
            Some(uuid) => uuid,
            None => return Ok(Arc::new(self.factory.uuid_not_found_404())),
        };
        if let Some(response) = unavailable(self.db.as_ref(), &self.factory) {
            return Ok(response);
        }
        if !self
            .db
            .is_player_registered(uuid)
            .map_err(GenerationError::from)?
        {
            debug!("玩家{}（{}）没有活动记录", identifier, uuid);
            return Ok(Arc::new(self.factory.player_not_found_404()));
        }

        let response = if raw {
            self.cache
                .get_or_cache(&ResourceIdentity::raw_player(uuid), || {
                    self.factory.raw_player_json(uuid)
                })?
        } else {
            self.cache
                .get_or_cache(&ResourceIdentity::player(uuid), || {
                    self.factory.player_page(uuid)
                })?
        };
        Ok(response)
    }

    /// 自我匹配按玩家段判断，`/player/Alice/raw` 与 `/player/Alice` 的授权结果相同。
    fn is_authorized(&self, user: &WebUser, target: &RequestTarget) -> bool {
        let segments = target.segments();
        match segments.split_last() {
            Some((last, rest)) if !rest.is_empty() && last.eq_ignore_ascii_case(RAW) => self
                .policy
                .allows(user, &RequestTarget::from_segments(rest.iter().cloned())),
            _ => self.policy.allows(user, target),
        }
    }
}
