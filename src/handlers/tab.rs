// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! `/json/<tab>[/<server-uuid>]`：页面异步加载的 JSON 数据。

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::{AccessPolicy, WebUser};
use crate::cache::ResponseCache;
use crate::exception::{GenerationError, WebException};
use crate::factory::ResponseFactory;
use crate::identity::ResourceIdentity;
use crate::render::JSON_TABS;
use crate::request::Request;
use crate::response::Response;
use crate::store::Database;
use crate::target::RequestTarget;

use super::{unavailable, PageHandler};

pub struct TabJsonHandler {
    db: Arc<dyn Database>,
    cache: Arc<ResponseCache>,
    factory: Arc<ResponseFactory>,
    policy: AccessPolicy,
}

impl TabJsonHandler {
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

impl PageHandler for TabJsonHandler {
    fn get_response(
        &self,
        _request: &Request,
        target: &RequestTarget,
    ) -> Result<Arc<Response>, WebException> {
        let tab = match target.first() {
            Some(tab) if JSON_TABS.contains(&tab) => tab,
            _ => return Err(WebException::NotFound(format!("json tab {}", target))),
        };
        let server = match target.get(1) {
            None => None,
            Some(segment) => match Uuid::parse_str(segment) {
                Ok(uuid) if target.len() == 2 => Some(uuid),
                _ => return Err(WebException::NotFound(format!("json tab {}", target))),
            },
        };
        if tab == "performance" && server.is_none() {
            return Err(WebException::NotFound(
                "performance data is only available per server".to_string(),
            ));
        }

        if let Some(response) = unavailable(self.db.as_ref(), &self.factory) {
            return Ok(response);
        }
        if let Some(uuid) = server {
            if self
                .db
                .server(uuid)
                .map_err(GenerationError::from)?
                .is_none()
            {
                return Ok(Arc::new(self.factory.server_not_found_404()));
            }
        }

        Ok(self
            .cache
            .get_or_cache(&ResourceIdentity::tab(tab, server), || {
                self.factory.tab_json(tab, server)
            })?)
    }

    fn is_authorized(&self, user: &WebUser, target: &RequestTarget) -> bool {
        self.policy.allows(user, target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing;
    use crate::param::MIME_JSON;
    use crate::store::{MockDatabase, StoreState};

    fn handler() -> (TabJsonHandler, Arc<ResponseCache>, Uuid) {
        let lobby = testing::server("Lobby", false);
        let uuid = lobby.uuid;
        let alice = testing::player("Alice", uuid);

        let mut db = MockDatabase::new();
        db.expect_state().return_const(StoreState::Open);
        db.expect_server()
            .returning(move |id| Ok((id == lobby.uuid).then(|| lobby.clone())));
        db.expect_players().returning(move || Ok(vec![alice.clone()]));
        let db: Arc<dyn Database> = Arc::new(db);

        let cache = Arc::new(ResponseCache::from_capacity(8));
        let handler = TabJsonHandler::new(db.clone(), cache.clone(), testing::factory(db));
        (handler, cache, uuid)
    }

    fn respond(handler: &TabJsonHandler, path: &str) -> Result<Arc<Response>, WebException> {
        let request = testing::get(path);
        handler.get_response(&request, &request.target().tail())
    }

    #[test]
    fn test_network_and_server_tabs_are_cached_apart() {
        let (handler, cache, uuid) = handler();

        let network = respond(&handler, "/json/sessions").unwrap();
        let server = respond(&handler, &format!("/json/sessions/{}", uuid)).unwrap();

        assert_eq!(network.content_type(), Some(MIME_JSON));
        assert!(!Arc::ptr_eq(&network, &server));
        assert!(cache.contains(&ResourceIdentity::tab("sessions", None)));
        assert!(cache.contains(&ResourceIdentity::tab("sessions", Some(uuid))));
    }

    #[test]
    fn test_invalid_targets() {
        let (handler, cache, _) = handler();
        for path in [
            "/json",
            "/json/unknown",
            "/json/sessions/not-a-uuid",
            "/json/performance",
        ] {
            assert!(
                matches!(respond(&handler, path), Err(WebException::NotFound(_))),
                "path: {}",
                path
            );
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unknown_server_uuid() {
        let (handler, _, _) = handler();
        let response = respond(&handler, &format!("/json/performance/{}", Uuid::new_v4())).unwrap();
        assert_eq!(response.status_code(), 404);
    }

    #[test]
    fn test_performance_for_server() {
        let (handler, _, uuid) = handler();
        let response = respond(&handler, &format!("/json/performance/{}", uuid)).unwrap();
        assert_eq!(response.status_code(), 200);
        assert!(response.text().contains("Lobby"));
    }
}
