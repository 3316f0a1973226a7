// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! `/players`

use std::sync::Arc;

use crate::auth::{AccessPolicy, WebUser};
use crate::cache::ResponseCache;
use crate::exception::WebException;
use crate::factory::ResponseFactory;
use crate::identity::ResourceIdentity;
use crate::request::Request;
use crate::response::Response;
use crate::store::Database;
use crate::target::RequestTarget;

use super::{unavailable, PageHandler};

pub struct PlayersPageHandler {
    db: Arc<dyn Database>,
    cache: Arc<ResponseCache>,
    factory: Arc<ResponseFactory>,
    policy: AccessPolicy,
}

impl PlayersPageHandler {
    pub fn new(
        db: Arc<dyn Database>,
        cache: Arc<ResponseCache>,
        factory: Arc<ResponseFactory>,
    ) -> Self {
        Self {
            db,
            cache,
            factory,
            policy: AccessPolicy::Threshold(1),
        }
    }
}

impl PageHandler for PlayersPageHandler {
    fn get_response(
        &self,
        _request: &Request,
        _target: &RequestTarget,
    ) -> Result<Arc<Response>, WebException> {
        if let Some(response) = unavailable(self.db.as_ref(), &self.factory) {
            return Ok(response);
        }
        Ok(self
            .cache
            .get_or_cache(&ResourceIdentity::players(), || {
                self.factory.players_page()
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
    use crate::store::{MockDatabase, StoreError, StoreState};
    use uuid::Uuid;

    #[test]
    fn test_players_list() {
        let alice = testing::player("Alice", Uuid::new_v4());
        let mut db = MockDatabase::new();
        db.expect_state().return_const(StoreState::Open);
        db.expect_players()
            .times(1)
            .returning(move || Ok(vec![alice.clone()]));
        let db: Arc<dyn Database> = Arc::new(db);
        let handler = PlayersPageHandler::new(
            db.clone(),
            Arc::new(ResponseCache::from_capacity(4)),
            testing::factory(db),
        );
        let request = testing::get("/players");

        let first = handler.get_response(&request, &RequestTarget::default()).unwrap();
        let second = handler.get_response(&request, &RequestTarget::default()).unwrap();

        assert!(first.text().contains("Alice"));
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_query_failure_is_internal() {
        let mut db = MockDatabase::new();
        db.expect_state().return_const(StoreState::Open);
        db.expect_players()
            .returning(|| Err(StoreError::NotOpen(StoreState::Closed)));
        let db: Arc<dyn Database> = Arc::new(db);
        let cache = Arc::new(ResponseCache::from_capacity(4));
        let handler = PlayersPageHandler::new(db.clone(), cache.clone(), testing::factory(db));

        let result = handler.get_response(&testing::get("/players"), &RequestTarget::default());

        assert!(matches!(result, Err(WebException::Internal(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_moderators_may_list_players() {
        let db: Arc<dyn Database> = Arc::new(MockDatabase::new());
        let handler = PlayersPageHandler::new(
            db.clone(),
            Arc::new(ResponseCache::from_capacity(1)),
            testing::factory(db),
        );
        let target = RequestTarget::default();
        assert!(handler.is_authorized(&WebUser::new("mod", 1), &target));
        assert!(!handler.is_authorized(&WebUser::new("guest", 2), &target));
    }
}
