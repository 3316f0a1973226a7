// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 页面处理器
//!
//! 每个路由名对应一个 [`PageHandler`] trait 对象，分发器持有它们组成的路由表。
//! 处理器拿到的是去掉路由段之后的子目标，例如 `/player/Alice/raw` 的处理器看到 `["Alice", "raw"]`。
//!
//! 授权判定由分发器在调用 [`PageHandler::get_response`] 之前完成，因此处理器内部不再检查权限，
//! 缓存也永远不会在授权之前被访问。

pub mod favicon;
pub mod network;
pub mod player;
pub mod players;
pub mod resource;
pub mod root;
pub mod server;
pub mod tab;

use std::sync::Arc;

use log::debug;
use uuid::Uuid;

use crate::auth::WebUser;
use crate::exception::WebException;
use crate::factory::ResponseFactory;
use crate::request::Request;
use crate::response::Response;
use crate::store::{Database, StoreState};
use crate::target::RequestTarget;

pub use favicon::FaviconHandler;
pub use network::NetworkPageHandler;
pub use player::PlayerPageHandler;
pub use players::PlayersPageHandler;
pub use resource::ResourceHandler;
pub use root::RootPageHandler;
pub use server::ServerPageHandler;
pub use tab::TabJsonHandler;

pub trait PageHandler: Send + Sync {
    /// 生成或取回目标对应的响应。
    ///
    /// 可预期的失败（目标不存在、存储不可用）直接以对应状态码的响应返回；
    /// 需要分发器统一处理的失败以 [`WebException`] 返回。
    fn get_response(
        &self,
        request: &Request,
        target: &RequestTarget,
    ) -> Result<Arc<Response>, WebException>;

    fn is_authorized(&self, user: &WebUser, target: &RequestTarget) -> bool;

    /// 为假时分发器跳过主体解析，静态资源依赖这一点。
    fn requires_authentication(&self) -> bool {
        true
    }
}

/// 存储未处于 `OPEN` 状态时返回 503 响应，调用方应立即返回它而不尝试生成。
pub(crate) fn unavailable(db: &dyn Database, factory: &ResponseFactory) -> Option<Arc<Response>> {
    let state = db.state();
    if state == StoreState::Open {
        None
    } else {
        debug!("存储当前为{}，放弃生成", state);
        Some(Arc::new(factory.database_not_open_503(state)))
    }
}

/// 段本身是 UUID 时直接使用，否则交给 `resolve` 按名称查找。
pub(crate) fn uuid_or_resolve<F>(segment: &str, resolve: F) -> Option<Uuid>
where
    F: FnOnce(&str) -> Option<Uuid>,
{
    match Uuid::parse_str(segment) {
        Ok(uuid) => Some(uuid),
        Err(_) => resolve(segment),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockDatabase;

    #[test]
    fn test_uuid_or_resolve_prefers_literal_uuid() {
        let uuid = Uuid::new_v4();
        let resolved = uuid_or_resolve(&uuid.to_string(), |_| panic!("不应按名称查找"));
        assert_eq!(resolved, Some(uuid));
    }

    #[test]
    fn test_uuid_or_resolve_falls_back_to_name() {
        let uuid = Uuid::new_v4();
        assert_eq!(uuid_or_resolve("Alice", |_| Some(uuid)), Some(uuid));
        assert_eq!(uuid_or_resolve("Alice", |_| None), None);
    }

    #[test]
    fn test_unavailable_reports_state() {
        let mut db = MockDatabase::new();
        db.expect_state().return_const(StoreState::Patching);
        let db: Arc<dyn Database> = Arc::new(db);
        let factory = testing::factory(db.clone());

        let response = unavailable(db.as_ref(), &factory).unwrap();
        assert_eq!(response.status_code(), 503);
        assert!(response.text().contains("PATCHING"));
    }
}
