// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 资源标识
//!
//! 响应缓存的键。缓存按“逻辑资源”而不是原始请求字符串建立索引，
//! 因此 `/player/Alice` 与 `/player/<uuid>` 会命中同一条缓存。

use std::fmt;

use uuid::Uuid;

/// 可缓存输出的种类。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PageKind {
    Player,
    RawPlayer,
    Server,
    Network,
    Players,
    /// 以名称区分的 JSON 标签页
    Tab(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceIdentity {
    kind: PageKind,
    sub_key: Option<Uuid>,
}

impl ResourceIdentity {
    pub fn of(kind: PageKind, sub_key: Option<Uuid>) -> Self {
        Self { kind, sub_key }
    }

    pub fn player(uuid: Uuid) -> Self {
        Self::of(PageKind::Player, Some(uuid))
    }

    pub fn raw_player(uuid: Uuid) -> Self {
        Self::of(PageKind::RawPlayer, Some(uuid))
    }

    pub fn server(uuid: Uuid) -> Self {
        Self::of(PageKind::Server, Some(uuid))
    }

    pub fn network() -> Self {
        Self::of(PageKind::Network, None)
    }

    pub fn players() -> Self {
        Self::of(PageKind::Players, None)
    }

    pub fn tab(name: &str, server: Option<Uuid>) -> Self {
        Self::of(PageKind::Tab(name.to_string()), server)
    }

    pub fn kind(&self) -> &PageKind {
        &self.kind
    }

    pub fn sub_key(&self) -> Option<Uuid> {
        self.sub_key
    }
}

impl fmt::Display for ResourceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            PageKind::Player => "player",
            PageKind::RawPlayer => "raw-player",
            PageKind::Server => "server",
            PageKind::Network => "network",
            PageKind::Players => "players",
            PageKind::Tab(name) => name.as_str(),
        };
        match self.sub_key {
            Some(key) => write!(f, "{}:{}", kind, key),
            None => write!(f, "{}", kind),
        }
    }
}
