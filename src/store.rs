// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 数据存储
//!
//! 管线只通过 [`Database`] 与 [`UuidResolver`] 两个 trait 访问后端：
//! 前者报告可用状态并执行查询，后者把显示名称解析为 UUID。
//! [`MemoryDatabase`] 是进程内实现，从 JSON 数据集加载，供二进制程序与测试使用。

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::UserStore;

/// 后端存储的可用状态，每个请求在生成之前同步读取一次。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum StoreState {
    Open,
    Closed,
    Patching,
    Initializing,
}

impl fmt::Display for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreState::Open => write!(f, "OPEN"),
            StoreState::Closed => write!(f, "CLOSED"),
            StoreState::Patching => write!(f, "PATCHING"),
            StoreState::Initializing => write!(f, "INITIALIZING"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database is {0}")]
    NotOpen(StoreState),
    #[error("could not read dataset {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("dataset {path} is not valid JSON")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub server: Uuid,
    pub start: DateTime<Utc>,
    pub length_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub uuid: Uuid,
    pub name: String,
    pub registered: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub kills: u32,
    #[serde(default)]
    pub deaths: u32,
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
}

impl PlayerRecord {
    pub fn playtime_ms(&self) -> u64 {
        self.sessions.iter().map(|s| s.length_ms).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub uuid: Uuid,
    pub name: String,
    /// 代理服务器（如 BungeeCord/Velocity）负责提供全网视图
    #[serde(default)]
    pub is_proxy: bool,
    #[serde(default)]
    pub players_online: u32,
    #[serde(default)]
    pub max_players: u32,
}

/// 网页用户的持久化形式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebUserRecord {
    pub name: String,
    pub password: String,
    pub permission_level: u8,
}

/// 数据集文件的结构。`name_mappings` 记录只有名称映射而没有活动数据的玩家。
#[derive(Debug, Default, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub players: Vec<PlayerRecord>,
    #[serde(default)]
    pub servers: Vec<ServerRecord>,
    #[serde(default)]
    pub name_mappings: HashMap<String, Uuid>,
}

#[cfg_attr(test, mockall::automock)]
pub trait Database: Send + Sync {
    fn state(&self) -> StoreState;
    fn player(&self, uuid: Uuid) -> Result<Option<PlayerRecord>, StoreError>;
    fn is_player_registered(&self, uuid: Uuid) -> Result<bool, StoreError>;
    fn players(&self) -> Result<Vec<PlayerRecord>, StoreError>;
    fn server(&self, uuid: Uuid) -> Result<Option<ServerRecord>, StoreError>;
    fn servers(&self) -> Result<Vec<ServerRecord>, StoreError>;
}

#[cfg_attr(test, mockall::automock)]
pub trait UuidResolver: Send + Sync {
    fn player_uuid(&self, name: &str) -> Option<Uuid>;
    fn server_uuid(&self, name: &str) -> Option<Uuid>;
}

struct Tables {
    state: StoreState,
    players: HashMap<Uuid, PlayerRecord>,
    servers: HashMap<Uuid, ServerRecord>,
    // 小写名称 -> UUID
    player_names: HashMap<String, Uuid>,
    server_names: HashMap<String, Uuid>,
    users: HashMap<String, WebUserRecord>,
}

pub struct MemoryDatabase {
    tables: RwLock<Tables>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables {
                state: StoreState::Open,
                players: HashMap::new(),
                servers: HashMap::new(),
                player_names: HashMap::new(),
                server_names: HashMap::new(),
                users: HashMap::new(),
            }),
        }
    }

    pub fn from_dataset(dataset: Dataset) -> Self {
        let db = Self::new();
        for (name, uuid) in dataset.name_mappings {
            db.add_name_mapping(&name, uuid);
        }
        for player in dataset.players {
            db.upsert_player(player);
        }
        for server in dataset.servers {
            db.upsert_server(server);
        }
        db
    }

    pub fn from_file(path: &str) -> Result<Self, StoreError> {
        let text = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_string(),
            source,
        })?;
        let dataset: Dataset = serde_json::from_str(&text).map_err(|source| StoreError::Parse {
            path: path.to_string(),
            source,
        })?;
        info!(
            "数据集{}已载入：{}名玩家，{}台服务器",
            path,
            dataset.players.len(),
            dataset.servers.len()
        );
        Ok(Self::from_dataset(dataset))
    }

    pub fn set_state(&self, state: StoreState) {
        let mut tables = self.write();
        if tables.state != state {
            info!("数据库状态：{} -> {}", tables.state, state);
            tables.state = state;
        }
    }

    pub fn upsert_player(&self, player: PlayerRecord) {
        let mut tables = self.write();
        tables
            .player_names
            .insert(player.name.to_lowercase(), player.uuid);
        tables.players.insert(player.uuid, player);
    }

    pub fn upsert_server(&self, server: ServerRecord) {
        let mut tables = self.write();
        tables
            .server_names
            .insert(server.name.to_lowercase(), server.uuid);
        tables.servers.insert(server.uuid, server);
    }

    pub fn add_name_mapping(&self, name: &str, uuid: Uuid) {
        self.write().player_names.insert(name.to_lowercase(), uuid);
    }

    pub fn add_user(&self, user: WebUserRecord) {
        self.write().users.insert(user.name.clone(), user);
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        match self.tables.read() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("数据表读锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        match self.tables.write() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("数据表写锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    fn open(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        let tables = self.read();
        let state = tables.state;
        if state == StoreState::Open {
            Ok(tables)
        } else {
            Err(StoreError::NotOpen(state))
        }
    }
}

impl Database for MemoryDatabase {
    fn state(&self) -> StoreState {
        self.read().state
    }

    fn player(&self, uuid: Uuid) -> Result<Option<PlayerRecord>, StoreError> {
        Ok(self.open()?.players.get(&uuid).cloned())
    }

    fn is_player_registered(&self, uuid: Uuid) -> Result<bool, StoreError> {
        Ok(self.open()?.players.contains_key(&uuid))
    }

    fn players(&self) -> Result<Vec<PlayerRecord>, StoreError> {
        let mut players: Vec<PlayerRecord> = self.open()?.players.values().cloned().collect();
        players.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(players)
    }

    fn server(&self, uuid: Uuid) -> Result<Option<ServerRecord>, StoreError> {
        Ok(self.open()?.servers.get(&uuid).cloned())
    }

    fn servers(&self) -> Result<Vec<ServerRecord>, StoreError> {
        let mut servers: Vec<ServerRecord> = self.open()?.servers.values().cloned().collect();
        servers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(servers)
    }
}

impl UuidResolver for MemoryDatabase {
    fn player_uuid(&self, name: &str) -> Option<Uuid> {
        self.read().player_names.get(&name.to_lowercase()).copied()
    }

    fn server_uuid(&self, name: &str) -> Option<Uuid> {
        self.read().server_names.get(&name.to_lowercase()).copied()
    }
}

impl UserStore for MemoryDatabase {
    fn find_user(&self, name: &str) -> Result<Option<WebUserRecord>, StoreError> {
        Ok(self.open()?.users.get(name).cloned())
    }
}
