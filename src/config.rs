// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::fs::File;
use std::io::prelude::*;
use std::str::FromStr;
use std::time::Duration;

use log::warn;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::WebUserRecord;

const DEFAULT_CACHE_SIZE: usize = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config file is not valid TOML")]
    Toml(#[from] toml::de::Error),
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    users: Vec<WebUserRecord>,
}

impl AuthConfig {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn users(&self) -> &[WebUserRecord] {
        &self.users
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    www_root: String,
    port: u16,
    #[serde(default)]
    worker_threads: usize,
    #[serde(default = "default_cache_size")]
    cache_size: usize,
    #[serde(default = "default_local")]
    local: bool,
    /// 0 表示缓存条目永不过期
    #[serde(default)]
    cache_ttl_secs: u64,
    #[serde(default = "default_dataset")]
    dataset: String,
    #[serde(default)]
    auth: AuthConfig,
}

fn default_cache_size() -> usize {
    DEFAULT_CACHE_SIZE
}

fn default_local() -> bool {
    true
}

fn default_dataset() -> String {
    "data/dataset.json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            www_root: "static".to_string(),
            port: 7878,
            worker_threads: 0,
            cache_size: DEFAULT_CACHE_SIZE,
            local: true,
            cache_ttl_secs: 0,
            dataset: default_dataset(),
            auth: AuthConfig::default(),
        }
        .normalized()
    }

    pub fn from_toml(filename: &str) -> Result<Self, ConfigError> {
        let mut file = File::open(filename).map_err(|source| ConfigError::Io {
            path: filename.to_string(),
            source,
        })?;
        let mut str_val = String::new();
        file.read_to_string(&mut str_val)
            .map_err(|source| ConfigError::Io {
                path: filename.to_string(),
                source,
            })?;
        str_val.parse()
    }

    // 0 值在这里被替换为实际可用的值
    fn normalized(mut self) -> Self {
        if self.worker_threads == 0 {
            self.worker_threads = num_cpus::get();
        }
        if self.cache_size == 0 {
            warn!(
                "cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为{}。",
                DEFAULT_CACHE_SIZE
            );
            self.cache_size = DEFAULT_CACHE_SIZE;
        }
        if self.auth.enabled && self.auth.users.is_empty() {
            warn!("已启用认证但没有配置任何网页用户，所有受保护的页面都将返回401。");
        }
        self
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: Config = toml::from_str(s)?;
        Ok(raw.normalized())
    }
}

impl Config {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn local(&self) -> bool {
        self.local
    }

    /// `None` 表示永不过期。
    pub fn cache_ttl(&self) -> Option<Duration> {
        match self.cache_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }
}
