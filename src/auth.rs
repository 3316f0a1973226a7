// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 认证与授权
//!
//! - [`Authenticator`] 从请求中解析出主体身份 [`WebUser`]，失败时给出 [`AuthFailure`]（401）。
//! - [`AccessPolicy`] 是每个处理器自带的授权谓词，只依赖 `(主体, 目标)`，无需同步。
//!
//! 权限等级越小权限越高：0 可查看全部页面，1 可查看玩家列表与所有玩家页，
//! 2 及以上只能查看自己的玩家页。

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use log::{debug, warn};

use crate::exception::{AuthFailure, FailReason};
use crate::request::Request;
use crate::store::{StoreError, WebUserRecord};
use crate::target::RequestTarget;

/// 已认证的主体。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebUser {
    name: String,
    permission_level: u8,
}

impl WebUser {
    pub fn new(name: &str, permission_level: u8) -> Self {
        Self {
            name: name.to_string(),
            permission_level,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn permission_level(&self) -> u8 {
        self.permission_level
    }
}

/// 处理器的授权策略。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// 无需登录
    Public,
    /// `level <= threshold`
    Threshold(u8),
    /// `level <= threshold`，或用户名与目标最后一段（忽略大小写）相同
    ThresholdOrSelf(u8),
}

impl AccessPolicy {
    pub fn allows(&self, user: &WebUser, target: &RequestTarget) -> bool {
        match *self {
            AccessPolicy::Public => true,
            AccessPolicy::Threshold(threshold) => user.permission_level <= threshold,
            AccessPolicy::ThresholdOrSelf(threshold) => {
                user.permission_level <= threshold
                    || target
                        .last()
                        .is_some_and(|last| last.eq_ignore_ascii_case(&user.name))
            }
        }
    }

    pub fn requires_authentication(&self) -> bool {
        !matches!(self, AccessPolicy::Public)
    }
}

/// 主体解析协作方。
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, request: &Request) -> Result<WebUser, AuthFailure>;
}

/// 网页用户的来源。
#[cfg_attr(test, mockall::automock)]
pub trait UserStore: Send + Sync {
    fn find_user(&self, name: &str) -> Result<Option<WebUserRecord>, StoreError>;
}

/// HTTP Basic 认证：`Authorization: Basic base64(name:password)`。
pub struct BasicAuthenticator {
    users: Arc<dyn UserStore>,
}

impl BasicAuthenticator {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }
}

impl Authenticator for BasicAuthenticator {
    fn authenticate(&self, request: &Request) -> Result<WebUser, AuthFailure> {
        let header = request
            .authorization()
            .ok_or_else(|| AuthFailure::new(FailReason::NoUserPresent))?;
        let (name, password) = decode_basic(header)?;

        let user = match self.users.find_user(&name) {
            Ok(Some(user)) => user,
            Ok(None) => {
                debug!("登录失败，用户不存在：{}", name);
                return Err(AuthFailure::new(FailReason::UserDoesNotExist));
            }
            Err(StoreError::NotOpen(state)) => {
                debug!("存储当前为{}，无法校验用户{}", state, name);
                return Err(AuthFailure::new(FailReason::DatabaseNotOpen(state)));
            }
            Err(e) => {
                warn!("查询网页用户{}时出错：{}", name, e);
                return Err(AuthFailure::with_cause(
                    FailReason::ErrorWhileCheckingPassword,
                    e,
                ));
            }
        };

        if user.password != password {
            debug!("登录失败，密码不匹配：{}", name);
            return Err(AuthFailure::new(FailReason::UserPassMismatch));
        }
        Ok(WebUser::new(&user.name, user.permission_level))
    }
}

fn decode_basic(header: &str) -> Result<(String, String), AuthFailure> {
    let malformed = || AuthFailure::new(FailReason::MalformedHeader);
    let (scheme, encoded) = header.trim().split_once(' ').ok_or_else(malformed)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(malformed());
    }
    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| malformed())?;
    let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;
    let (name, password) = decoded.split_once(':').ok_or_else(malformed)?;
    Ok((name.to_string(), password.to_string()))
}
