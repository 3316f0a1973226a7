// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 页面渲染
//!
//! 管线把“生成正文”视为不透明的协作调用：[`PageRenderer`] 接收已经查询好的数据，
//! 返回 HTML 字符串或 JSON 值。[`HtmlPageRenderer`] 是基于 [`HtmlBuilder`] 的朴素实现。

use std::collections::HashMap;

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::exception::GenerationError;
use crate::store::{PlayerRecord, ServerRecord};
use crate::util::{escape_html, format_duration, HtmlBuilder};

/// `/json/<tab>` 可用的标签页名称。
pub const JSON_TABS: [&str; 3] = ["sessions", "online-activity", "performance"];

pub trait PageRenderer: Send + Sync {
    fn player_page(
        &self,
        player: &PlayerRecord,
        servers: &[ServerRecord],
    ) -> Result<String, GenerationError>;

    fn raw_player(&self, player: &PlayerRecord) -> Result<Value, GenerationError>;

    fn server_page(
        &self,
        server: &ServerRecord,
        players: &[PlayerRecord],
    ) -> Result<String, GenerationError>;

    fn network_page(
        &self,
        servers: &[ServerRecord],
        players: &[PlayerRecord],
    ) -> Result<String, GenerationError>;

    fn players_page(&self, players: &[PlayerRecord]) -> Result<String, GenerationError>;

    /// `server` 为 `None` 时生成全网数据。
    fn tab(
        &self,
        tab: &str,
        server: Option<&ServerRecord>,
        players: &[PlayerRecord],
    ) -> Result<Value, GenerationError>;
}

pub struct HtmlPageRenderer;

impl HtmlPageRenderer {
    fn player_rows(players: &[PlayerRecord]) -> String {
        let mut rows = String::new();
        for player in players {
            let name = escape_html(&player.name);
            rows.push_str(&format!(
                r#"<tr><td><a href="/player/{}">{}</a></td><td>{}</td><td>{}</td></tr>"#,
                player.uuid,
                name,
                format_duration(player.playtime_ms()),
                player.last_seen.format("%Y-%m-%d %H:%M"),
            ));
        }
        rows
    }
}

impl PageRenderer for HtmlPageRenderer {
    fn player_page(
        &self,
        player: &PlayerRecord,
        servers: &[ServerRecord],
    ) -> Result<String, GenerationError> {
        let names: HashMap<Uuid, &str> = servers.iter().map(|s| (s.uuid, s.name.as_str())).collect();
        let mut sessions = String::new();
        for session in &player.sessions {
            let server = names.get(&session.server).copied().unwrap_or("Unknown");
            sessions.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape_html(server),
                session.start.format("%Y-%m-%d %H:%M"),
                format_duration(session.length_ms),
            ));
        }
        let body = format!(
            r"<h1>{}</h1>
            <p>Registered {} · Last seen {}</p>
            <p>Playtime {} · Kills {} · Deaths {}</p>
            <table><tr><th>Server</th><th>Start</th><th>Length</th></tr>{}</table>",
            escape_html(&player.name),
            player.registered.format("%Y-%m-%d"),
            player.last_seen.format("%Y-%m-%d %H:%M"),
            format_duration(player.playtime_ms()),
            player.kills,
            player.deaths,
            sessions,
        );
        Ok(HtmlBuilder::new(&player.name, body).build())
    }

    fn raw_player(&self, player: &PlayerRecord) -> Result<Value, GenerationError> {
        let mut value = serde_json::to_value(player)?;
        if let Value::Object(map) = &mut value {
            map.insert("playtime_ms".to_string(), json!(player.playtime_ms()));
        }
        Ok(value)
    }

    fn server_page(
        &self,
        server: &ServerRecord,
        players: &[PlayerRecord],
    ) -> Result<String, GenerationError> {
        let visitors: Vec<PlayerRecord> = players
            .iter()
            .filter(|p| p.sessions.iter().any(|s| s.server == server.uuid))
            .cloned()
            .collect();
        let body = format!(
            r"<h1>{}</h1>
            <p>Online {} / {}</p>
            <table><tr><th>Player</th><th>Playtime</th><th>Last seen</th></tr>{}</table>",
            escape_html(&server.name),
            server.players_online,
            server.max_players,
            Self::player_rows(&visitors),
        );
        Ok(HtmlBuilder::new(&server.name, body).build())
    }

    fn network_page(
        &self,
        servers: &[ServerRecord],
        players: &[PlayerRecord],
    ) -> Result<String, GenerationError> {
        let mut rows = String::new();
        for server in servers {
            rows.push_str(&format!(
                r#"<tr><td><a href="/server/{}">{}</a></td><td>{}</td><td>{}</td></tr>"#,
                server.uuid,
                escape_html(&server.name),
                if server.is_proxy { "Proxy" } else { "Server" },
                server.players_online,
            ));
        }
        let online: u32 = servers.iter().filter(|s| s.is_proxy).map(|s| s.players_online).sum();
        let body = format!(
            r"<h1>Network</h1>
            <p>{} unique players · {} online</p>
            <table><tr><th>Server</th><th>Type</th><th>Online</th></tr>{}</table>",
            players.len(),
            online,
            rows,
        );
        Ok(HtmlBuilder::new("Network", body).build())
    }

    fn players_page(&self, players: &[PlayerRecord]) -> Result<String, GenerationError> {
        let body = format!(
            r"<h1>Players</h1>
            <table><tr><th>Player</th><th>Playtime</th><th>Last seen</th></tr>{}</table>",
            Self::player_rows(players),
        );
        Ok(HtmlBuilder::new("Players", body).build())
    }

    fn tab(
        &self,
        tab: &str,
        server: Option<&ServerRecord>,
        players: &[PlayerRecord],
    ) -> Result<Value, GenerationError> {
        let on_server = |uuid: &Uuid| server.map_or(true, |s| s.uuid == *uuid);
        match tab {
            "sessions" => {
                let mut sessions: Vec<Value> = Vec::new();
                for player in players {
                    for session in player.sessions.iter().filter(|s| on_server(&s.server)) {
                        sessions.push(json!({
                            "player": player.name,
                            "server": session.server,
                            "start": session.start,
                            "length_ms": session.length_ms,
                        }));
                    }
                }
                Ok(json!({ "sessions": sessions }))
            }
            "online-activity" => {
                let now = Utc::now();
                let seen_within = |days: i64| {
                    players
                        .iter()
                        .filter(|p| p.sessions.iter().any(|s| on_server(&s.server)))
                        .filter(|p| now - p.last_seen <= Duration::days(days))
                        .count()
                };
                Ok(json!({
                    "active_day": seen_within(1),
                    "active_week": seen_within(7),
                    "active_month": seen_within(30),
                }))
            }
            "performance" => match server {
                Some(s) => Ok(json!({
                    "server": s.name,
                    "players_online": s.players_online,
                    "max_players": s.max_players,
                })),
                None => Err(GenerationError::Render(
                    "performance tab requires a server".to_string(),
                )),
            },
            other => Err(GenerationError::Render(format!("unknown tab {}", other))),
        }
    }
}
