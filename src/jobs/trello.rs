//! The open cards of one Trello board, ordered by due date.

use super::{RunSummary, deliver_page, fetcher, subject};
use crate::config::{Paths, Settings, TrelloSettings};
use crate::delivery::Deliver;
use crate::error::{ConfigError, JobError};
use crate::fetch::{DEFAULT_USER_AGENT, Fetcher};
use crate::outputs::html;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Write;
use tracing::{debug, instrument, warn};

pub const BASE_URL: &str = "https://api.trello.com/1";
/// Fallback credentials file, JSON `{api_key, token, board}`.
pub const CREDENTIALS_FILE: &str = "trello";

#[derive(Debug, Clone, Deserialize)]
pub struct TrelloBoard {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrelloList {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrelloCard {
    pub name: String,
    pub short_url: String,
    pub id_list: String,
    #[serde(default)]
    pub due: Option<String>,
}

#[derive(Debug)]
pub struct TrelloTodo {
    credentials: TrelloSettings,
    base_url: String,
    fetcher: Fetcher,
}

impl TrelloTodo {
    pub fn new(credentials: TrelloSettings, base_url: impl Into<String>, fetcher: Fetcher) -> Self {
        Self {
            credentials,
            base_url: base_url.into(),
            fetcher,
        }
    }

    /// Credentials come from the settings, or failing that from `~/.trello`.
    pub fn from_settings(settings: &Settings, paths: &Paths) -> Result<Self, JobError> {
        let credentials = match &settings.trello {
            Some(trello) => trello.clone(),
            None => credentials_file(paths)?,
        };
        Ok(Self::new(credentials, BASE_URL, fetcher(settings, DEFAULT_USER_AGENT)?))
    }

    #[instrument(level = "info", skip_all, fields(board = %self.credentials.board))]
    pub async fn run<D: Deliver>(&self, deliverer: &D) -> Result<RunSummary, JobError> {
        let board_id = self.board_id().await?;
        let lists: HashMap<String, String> = self
            .get::<Vec<TrelloList>>(&format!("boards/{board_id}/lists"), &[("filter", "open")])
            .await?
            .into_iter()
            .map(|l| (l.id, l.name))
            .collect();
        let cards: Vec<TrelloCard> = self.get(&format!("boards/{board_id}/cards"), &[]).await?;
        debug!(lists = lists.len(), cards = cards.len(), "Board loaded");

        let rows = order_cards(cards);
        let summary = RunSummary {
            new_items: rows.len(),
            delivered: 1,
            failed_sources: 0,
        };
        deliver_page(deliverer, &subject("Trello Todo"), &table(&rows, &lists)).await?;
        Ok(summary)
    }

    async fn board_id(&self) -> Result<String, JobError> {
        let boards: Vec<TrelloBoard> = self.get("members/me/boards", &[("filter", "open")]).await?;
        boards
            .into_iter()
            .find(|b| b.name == self.credentials.board)
            .map(|b| b.id)
            .ok_or_else(|| JobError::NotFound(format!("board {:?}", self.credentials.board)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T, JobError> {
        let request = self
            .fetcher
            .get(&format!("{}/{path}", self.base_url))
            .query(&[
                ("key", self.credentials.api_key.as_str()),
                ("token", self.credentials.token.as_str()),
            ])
            .query(query);
        let response = self.fetcher.send(request).await?;
        response.json().await.map_err(|e| JobError::Api(e.to_string()))
    }
}

fn credentials_file(paths: &Paths) -> Result<TrelloSettings, ConfigError> {
    let path = paths.dotfile(CREDENTIALS_FILE);
    let text = std::fs::read_to_string(&path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::Missing("trello")
        } else {
            ConfigError::Read {
                path: path.clone(),
                source,
            }
        }
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json { path, source })
}

/// Cards with a due date, earliest first, then the undated ones in board order.
fn order_cards(cards: Vec<TrelloCard>) -> Vec<(TrelloCard, Option<DateTime<Utc>>)> {
    let (mut dated, undated): (Vec<_>, Vec<_>) = cards
        .into_iter()
        .map(|card| {
            let due = card.due.as_deref().and_then(|d| match DateTime::parse_from_rfc3339(d) {
                Ok(due) => Some(due.with_timezone(&Utc)),
                Err(e) => {
                    warn!(card = %card.name, due = d, error = %e, "Unreadable due date");
                    None
                }
            });
            (card, due)
        })
        .partition(|(_, due)| due.is_some());
    dated.sort_by_key(|(_, due)| *due);
    dated.extend(undated);
    dated
}

fn table(rows: &[(TrelloCard, Option<DateTime<Utc>>)], lists: &HashMap<String, String>) -> String {
    let mut out = String::from("<table>\n<tr>\n    <th>List</th>\n    <th>Task</th>\n    <th>Due date</th>\n</tr>\n");
    for (card, due) in rows {
        let list = lists.get(&card.id_list).map(String::as_str).unwrap_or_default();
        let due = due
            .map(|d| d.format("%Y-%m-%d (%H:%M:%S)").to_string())
            .unwrap_or_default();
        // Writing to a String cannot fail.
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td>{due}</td></tr>",
            html_escape::encode_text(list),
            html::link(&card.short_url, &card.name)
        );
    }
    out.push_str("\n</table>");
    out
}
