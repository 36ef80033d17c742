//! Reminder of the correspondence games where it is my move.

use super::{RunSummary, comics, deliver_page, fetcher, subject};
use crate::config::{Paths, Settings};
use crate::delivery::Deliver;
use crate::error::{ConfigError, JobError};
use crate::fetch::Fetcher;
use html_escape::encode_text;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

pub const API_URL: &str = "https://lichess.org/api/account/playing";
pub const GAME_URL: &str = "https://lichess.org";
/// Fallback token file holding the token on its first line.
pub const TOKEN_FILE: &str = "lichesst";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Playing {
    #[serde(default)]
    now_playing: Vec<LichessGame>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LichessGame {
    pub full_id: String,
    #[serde(default)]
    pub is_my_turn: bool,
    pub opponent: Opponent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Opponent {
    #[serde(default)]
    pub username: String,
}

#[derive(Debug)]
pub struct Lichess {
    token: String,
    api_url: String,
    fetcher: Fetcher,
}

impl Lichess {
    pub fn new(token: String, api_url: impl Into<String>, fetcher: Fetcher) -> Self {
        Self {
            token,
            api_url: api_url.into(),
            fetcher,
        }
    }

    /// The token comes from the settings, or failing that from `~/.lichesst`.
    pub fn from_settings(settings: &Settings, paths: &Paths) -> Result<Self, JobError> {
        let token = match &settings.lichess {
            Some(lichess) => lichess.token.clone(),
            None => token_file(paths)?,
        };
        Ok(Self::new(token, API_URL, fetcher(settings, comics::USER_AGENT)?))
    }

    #[instrument(level = "info", skip_all)]
    pub async fn run<D: Deliver>(&self, deliverer: &D) -> Result<RunSummary, JobError> {
        let mut summary = RunSummary::default();
        let games = match self.my_turn().await {
            Ok(games) => games,
            Err(e) => {
                warn!(error = %e, "Ongoing games could not be fetched");
                summary.failed_sources = 1;
                return Ok(summary);
            }
        };

        summary.new_items = games.len();
        if games.is_empty() {
            info!("Not my move anywhere");
            return Ok(summary);
        }

        deliver_page(deliverer, &subject("Lichess"), &games_html(&games)).await?;
        summary.delivered = 1;
        Ok(summary)
    }

    async fn my_turn(&self) -> Result<Vec<LichessGame>, JobError> {
        let request = self.fetcher.get(&self.api_url).bearer_auth(&self.token);
        let response = self.fetcher.send(request).await?;
        let playing: Playing = response
            .json()
            .await
            .map_err(|e| JobError::Api(e.to_string()))?;
        debug!(games = playing.now_playing.len(), "Ongoing games");
        Ok(playing
            .now_playing
            .into_iter()
            .filter(|g| g.is_my_turn)
            .collect())
    }
}

fn token_file(paths: &Paths) -> Result<String, JobError> {
    let path = paths.dotfile(TOKEN_FILE);
    let text = std::fs::read_to_string(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::Missing("lichess.token")
        } else {
            ConfigError::Read { path, source: e }
        }
    })?;
    text.lines()
        .next()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .ok_or(JobError::Config(ConfigError::Missing("lichess.token")))
}

fn games_html(games: &[LichessGame]) -> String {
    let items: String = games
        .iter()
        .map(|g| {
            format!(
                r#"<li><i>{}</i>: <a href="{GAME_URL}/{}">Go to game</a></li>"#,
                encode_text(&g.opponent.username),
                encode_text(&g.full_id)
            )
        })
        .collect();
    format!("<p>My turn in game vs.:</p><ul>{items}</ul>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::testing::Recorder;

    const PLAYING: &str = r#"{"nowPlaying": [
        {"fullId": "abcd1234wxyz", "isMyTurn": true, "opponent": {"username": "magnus"}},
        {"fullId": "efgh5678", "isMyTurn": false, "opponent": {"username": "hikaru"}}
    ]}"#;

    fn job(server: &mockito::Server) -> Lichess {
        Lichess::new(
            "lip_token".into(),
            format!("{}/api/account/playing", server.url()),
            Fetcher::new(comics::USER_AGENT, 5).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_lists_games_on_my_move() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/account/playing")
            .match_header("authorization", "Bearer lip_token")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(PLAYING)
            .create_async()
            .await;

        let recorder = Recorder::default();
        let summary = job(&server).run(&recorder).await.unwrap();
        mock.assert_async().await;

        assert_eq!(summary.new_items, 1);
        let (subject, body) = &recorder.sent()[0];
        assert!(subject.starts_with("Lichess "));
        assert!(body.contains("<p>My turn in game vs.:</p><ul>"));
        assert!(body.contains(
            r#"<li><i>magnus</i>: <a href="https://lichess.org/abcd1234wxyz">Go to game</a></li>"#
        ));
        assert!(!body.contains("hikaru"));
    }

    #[tokio::test]
    async fn test_no_mail_when_waiting() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/account/playing")
            .with_status(200)
            .with_body(r#"{"nowPlaying": []}"#)
            .create_async()
            .await;

        let recorder = Recorder::default();
        job(&server).run(&recorder).await.unwrap();
        assert!(recorder.sent().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_sends_nothing() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/account/playing")
            .with_status(401)
            .create_async()
            .await;

        let recorder = Recorder::default();
        let summary = job(&server).run(&recorder).await.unwrap();
        assert_eq!(summary.failed_sources, 1);
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn test_token_file_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::new(dir.path());
        assert!(matches!(
            token_file(&paths),
            Err(JobError::Config(ConfigError::Missing("lichess.token")))
        ));

        std::fs::write(paths.dotfile(TOKEN_FILE), "lip_abc\n").unwrap();
        assert_eq!(token_file(&paths).unwrap(), "lip_abc");
    }
}
