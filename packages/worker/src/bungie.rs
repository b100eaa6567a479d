//! Bungie.net Platform client implementing the engine's stats capability.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::config::BungieConfig;
use config::ConfigError;
use race_engine::stats::{
    ActivityReport, ActivitySummary, BungieName, Membership, ReportEntry, StatsClient, StatsError,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::debug;

use crate::error::{Result, WorkerError};

/// `ErrorCode` of a successful platform response.
const SUCCESS: i64 = 1;
/// Platform error code for a carnage report that does not exist.
const PGCR_NOT_FOUND: i64 = 1653;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope<T> {
    response: Option<T>,
    error_code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoCard {
    membership_type: i32,
    membership_id: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    #[serde(default)]
    characters: Option<CharacterComponent>,
}

#[derive(Debug, Deserialize)]
struct CharacterComponent {
    #[serde(default)]
    data: BTreeMap<String, IgnoredAny>,
}

#[derive(Debug, Deserialize)]
struct ActivityHistory {
    #[serde(default)]
    activities: Vec<HistoricalActivity>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoricalActivity {
    period: DateTime<Utc>,
    activity_details: ActivityDetails,
    #[serde(default)]
    values: HashMap<String, StatValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivityDetails {
    #[serde(default)]
    reference_id: u64,
    instance_id: String,
}

#[derive(Debug, Deserialize)]
struct StatValue {
    basic: BasicValue,
}

#[derive(Debug, Deserialize)]
struct BasicValue {
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarnageReport {
    activity_details: ActivityDetails,
    #[serde(default)]
    activity_was_started_from_beginning: bool,
    #[serde(default)]
    entries: Vec<CarnageEntry>,
}

#[derive(Debug, Deserialize)]
struct CarnageEntry {
    player: CarnagePlayer,
    #[serde(default)]
    values: HashMap<String, StatValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CarnagePlayer {
    destiny_user_info: DestinyUserInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DestinyUserInfo {
    #[serde(default)]
    bungie_global_display_name: Option<String>,
    #[serde(default)]
    bungie_global_display_name_code: Option<u16>,
}

fn stat(values: &HashMap<String, StatValue>, key: &str) -> f64 {
    values.get(key).map(|v| v.basic.value).unwrap_or(0.0)
}

fn secs(value: f64) -> u64 {
    value.max(0.0).round() as u64
}

impl From<HistoricalActivity> for ActivitySummary {
    fn from(a: HistoricalActivity) -> Self {
        ActivitySummary {
            reference_id: a.activity_details.reference_id,
            instance_id: a.activity_details.instance_id,
            period: a.period,
            completed: stat(&a.values, "completed") >= 1.0,
            duration_secs: secs(stat(&a.values, "activityDurationSeconds")),
        }
    }
}

impl From<CarnageReport> for ActivityReport {
    fn from(r: CarnageReport) -> Self {
        let entries = r
            .entries
            .into_iter()
            .map(|e| {
                let info = e.player.destiny_user_info;
                let player = match (info.bungie_global_display_name, info.bungie_global_display_name_code) {
                    (Some(name), Some(code)) if !name.is_empty() => Some(format!("{name}#{code:04}")),
                    _ => None,
                };
                ReportEntry {
                    player,
                    time_played_secs: secs(stat(&e.values, "timePlayedSeconds")),
                    activity_duration_secs: secs(stat(&e.values, "activityDurationSeconds")),
                }
            })
            .collect();

        ActivityReport {
            instance_id: r.activity_details.instance_id,
            started_from_beginning: r.activity_was_started_from_beginning,
            entries,
        }
    }
}

/// Decode a platform envelope, mapping transport status and `ErrorCode` to [`StatsError`].
fn parse_envelope<T: DeserializeOwned>(status: u16, body: &[u8]) -> std::result::Result<Option<T>, StatsError> {
    let envelope: Envelope<T> = match serde_json::from_slice(body) {
        Ok(env) => env,
        Err(_) if !(200..300).contains(&status) => return Err(StatsError::Http { status }),
        Err(e) => return Err(StatsError::Decode(e.to_string())),
    };

    if envelope.error_code != SUCCESS {
        return Err(StatsError::Api {
            code: envelope.error_code,
            message: envelope.message,
        });
    }
    if !(200..300).contains(&status) {
        return Err(StatsError::Http { status });
    }
    Ok(envelope.response)
}

pub struct BungieClient {
    http: Client,
    base_url: String,
    page_size: u32,
}

impl BungieClient {
    pub fn new(config: &BungieConfig) -> Result<Self> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(WorkerError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key).map_err(|_| {
            WorkerError::Config(ConfigError::Message(
                "bungie.api_key contains invalid characters".into(),
            ))
        })?;
        headers.insert("X-API-Key", key);

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            page_size: config.page_size,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
    ) -> std::result::Result<Option<T>, StatsError> {
        let resp = req
            .send()
            .await
            .map_err(|e| StatsError::Transport(e.to_string()))?;
        let status = resp.status().as_u16();
        let body = resp
            .bytes()
            .await
            .map_err(|e| StatsError::Transport(e.to_string()))?;
        parse_envelope(status, &body)
    }
}

#[async_trait]
impl StatsClient for BungieClient {
    async fn search_player(&self, name: &BungieName) -> std::result::Result<Membership, StatsError> {
        let req = self
            .http
            .post(self.url("/Destiny2/SearchDestinyPlayerByBungieName/-1/"))
            .json(&serde_json::json!({
                "displayName": name.display_name,
                "displayNameCode": name.code,
            }));

        let cards: Vec<UserInfoCard> = self.call(req).await?.unwrap_or_default();
        let card = cards
            .into_iter()
            .next()
            .ok_or_else(|| StatsError::NotFound(format!("{}#{:04}", name.display_name, name.code)))?;

        Ok(Membership {
            membership_type: card.membership_type,
            membership_id: card.membership_id,
        })
    }

    async fn list_characters(&self, membership: &Membership) -> std::result::Result<Vec<String>, StatsError> {
        let req = self
            .http
            .get(self.url(&format!(
                "/Destiny2/{}/Profile/{}/",
                membership.membership_type, membership.membership_id
            )))
            .query(&[("components", "200")]);

        let profile: Option<ProfileResponse> = self.call(req).await?;
        Ok(profile
            .and_then(|p| p.characters)
            .map(|c| c.data.into_keys().collect())
            .unwrap_or_default())
    }

    async fn list_recent_activities(
        &self,
        membership: &Membership,
        character_id: &str,
        activity_mode: u32,
        page: u32,
    ) -> std::result::Result<Vec<ActivitySummary>, StatsError> {
        let req = self
            .http
            .get(self.url(&format!(
                "/Destiny2/{}/Account/{}/Character/{character_id}/Stats/Activities/",
                membership.membership_type, membership.membership_id
            )))
            .query(&[
                ("mode", activity_mode),
                ("count", self.page_size),
                ("page", page),
            ]);

        let history: Option<ActivityHistory> = self.call(req).await?;
        let activities: Vec<ActivitySummary> = history
            .map(|h| h.activities.into_iter().map(Into::into).collect())
            .unwrap_or_default();
        debug!(character_id, page, count = activities.len(), "Fetched activity page");
        Ok(activities)
    }

    async fn get_full_report(
        &self,
        instance_id: &str,
    ) -> std::result::Result<Option<ActivityReport>, StatsError> {
        let req = self
            .http
            .get(self.url(&format!("/Destiny2/Stats/PostGameCarnageReport/{instance_id}/")));

        match self.call::<CarnageReport>(req).await {
            Ok(report) => Ok(report.map(Into::into)),
            Err(StatsError::Http { status: 404 }) => Ok(None),
            Err(StatsError::Api { code: PGCR_NOT_FOUND, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
