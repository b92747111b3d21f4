//! HTTP client for the niconico user-program ("unama") API, the community
//! profile API, and the nicoad statistics API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use namacast_core::program::USER_PROGRAM_GROUP_PREFIX;
use namacast_core::{
    AdStatistics, ApiConfig, BroadcastApi, CommunityDetail, Config, ConnectionCoordinates,
    CoreError, CreateOutcome, EndTime, LiveStatistics, OperatorComment, ProgramDetail,
    ProgramStatus, ProgramTimes, Result, ScheduleEntry,
};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests (10 seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default number of retry attempts for read requests
const DEFAULT_MAX_RETRIES: u32 = 3;
/// User agent for requests
const USER_AGENT: &str = "Namacast/0.1 (https://github.com/namacast/namacast)";
/// Error code the provider returns when the account already has a reservation
const DUPLICATED_ERROR_CODE: &str = "DUPLICATED";
/// Minutes added per extension request; the provider only accepts this step
const EXTENSION_MINUTES: u32 = 30;

/// HTTP adapter for the niconico live APIs.
///
/// Read endpoints go through a retrying client. Mutations are sent exactly
/// once: a replayed segment change or extension is not harmless, so they
/// bypass the retry layer.
pub struct NicoApi {
    client: ClientWithMiddleware,
    mutation_client: reqwest::Client,
    user_session: String,
    api: ApiConfig,
}

impl NicoApi {
    /// Create an adapter from a session cookie value and endpoint configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(user_session: impl Into<String>, api: ApiConfig) -> Result<Self> {
        // Base client with timeout
        let base_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(USER_AGENT)
            .build()?;

        // Wrap with retry middleware (exponential backoff) for read requests
        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(DEFAULT_MAX_RETRIES);
        let client = ClientBuilder::new(base_client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            mutation_client: base_client,
            user_session: user_session.into(),
            api,
        })
    }

    /// Create an adapter from loaded configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.session.user_session.clone(), config.api.clone())
    }

    fn cookie(&self) -> String {
        format!("user_session={}", self.user_session)
    }

    fn get(&self, url: &str) -> reqwest_middleware::RequestBuilder {
        self.client.get(url).header("Cookie", self.cookie())
    }

    fn put(&self, url: &str) -> reqwest::RequestBuilder {
        self.mutation_client.put(url).header("Cookie", self.cookie())
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.mutation_client.post(url).header("Cookie", self.cookie())
    }

    /// The profile API wants the bare community number, not the prefixed id.
    fn community_profile_url(&self, group_id: &str) -> String {
        let community_number = group_id
            .strip_prefix(USER_PROGRAM_GROUP_PREFIX)
            .unwrap_or(group_id);
        format!(
            "{}/api/v1/communities/{}/profile",
            self.api.community_base_url, community_number
        )
    }

    async fn put_segment(&self, program_id: &str, state: ProgramStatus) -> Result<SegmentDto> {
        let url = format!(
            "{}/unama/watch/{}/segment",
            self.api.live_base_url, program_id
        );
        let response = self
            .put(&url)
            .json(&json!({ "state": state.as_str() }))
            .send()
            .await?;
        expect_data(read_envelope(response).await?)
    }
}

#[async_trait]
impl BroadcastApi for NicoApi {
    async fn create_program(&self) -> Result<CreateOutcome> {
        let url = format!("{}/unama/api/v2/programs", self.api.live_base_url);
        info!("Requesting a new program reservation");
        let response = self.post(&url).json(&json!({})).send().await?;
        let envelope: Envelope<CreatedProgramDto> = read_envelope(response).await?;
        if let Some(data) = &envelope.data {
            debug!("Provider assigned program id {}", data.id);
        }
        create_outcome(envelope.meta)
    }

    async fn fetch_schedules(&self) -> Result<Vec<ScheduleEntry>> {
        let url = format!(
            "{}/unama/tool/v2/programs/schedules",
            self.api.live_base_url
        );
        debug!("GET {url}");
        let response = self.get(&url).send().await?;
        let schedules: Vec<ScheduleDto> = expect_data(read_envelope(response).await?)?;
        debug!("Provider returned {} schedule entries", schedules.len());
        Ok(schedules.into_iter().map(ScheduleEntry::from).collect())
    }

    async fn fetch_program(&self, program_id: &str) -> Result<ProgramDetail> {
        let url = format!(
            "{}/unama/watch/{}/programinfo",
            self.api.live_base_url, program_id
        );
        debug!("GET {url}");
        let response = self.get(&url).send().await?;
        let detail: ProgramInfoDto = expect_data(read_envelope(response).await?)?;
        Ok(detail.into_detail(program_id))
    }

    async fn fetch_community(&self, group_id: &str) -> Result<CommunityDetail> {
        let url = self.community_profile_url(group_id);
        debug!("GET {url}");
        let response = self.get(&url).send().await?;
        let profile: CommunityProfileDto = expect_data(read_envelope(response).await?)?;
        Ok(CommunityDetail {
            name: profile.name,
            icon_url: profile.icon_url,
        })
    }

    async fn edit_program(&self, program_id: &str) -> Result<()> {
        let url = format!(
            "{}/unama/api/v2/programs/{}",
            self.api.live_base_url, program_id
        );
        info!("Pushing program edits to the provider");
        let response = self.put(&url).json(&json!({})).send().await?;
        expect_success(read_envelope(response).await?)
    }

    async fn start_program(&self, program_id: &str) -> Result<ProgramTimes> {
        info!("Putting program {program_id} on air");
        let segment = self.put_segment(program_id, ProgramStatus::OnAir).await?;
        let start_time = segment.begin_at.ok_or_else(|| CoreError::Decode {
            reason: "segment response has no beginAt".to_string(),
        })?;
        Ok(ProgramTimes {
            start_time,
            end_time: segment.end_at,
        })
    }

    async fn end_program(&self, program_id: &str) -> Result<EndTime> {
        info!("Ending program {program_id}");
        let segment = self.put_segment(program_id, ProgramStatus::End).await?;
        Ok(EndTime {
            end_time: segment.end_at,
        })
    }

    async fn extend_program(&self, program_id: &str) -> Result<EndTime> {
        let url = format!(
            "{}/unama/watch/{}/extension",
            self.api.live_base_url, program_id
        );
        info!("Extending program {program_id} by {EXTENSION_MINUTES} minutes");
        let response = self
            .post(&url)
            .json(&json!({ "minutes": EXTENSION_MINUTES }))
            .send()
            .await?;
        let extension: ExtensionDto = expect_data(read_envelope(response).await?)?;
        Ok(EndTime {
            end_time: extension.end_at,
        })
    }

    async fn fetch_statistics(&self, program_id: &str) -> Result<LiveStatistics> {
        let url = format!(
            "{}/unama/watch/{}/statistics",
            self.api.live_base_url, program_id
        );
        debug!("GET {url}");
        let response = self.get(&url).send().await?;
        let statistics: LiveStatisticsDto = expect_data(read_envelope(response).await?)?;
        Ok(LiveStatistics {
            viewers: statistics.watch_count,
            comments: statistics.comment_count,
        })
    }

    async fn fetch_ad_statistics(&self, program_id: &str) -> Result<AdStatistics> {
        let url = format!(
            "{}/v1/live/programs/{}/statistics",
            self.api.ad_base_url, program_id
        );
        debug!("GET {url}");
        let response = self.get(&url).send().await?;
        let statistics: AdStatisticsDto = expect_data(read_envelope(response).await?)?;
        Ok(AdStatistics {
            ad_points: statistics.total_ad_point,
            gift_points: statistics.total_gift_point,
        })
    }

    async fn send_operator_comment(
        &self,
        program_id: &str,
        comment: &OperatorComment,
    ) -> Result<()> {
        let url = format!(
            "{}/unama/watch/{}/operator_comment",
            self.api.live_base_url, program_id
        );
        debug!("Publishing operator comment ({} chars)", comment.text.len());
        let body = OperatorCommentBody {
            text: &comment.text,
            name: comment.name.as_deref(),
            is_permanent: comment.is_permanent,
        };
        let response = self.put(&url).json(&body).send().await?;
        expect_success(read_envelope(response).await?)
    }
}

/// Response status block shared by every provider endpoint.
#[derive(Debug, Deserialize)]
struct Meta {
    status: i64,
    #[serde(rename = "errorCode")]
    error_code: Option<String>,
}

impl Meta {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_error(self) -> CoreError {
        let code = self.error_code.unwrap_or_else(|| self.status.to_string());
        warn!("Provider refused the request: {code}");
        CoreError::Api { code }
    }
}

/// Standard `meta`/`data` wrapper around every provider response body.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    meta: Meta,
    data: Option<T>,
}

/// Decode a response body into an envelope.
///
/// The provider serves plain error pages for auth and routing problems, so a
/// body that is not an envelope is reported under the HTTP status code
/// unless the request itself succeeded.
async fn read_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<Envelope<T>> {
    let http_status = response.status();
    let body = response.text().await?;
    match serde_json::from_str(&body) {
        Ok(envelope) => Ok(envelope),
        Err(e) if http_status.is_success() => Err(CoreError::Decode {
            reason: e.to_string(),
        }),
        Err(_) => {
            warn!("Provider returned HTTP {http_status} with a non-envelope body");
            Err(CoreError::Api {
                code: http_status.as_u16().to_string(),
            })
        }
    }
}

fn expect_data<T>(envelope: Envelope<T>) -> Result<T> {
    if !envelope.meta.is_success() {
        return Err(envelope.meta.into_error());
    }
    envelope.data.ok_or_else(|| CoreError::Decode {
        reason: "envelope carries no data".to_string(),
    })
}

fn expect_success(envelope: Envelope<serde_json::Value>) -> Result<()> {
    if envelope.meta.is_success() {
        Ok(())
    } else {
        Err(envelope.meta.into_error())
    }
}

/// An existing reservation is reported as an error code, not a failure.
fn create_outcome(meta: Meta) -> Result<CreateOutcome> {
    if meta.is_success() {
        return Ok(CreateOutcome::Created);
    }
    if meta.error_code.as_deref() == Some(DUPLICATED_ERROR_CODE) {
        info!("A program reservation already exists");
        return Ok(CreateOutcome::AlreadyExists);
    }
    Err(meta.into_error())
}

#[derive(Debug, Deserialize)]
struct CreatedProgramDto {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleDto {
    program_id: String,
    social_group_id: String,
    #[serde(default)]
    title: String,
    test_begin_at: DateTime<FixedOffset>,
    on_air_begin_at: DateTime<FixedOffset>,
    on_air_end_at: DateTime<FixedOffset>,
}

impl From<ScheduleDto> for ScheduleEntry {
    fn from(dto: ScheduleDto) -> Self {
        Self {
            program_id: dto.program_id,
            group_id: dto.social_group_id,
            title: dto.title,
            test_begin_at: dto.test_begin_at.timestamp(),
            on_air_begin_at: dto.on_air_begin_at.timestamp(),
            on_air_end_at: dto.on_air_end_at.timestamp(),
        }
    }
}

/// Program detail as served by the `programinfo` endpoint.
///
/// Unlike schedules, this endpoint reports times as unix seconds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgramInfoDto {
    status: ProgramStatus,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    social_group_id: String,
    begin_at: i64,
    end_at: i64,
    #[serde(default)]
    test_begin_at: i64,
    #[serde(default)]
    rooms: Vec<RoomDto>,
}

impl ProgramInfoDto {
    fn into_detail(self, program_id: &str) -> ProgramDetail {
        ProgramDetail {
            program_id: program_id.to_string(),
            status: self.status,
            title: self.title,
            description: self.description,
            group_id: self.social_group_id,
            start_time: self.begin_at,
            end_time: self.end_at,
            test_start_time: self.test_begin_at,
            room: self.rooms.into_iter().find_map(RoomDto::into_coordinates),
        }
    }
}

/// Rooms gain their fields one by one while the server allocates them, so
/// both may be missing on an early fetch.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomDto {
    web_socket_uri: Option<String>,
    thread_id: Option<ThreadId>,
}

impl RoomDto {
    fn into_coordinates(self) -> Option<ConnectionCoordinates> {
        Some(ConnectionCoordinates {
            room_url: self.web_socket_uri?,
            room_thread_id: self.thread_id?.into_string(),
        })
    }
}

/// Thread ids arrive as bare numbers from older rooms and as opaque strings
/// from newer ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ThreadId {
    Number(i64),
    Text(String),
}

impl ThreadId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommunityProfileDto {
    name: String,
    #[serde(default)]
    icon_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SegmentDto {
    begin_at: Option<i64>,
    end_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionDto {
    end_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LiveStatisticsDto {
    #[serde(default)]
    watch_count: i64,
    #[serde(default)]
    comment_count: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdStatisticsDto {
    #[serde(default)]
    total_ad_point: i64,
    #[serde(default)]
    total_gift_point: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OperatorCommentBody<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    is_permanent: bool,
}
