//! Volcengine (ByteDance OpenSpeech) speech recognition.
//!
//! Endpoint variants populate different response fields, so success is
//! accepted on any one of: a non-empty result payload, code 1000, or
//! message "Success".

use crate::config::DEFAULT_VOLC_CLUSTER;
use crate::error::{Result, SummaryError};
use crate::transcribe::{TranscriptSegment, Transcriber};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, error, warn};

/// Short-audio recognition endpoint; also the fallback target.
pub const BASE_ASR_URL: &str = "https://openspeech.bytedance.com/api/v1/asr";

/// Low-latency endpoint used by `_turbo` and `.flash` clusters.
pub const FLASH_ASR_URL: &str =
    "https://openspeech.bytedance.com/api/v3/auc/bigmodel/recognize/flash";

const WORKFLOW: &str = "audio_in,resample,partition,vad,fe,decode,itn,nlu_punctuate";
const USER_ID: &str = "bili_summary_agent";
const SUCCESS_CODE: i64 = 1000;

/// Span given to an untimed result when the response reports no duration.
const UNTIMED_SEGMENT_SPAN: Duration = Duration::from_secs(50);

const CLUSTER_UNAVAILABLE: &str = "no available instances";
const NOT_ALLOWED: &str = "is not allowed";

/// Pick the endpoint for a cluster name.
pub fn endpoint_for_cluster(cluster: &str) -> &'static str {
    if cluster.ends_with("_turbo") || cluster.ends_with(".flash") {
        FLASH_ASR_URL
    } else {
        BASE_ASR_URL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureKind {
    ClusterUnavailable,
    NotAllowed,
    Other,
}

fn classify_failure(message: &str) -> FailureKind {
    if message.contains(CLUSTER_UNAVAILABLE) {
        FailureKind::ClusterUnavailable
    } else if message.contains(NOT_ALLOWED) {
        FailureKind::NotAllowed
    } else {
        FailureKind::Other
    }
}

pub struct VolcClient {
    client: reqwest::Client,
    app_key: String,
    access_key: String,
    cluster: String,
    endpoint: Option<String>,
    fallback_url: String,
}

impl VolcClient {
    pub fn new(app_key: String, access_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            app_key,
            access_key,
            cluster: DEFAULT_VOLC_CLUSTER.to_string(),
            endpoint: None,
            fallback_url: BASE_ASR_URL.to_string(),
        }
    }

    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Override the endpoint derived from the cluster name.
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoint = Some(url.into());
        self
    }

    /// Override the endpoint used for the cluster-less fallback call.
    pub fn with_fallback_url(mut self, url: impl Into<String>) -> Self {
        self.fallback_url = url.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| endpoint_for_cluster(&self.cluster))
    }

    fn build_request<'a>(&'a self, data: &'a str, cluster: Option<&'a str>) -> VolcRequest<'a> {
        VolcRequest {
            app: VolcApp {
                appid: &self.app_key,
                token: &self.access_key,
                cluster,
            },
            user: VolcUser { uid: USER_ID },
            audio: VolcAudio {
                format: "mp3",
                rate: 16000,
                channel: 1,
                cuted: false,
                data,
            },
            request: VolcRequestMeta {
                reqid: uuid::Uuid::new_v4().to_string(),
                workflow: WORKFLOW,
                sequence: 1,
            },
        }
    }

    /// POST one recognition request. With `cluster` set, the resource header is
    /// sent as well.
    async fn post(&self, url: &str, data: &str, cluster: Option<&str>) -> Result<VolcResponse> {
        let request = self.build_request(data, cluster);

        let mut builder = self
            .client
            .post(url)
            .header("X-Api-App-Key", &self.app_key)
            .header("X-Api-Access-Key", &self.access_key)
            .header("X-Api-Request-Id", &request.request.reqid);
        if let Some(cluster) = cluster {
            builder = builder.header("X-Api-Resource-Id", cluster);
        }

        let response = builder.json(&request).send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!("Volc API response status: {}", status);

        if !status.is_success() {
            let message = serde_json::from_str::<VolcResponse>(&body)
                .ok()
                .and_then(|r| r.message().map(str::to_string))
                .unwrap_or(body);
            return Err(SummaryError::Transcription(format!(
                "Volc API error ({status}): {message}"
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn call_primary(&self, data: &str) -> Result<VolcResponse> {
        let response = self
            .post(self.endpoint(), data, Some(self.cluster.as_str()))
            .await?;

        if !response.is_success() {
            return Err(SummaryError::Transcription(format!(
                "Volc API error: {}",
                response.raw_summary()
            )));
        }
        Ok(response)
    }

    async fn call_fallback(&self, data: &str) -> Result<VolcResponse> {
        let response = self.post(&self.fallback_url, data, None).await?;

        if !response.is_fallback_success() {
            return Err(SummaryError::Transcription(format!(
                "Volc API error: {}",
                response.raw_summary()
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transcriber for VolcClient {
    async fn transcribe(&self, audio: &Path, offset: Duration) -> Result<Vec<TranscriptSegment>> {
        let bytes = fs::read(audio).await?;
        let data = base64::engine::general_purpose::STANDARD.encode(&bytes);

        debug!(
            "Transcribing {} with Volc cluster '{}' at {}",
            audio.display(),
            self.cluster,
            self.endpoint()
        );

        let err = match self.call_primary(&data).await {
            Ok(response) => return Ok(response.into_segments(offset)),
            Err(e) => e,
        };

        let message = err.to_string();
        match classify_failure(&message) {
            FailureKind::ClusterUnavailable => {
                warn!(
                    "Volc cluster '{}' unavailable, retrying without cluster",
                    self.cluster
                );
                let response = self.call_fallback(&data).await?;
                Ok(response.into_segments(offset))
            }
            FailureKind::NotAllowed => {
                error!("Volc resource '{}' rejected: {}", self.cluster, message);
                Err(SummaryError::Misconfiguration(format!(
                    "resource '{}' is not supported by the short-audio/flash interface. \
                     Enable \"Short Audio Recognition\" or \"Flash Recognition\" for this app id; \
                     async-only resources such as volc.bigasr.auc need a public audio URL and \
                     cannot be used with local files. ({message})",
                    self.cluster
                )))
            }
            FailureKind::Other => Err(err),
        }
    }

    fn name(&self) -> &'static str {
        "Volcengine ASR"
    }
}

// Request types

#[derive(Serialize)]
struct VolcRequest<'a> {
    app: VolcApp<'a>,
    user: VolcUser<'a>,
    audio: VolcAudio<'a>,
    request: VolcRequestMeta<'a>,
}

#[derive(Serialize)]
struct VolcApp<'a> {
    appid: &'a str,
    token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    cluster: Option<&'a str>,
}

#[derive(Serialize)]
struct VolcUser<'a> {
    uid: &'a str,
}

#[derive(Serialize)]
struct VolcAudio<'a> {
    format: &'a str,
    rate: u32,
    channel: u32,
    cuted: bool,
    data: &'a str,
}

#[derive(Serialize)]
struct VolcRequestMeta<'a> {
    reqid: String,
    workflow: &'a str,
    sequence: u32,
}

// Response types

#[derive(Debug, Default, Deserialize, Serialize)]
struct VolcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result: Option<VolcResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    resp: Option<VolcResp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    audio_info: Option<VolcAudioInfo>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
enum VolcResult {
    Many(Vec<VolcResultItem>),
    One(VolcResultItem),
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct VolcResultItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    utterances: Option<Vec<VolcUtterance>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct VolcResp {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Utterance timing in milliseconds.
#[derive(Debug, Deserialize, Serialize)]
struct VolcUtterance {
    #[serde(default)]
    text: String,
    start_time: u64,
    end_time: u64,
}

#[derive(Debug, Deserialize, Serialize)]
struct VolcAudioInfo {
    /// Milliseconds.
    #[serde(default)]
    duration: Option<u64>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl VolcResponse {
    fn code(&self) -> Option<i64> {
        self.code.or_else(|| self.resp.as_ref().and_then(|r| r.code))
    }

    fn message(&self) -> Option<&str> {
        non_empty(&self.message).or_else(|| self.resp.as_ref().and_then(|r| non_empty(&r.message)))
    }

    fn has_result(&self) -> bool {
        let result = match &self.result {
            Some(VolcResult::Many(items)) => !items.is_empty(),
            Some(VolcResult::One(item)) => non_empty(&item.text).is_some(),
            None => false,
        };
        result || self.resp.as_ref().and_then(|r| non_empty(&r.text)).is_some()
    }

    /// Any one signal suffices.
    fn is_success(&self) -> bool {
        self.has_result() || self.code() == Some(SUCCESS_CODE) || self.message() == Some("Success")
    }

    /// The fallback endpoint always reports a top-level code or message.
    fn is_fallback_success(&self) -> bool {
        self.code == Some(SUCCESS_CODE) || self.message.as_deref() == Some("Success")
    }

    fn first_item(&self) -> Option<&VolcResultItem> {
        match &self.result {
            Some(VolcResult::Many(items)) => items.first(),
            Some(VolcResult::One(item)) => Some(item),
            None => None,
        }
    }

    /// Text from the first populated response shape.
    fn text(&self) -> String {
        let from_result = match &self.result {
            Some(VolcResult::Many(items)) => items.first().map(|i| i.text.clone().unwrap_or_default()),
            Some(VolcResult::One(item)) => non_empty(&item.text).map(str::to_string),
            None => None,
        };
        from_result
            .or_else(|| self.resp.as_ref().and_then(|r| non_empty(&r.text)).map(str::to_string))
            .unwrap_or_default()
    }

    fn raw_summary(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }

    fn into_segments(self, offset: Duration) -> Vec<TranscriptSegment> {
        if let Some(utterances) = self.first_item().and_then(|i| i.utterances.as_ref()) {
            let segments: Vec<TranscriptSegment> = utterances
                .iter()
                .filter(|u| !u.text.trim().is_empty())
                .map(|u| {
                    let start = Duration::from_millis(u.start_time);
                    let end = Duration::from_millis(u.end_time).max(start);
                    TranscriptSegment {
                        start: offset + start,
                        end: offset + end,
                        text: u.text.trim().to_string(),
                    }
                })
                .collect();
            if !segments.is_empty() {
                return segments;
            }
        }

        let text = self.text();
        if text.trim().is_empty() {
            return Vec::new();
        }

        let span = self
            .audio_info
            .as_ref()
            .and_then(|a| a.duration)
            .map(Duration::from_millis)
            .unwrap_or(UNTIMED_SEGMENT_SPAN);

        vec![TranscriptSegment {
            start: offset,
            end: offset + span,
            text: text.trim().to_string(),
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> VolcResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_endpoint_for_cluster() {
        assert_eq!(endpoint_for_cluster("volc_auc_common"), BASE_ASR_URL);
        assert_eq!(endpoint_for_cluster("volc_auc_turbo"), FLASH_ASR_URL);
        assert_eq!(endpoint_for_cluster("volc.bigasr.flash"), FLASH_ASR_URL);
    }

    #[test]
    fn test_endpoint_override() {
        let client = VolcClient::new("a".into(), "t".into())
            .with_cluster("volc.bigasr.flash")
            .with_endpoint("http://localhost/custom");
        assert_eq!(client.endpoint(), "http://localhost/custom");
    }

    #[test]
    fn test_success_by_code_only() {
        let r = parse(r#"{"code": 1000, "message": "ok"}"#);
        assert!(r.is_success());
    }

    #[test]
    fn test_success_by_message_only() {
        let r = parse(r#"{"code": 1013, "message": "Success"}"#);
        assert!(r.is_success());
    }

    #[test]
    fn test_success_by_result_only() {
        let r = parse(r#"{"result": {"text": "你好"}}"#);
        assert!(r.is_success());
        assert_eq!(r.text(), "你好");
    }

    #[test]
    fn test_success_by_nested_resp() {
        let r = parse(r#"{"resp": {"code": 1000, "text": "nested"}}"#);
        assert!(r.is_success());
        assert_eq!(r.text(), "nested");

        let r = parse(r#"{"resp": {"code": 1000}}"#);
        assert!(r.is_success());
    }

    #[test]
    fn test_failure_when_no_signal() {
        let r = parse(r#"{"code": 1001, "message": "invalid request", "result": []}"#);
        assert!(!r.is_success());
    }

    #[test]
    fn test_text_from_result_array() {
        let r = parse(r#"{"code": 1000, "result": [{"text": "first"}, {"text": "second"}]}"#);
        assert_eq!(r.text(), "first");
    }

    #[test]
    fn test_fallback_success_ignores_result() {
        let r = parse(r#"{"result": [{"text": "x"}]}"#);
        assert!(!r.is_fallback_success());
        let r = parse(r#"{"code": 1000, "result": [{"text": "x"}]}"#);
        assert!(r.is_fallback_success());
    }

    #[test]
    fn test_segments_from_utterances() {
        let r = parse(
            r#"{"audio_info": {"duration": 9000},
                "result": {"text": "a b", "utterances": [
                    {"text": "a", "start_time": 0, "end_time": 1500},
                    {"text": " ", "start_time": 1500, "end_time": 2000},
                    {"text": "b", "start_time": 2000, "end_time": 4000}]}}"#,
        );
        let segments = r.into_segments(Duration::from_secs(600));
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, Duration::from_secs(600));
        assert_eq!(segments[0].end, Duration::from_millis(601_500));
        assert_eq!(segments[1].start, Duration::from_secs(602));
    }

    #[test]
    fn test_single_segment_uses_audio_duration() {
        let r = parse(r#"{"audio_info": {"duration": 12000}, "result": {"text": "hello"}}"#);
        let segments = r.into_segments(Duration::from_secs(10));
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, Duration::from_secs(10));
        assert_eq!(segments[0].end, Duration::from_secs(22));
    }

    #[test]
    fn test_single_segment_default_span() {
        let r = parse(r#"{"code": 1000, "result": [{"text": "hello"}]}"#);
        let segments = r.into_segments(Duration::ZERO);
        assert_eq!(segments[0].end, UNTIMED_SEGMENT_SPAN);
    }

    #[test]
    fn test_empty_text_yields_no_segments() {
        let r = parse(r#"{"code": 1000, "message": "Success"}"#);
        assert!(r.into_segments(Duration::ZERO).is_empty());
    }

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure("Volc API error (503): requested grant has no available instances"),
            FailureKind::ClusterUnavailable
        );
        assert_eq!(
            classify_failure("resource volc.bigasr.auc is not allowed"),
            FailureKind::NotAllowed
        );
        assert_eq!(classify_failure("timeout"), FailureKind::Other);
    }

    #[test]
    fn test_request_omits_cluster_when_absent() {
        let client = VolcClient::new("app".into(), "token".into());
        let with = serde_json::to_value(client.build_request("AAA", Some("volc_auc_common"))).unwrap();
        let without = serde_json::to_value(client.build_request("AAA", None)).unwrap();

        assert_eq!(with["app"]["cluster"], "volc_auc_common");
        assert!(without["app"].get("cluster").is_none());
        assert_eq!(without["request"]["workflow"], WORKFLOW);
        assert_eq!(without["audio"]["data"], "AAA");
    }
}
