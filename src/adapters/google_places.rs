use crate::domain::model::{PlaceSummary, RawDetail, SearchPage};
use crate::domain::ports::PlacesApi;
use crate::utils::error::{ApiError, HarvestError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/place";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const DETAIL_FIELDS: &str = "name,formatted_address,formatted_phone_number,\
international_phone_number,website,types,rating,user_ratings_total,price_level,opening_hours";

#[derive(Debug, Deserialize)]
struct TextSearchResponse {
    status: String,
    #[serde(default)]
    results: Vec<TextSearchResult>,
    next_page_token: Option<String>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TextSearchResult {
    place_id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailResponse {
    status: String,
    result: Option<RawDetail>,
    error_message: Option<String>,
}

/// Places Web Service 的 client (text search 與 place details)
#[derive(Clone)]
pub struct GooglePlacesClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for GooglePlacesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GooglePlacesClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl GooglePlacesClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(HarvestError::HttpError)?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> std::result::Result<T, ApiError> {
        let url = format!("{}/{}", self.endpoint, path);
        tracing::debug!("Making places request to: {}", url);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        tracing::debug!("Places response status: {}", status);
        if !status.is_success() {
            return Err(classify_http_status(status));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::transient(format!("unreadable response body: {}", e)))
    }
}

#[async_trait]
impl PlacesApi for GooglePlacesClient {
    async fn search(
        &self,
        query: &str,
        continuation_token: Option<&str>,
    ) -> std::result::Result<SearchPage, ApiError> {
        let mut params = vec![("query", query)];
        if let Some(token) = continuation_token {
            params.push(("pagetoken", token));
        }

        let body: TextSearchResponse = self.get_json("textsearch/json", &params).await?;
        check_status(
            &body.status,
            body.error_message.as_deref(),
            continuation_token.is_some(),
        )?;

        let results = body
            .results
            .into_iter()
            .filter_map(|result| {
                result.place_id.map(|place_id| PlaceSummary {
                    place_id,
                    name: result.name,
                })
            })
            .collect();

        Ok(SearchPage {
            results,
            next_token: body.next_page_token.filter(|token| !token.is_empty()),
        })
    }

    async fn detail(&self, place: &PlaceSummary) -> std::result::Result<RawDetail, ApiError> {
        let params = [
            ("place_id", place.place_id.as_str()),
            ("fields", DETAIL_FIELDS),
        ];
        let body: DetailResponse = self.get_json("details/json", &params).await?;
        check_status(&body.status, body.error_message.as_deref(), false)?;
        Ok(body.result.unwrap_or_default())
    }
}

fn check_status(
    status: &str,
    message: Option<&str>,
    continuation: bool,
) -> std::result::Result<(), ApiError> {
    let detail = || format!("{}: {}", status, message.unwrap_or("no message"));
    match status {
        "OK" | "ZERO_RESULTS" => Ok(()),
        "OVER_QUERY_LIMIT" | "RESOURCE_EXHAUSTED" => Err(ApiError::rate_limited(detail())),
        "REQUEST_DENIED" => Err(ApiError::unauthorized(detail())),
        // 分頁 token 尚未生效時也會回 INVALID_REQUEST，等一下再試即可
        "INVALID_REQUEST" if continuation => Err(ApiError::transient(detail())),
        "INVALID_REQUEST" | "NOT_FOUND" => Err(ApiError::invalid_request(detail())),
        _ => Err(ApiError::transient(detail())),
    }
}

fn classify_http_status(status: StatusCode) -> ApiError {
    let message = format!("HTTP {}", status);
    match status {
        StatusCode::TOO_MANY_REQUESTS => ApiError::rate_limited(message),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::PAYMENT_REQUIRED => {
            ApiError::unauthorized(message)
        }
        s if s.is_server_error() || s == StatusCode::REQUEST_TIMEOUT => {
            ApiError::transient(message)
        }
        _ => ApiError::invalid_request(message),
    }
}

fn classify_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_builder() {
        ApiError::invalid_request(err.to_string())
    } else {
        // 逾時、連線被拒、回應中斷
        ApiError::transient(err.to_string())
    }
}
