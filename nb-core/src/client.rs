use std::time::Duration;

use bytes::Bytes;
use nb_api::v1::Page;
use nb_api::{
    ReleaseTrack,
    Service,
};
use reqwest::{
    Method,
    RequestBuilder,
    StatusCode,
    header,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::*;
use url::Url;

use crate::constants::*;
use crate::errors::*;
use crate::properties::Properties;

const HTTP_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{method} {url} failed with HTTP {status}: {message}")]
    Http {
        method: Method,
        url: String,
        status: u16,
        message: String,
    },

    #[error("{method} {url} failed: {source}")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Transport { source, .. } => source.status().map(|s| s.as_u16()),
        }
    }

    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http { status, .. } => *status == 429 || *status >= 500,
            ApiError::Transport { source, .. } => source.is_timeout() || source.is_connect(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

pub fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>().is_some_and(ApiError::is_transient)
}

pub fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>().is_some_and(ApiError::is_not_found)
}

pub fn http_status(err: &anyhow::Error) -> Option<u16> {
    err.downcast_ref::<ApiError>().and_then(ApiError::status)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiEndpoints {
    pub builds: Url,
    pub containers: Url,
    pub compute: Url,
    pub storage: Url,
}

impl ApiEndpoints {
    pub fn from_properties(props: &Properties) -> anyhow::Result<ApiEndpoints> {
        let pick = |name: &str, default: &str| -> anyhow::Result<Url> {
            let value = props.resolve(&format!("api_endpoint_overrides/{name}"))?;
            parse_base_url(value.as_deref().unwrap_or(default))
        };

        Ok(ApiEndpoints {
            builds: pick("builds", DEFAULT_BUILDS_ENDPOINT)?,
            containers: pick("containers", DEFAULT_CONTAINERS_ENDPOINT)?,
            compute: pick("compute", DEFAULT_COMPUTE_ENDPOINT)?,
            storage: pick("storage", DEFAULT_STORAGE_ENDPOINT)?,
        })
    }

    /// Points every service at the same base URL; used for local fakes.
    pub fn all(base: &str) -> anyhow::Result<ApiEndpoints> {
        let url = parse_base_url(base)?;
        Ok(ApiEndpoints {
            builds: url.clone(),
            containers: url.clone(),
            compute: url.clone(),
            storage: url,
        })
    }

    pub fn base(&self, service: Service) -> &Url {
        match service {
            Service::Builds => &self.builds,
            Service::Containers => &self.containers,
            Service::Compute => &self.compute,
            Service::Storage => &self.storage,
        }
    }
}

// Url::join drops the last path segment of a base without a trailing slash, so normalize here.
fn parse_base_url(s: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(s).map_err(|e| anyhow!("invalid endpoint URL {s:?}: {e}"))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub endpoints: ApiEndpoints,
    pub access_token: Option<String>,
    pub track: ReleaseTrack,
    pub user_agent: String,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RangeRead {
    Data(Bytes),
    NoNewData,
    NotFound,
}

#[derive(Clone, Debug)]
pub struct RestClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl RestClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<RestClient> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
            .build()?;
        Ok(RestClient { http, config })
    }

    pub fn track(&self) -> ReleaseTrack {
        self.config.track
    }

    pub fn url(&self, service: Service, path: &str) -> anyhow::Result<Url> {
        let base = self.config.endpoints.base(service);
        let path = path.trim_start_matches('/');
        let full = match self.config.track.api_version(service) {
            Some(version) => format!("{version}/{path}"),
            None => path.into(),
        };
        Ok(base.join(&full)?)
    }

    /// URL for the raw contents of a storage object; the object name is a single
    /// (percent-encoded) path segment even when it contains slashes.
    pub fn storage_media_url(&self, bucket: &str, object: &str) -> anyhow::Result<Url> {
        let mut url = self.url(Service::Storage, "storage/v1/b")?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("storage endpoint cannot be a base URL"))?
            .pop_if_empty()
            .push(bucket)
            .push("o")
            .push(object);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> anyhow::Result<T> {
        self.send_json(Method::GET, url, None::<&()>).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: Url, body: &B) -> anyhow::Result<T> {
        self.send_json(Method::POST, url, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, url: Url) -> anyhow::Result<T> {
        self.send_json(Method::DELETE, url, None::<&()>).await
    }

    pub async fn list_all<T: DeserializeOwned>(&self, url: Url, limit: Option<usize>) -> anyhow::Result<Vec<T>> {
        let page_size = limit.map_or(DEFAULT_PAGE_SIZE, |l| l.min(DEFAULT_PAGE_SIZE));
        let mut items = vec![];
        let mut page_token: Option<String> = None;

        loop {
            let mut page_url = url.clone();
            {
                let mut query = page_url.query_pairs_mut();
                query.append_pair("pageSize", &page_size.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let page: Page<T> = self.get(page_url).await?;
            let has_next = page.has_next();
            items.extend(page.items);

            if let Some(l) = limit
                && items.len() >= l
            {
                items.truncate(l);
                break;
            }
            if !has_next {
                break;
            }
            page_token = page.next_page_token;
        }

        Ok(items)
    }

    pub async fn get_range(&self, url: Url, offset: u64) -> anyhow::Result<RangeRead> {
        let req = self
            .request(Method::GET, url.clone())
            .header(header::RANGE, format!("bytes={offset}-"));
        let resp = self.execute(req, &Method::GET, &url).await?;

        match resp.status() {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => {
                let data = resp.bytes().await.map_err(|e| transport_error(&Method::GET, &url, e))?;
                Ok(RangeRead::Data(data))
            },
            StatusCode::NOT_FOUND => Ok(RangeRead::NotFound),
            StatusCode::RANGE_NOT_SATISFIABLE => Ok(RangeRead::NoNewData),
            _ => Err(error_from_response(Method::GET, &url, resp).await),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.config.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn execute(&self, req: RequestBuilder, method: &Method, url: &Url) -> anyhow::Result<reqwest::Response> {
        debug!("--> {method} {url}");
        let resp = req.send().await.map_err(|e| transport_error(method, url, e))?;
        debug!("<-- {} {method} {url}", resp.status());
        Ok(resp)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> anyhow::Result<T> {
        let mut req = self.request(method.clone(), url.clone());
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = self.execute(req, &method, &url).await?;
        if !resp.status().is_success() {
            return Err(error_from_response(method, &url, resp).await);
        }

        let text = resp.text().await.map_err(|e| transport_error(&method, &url, e))?;
        // Some delete and cancel methods return an empty body
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| anyhow!("could not decode response from {method} {url}: {e}"))
    }
}

fn transport_error(method: &Method, url: &Url, source: reqwest::Error) -> anyhow::Error {
    anyhow!(ApiError::Transport { method: method.clone(), url: url.to_string(), source })
}

// Turns a non-2xx response into an ApiError, preferring the message from the standard
// `{"error": {"code": ..., "message": ...}}` envelope over the raw body.
async fn error_from_response(method: Method, url: &Url, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.pointer("/error/message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("unknown error")
                    .into()
            } else {
                body
            }
        });

    anyhow!(ApiError::Http { method, url: url.to_string(), status, message })
}

#[cfg(test)]
mod tests {
    use assertables::*;
    use httpmock::prelude::*;
    use nb_testutils::*;
    use serde_json::json;

    use super::*;

    fn client_for(server: &MockServer) -> RestClient {
        RestClient::new(ClientConfig {
            endpoints: ApiEndpoints::all(&server.base_url()).unwrap(),
            access_token: Some(TEST_ACCESS_TOKEN.into()),
            track: ReleaseTrack::Ga,
            user_agent: "nbctl-test".into(),
        })
        .unwrap()
    }

    #[rstest]
    #[case::ga(ReleaseTrack::Ga, "/v1/projects/p/builds")]
    #[case::beta(ReleaseTrack::Beta, "/v1beta1/projects/p/builds")]
    fn test_url_for_track(#[case] track: ReleaseTrack, #[case] expected_path: &str) {
        let client = RestClient::new(ClientConfig {
            endpoints: ApiEndpoints::all("http://localhost:1234/api").unwrap(),
            access_token: None,
            track,
            user_agent: "test".into(),
        })
        .unwrap();
        let url = client.url(Service::Builds, "projects/p/builds").unwrap();
        assert_eq!(url.path(), format!("/api{expected_path}"));
    }

    #[rstest]
    fn test_storage_media_url_encodes_object() {
        let client = RestClient::new(ClientConfig {
            endpoints: ApiEndpoints::all("http://localhost:1234").unwrap(),
            access_token: None,
            track: ReleaseTrack::Alpha,
            user_agent: "test".into(),
        })
        .unwrap();
        let url = client.storage_media_url("logs", "builds/log-1.txt").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1234/storage/v1/b/logs/o/builds%2Flog-1.txt?alt=media");
    }

    #[rstest]
    #[tokio::test]
    async fn test_get_sends_bearer_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/projects/p/builds/b1")
                    .header("authorization", format!("Bearer {TEST_ACCESS_TOKEN}"));
                then.json_body(json!({"id": "b1"}));
            })
            .await;

        let client = client_for(&server);
        let value: Value = client.get(client.url(Service::Builds, "projects/p/builds/b1").unwrap()).await.unwrap();
        assert_eq!(value["id"], "b1");
        mock.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn test_error_envelope_message() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/projects/p/builds/missing");
                then.status(404)
                    .json_body(json!({"error": {"code": 404, "message": "build missing not found"}}));
            })
            .await;

        let client = client_for(&server);
        let err = client
            .get::<Value>(client.url(Service::Builds, "projects/p/builds/missing").unwrap())
            .await
            .unwrap_err();
        assert!(is_not_found(&err));
        assert!(!is_transient(&err));
        assert_contains!(format!("{err}"), "build missing not found");
    }

    #[rstest]
    #[case::unavailable(503, true)]
    #[case::throttled(429, true)]
    #[case::forbidden(403, false)]
    #[tokio::test]
    async fn test_transient_classification(#[case] status: u16, #[case] transient: bool) {
        let server = MockServer::start_async().await;
        server
            .mock_async(move |when, then| {
                when.method(GET).path("/v1/projects/p/builds/b1");
                then.status(status).body("nope");
            })
            .await;

        let client = client_for(&server);
        let err = client
            .get::<Value>(client.url(Service::Builds, "projects/p/builds/b1").unwrap())
            .await
            .unwrap_err();
        assert_eq!(is_transient(&err), transient);
        assert_eq!(http_status(&err), Some(status));
    }

    #[rstest]
    #[tokio::test]
    async fn test_list_all_follows_page_tokens() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/projects/p/builds")
                    .query_param_missing("pageToken");
                then.json_body(json!({"builds": [{"id": "b1"}, {"id": "b2"}], "nextPageToken": "next"}));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/projects/p/builds").query_param("pageToken", "next");
                then.json_body(json!({"builds": [{"id": "b3"}]}));
            })
            .await;

        let client = client_for(&server);
        let items: Vec<Value> = client
            .list_all(client.url(Service::Builds, "projects/p/builds").unwrap(), None)
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        first.assert_async().await;
        second.assert_async().await;
    }

    #[rstest]
    #[tokio::test]
    async fn test_list_all_respects_limit() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/projects/p/builds").query_param("pageSize", "1");
                then.json_body(json!({"builds": [{"id": "b1"}], "nextPageToken": "next"}));
            })
            .await;

        let client = client_for(&server);
        let items: Vec<Value> = client
            .list_all(client.url(Service::Builds, "projects/p/builds").unwrap(), Some(1))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        first.assert_async().await;
    }

    #[rstest]
    #[case::partial(206, RangeRead::Data(Bytes::from_static(b"hello\n")))]
    #[case::not_found(404, RangeRead::NotFound)]
    #[case::no_new_data(416, RangeRead::NoNewData)]
    #[tokio::test]
    async fn test_get_range(#[case] status: u16, #[case] expected: RangeRead) {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(move |when, then| {
                when.method(GET)
                    .path("/storage/v1/b/logs/o/log-1.txt")
                    .query_param("alt", "media")
                    .header("range", "bytes=10-");
                then.status(status).body("hello\n");
            })
            .await;

        let client = client_for(&server);
        let res = client
            .get_range(client.storage_media_url("logs", "log-1.txt").unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(res, expected);
        mock.assert_async().await;
    }
}
