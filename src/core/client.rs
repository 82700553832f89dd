//! HTTP clients for the routing service and the road database API
//!
//! These are the production implementations of the fetch traits. They only
//! translate requests and responses; timeouts and retries are applied by the
//! callers through [`crate::core::fetch::with_retry`].

use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode};

use crate::core::config::{Credentials, ServiceConfig};
use crate::core::error::{Error, Result};
use crate::core::fetch::{RouteFetcher, SegmentFetcher, ThematicFetcher};
use crate::core::position::LinkSequenceId;
use crate::core::route::{RoutePlan, RouteRequest};
use crate::core::segment::RawLinkSequence;
use crate::core::thematic::{RawObjectPage, ThematicRecord};

/// Media type requested from the road database API
const NVDB_ACCEPT: &str = "application/vnd.vegvesen.nvdb-v3-rev2+json";

/// Upper bound on followed pages for one thematic query
const MAX_PAGES: usize = 1000;

/// Build an HTTP client with the crate's connection settings
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    ClientBuilder::new()
        .tcp_keepalive(Duration::from_secs(60))
        .pool_idle_timeout(Duration::from_secs(90))
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .user_agent(format!("nvdb-mapper/{}", env!("NVDB_MAPPER_VERSION")))
        .build()
        .map_err(|e| Error::ConfigError(format!("can't create HTTP client: {e}")))
}

/// Turn a non-2xx status into a fetch error; 5xx and 429 are worth retrying
fn status_error(target: &str, status: StatusCode, body: &str) -> Error {
    let body = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let body: String = body.chars().take(200).collect();
    let reason = format!("HTTP status={} message={body}", status.as_u16());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Error::transient(target, reason)
    } else {
        Error::fetch(target, reason)
    }
}

async fn read_json(target: &str, response: reqwest::Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(status_error(target, status, &body));
    }
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes)
        .map_err(|e| Error::fetch(target, format!("response is not valid JSON: {e}")))
}

/// Client for the routing service
#[derive(Debug, Clone)]
pub struct RouteClient {
    client: Client,
    credentials: Credentials,
}

impl RouteClient {
    pub fn new(client: Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Query parameters sent for `request`
    pub fn query_params(request: &RouteRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("format", "json".to_string()),
            ("geometryformat", "isoz".to_string()),
            ("stops", request.stops_param()),
        ];
        if request.alternatives {
            params.push(("route_type", "alternative".to_string()));
        }
        params
    }
}

impl RouteFetcher for RouteClient {
    async fn fetch_route(&self, request: &RouteRequest) -> Result<RoutePlan> {
        if request.stops.len() < 2 {
            return Err(Error::ValidationError(
                "Coordinate list must have at least 2 points".to_string(),
            ));
        }

        let mut builder = self
            .client
            .get(&self.credentials.url)
            .query(&Self::query_params(request));
        if let Some((user, pw)) = &self.credentials.auth {
            builder = builder.basic_auth(user, Some(pw));
        }

        log::debug!("Requesting route through {}", request.stops_param());
        let response = builder.send().await?;
        let json = read_json("route", response).await?;
        RoutePlan::from_json(json)
    }
}

/// Client for the road database read API (link sequences and road objects)
#[derive(Debug, Clone)]
pub struct NvdbClient {
    client: Client,
    config: ServiceConfig,
}

impl NvdbClient {
    pub fn new(client: Client, config: ServiceConfig) -> Self {
        Self { client, config }
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("accept", NVDB_ACCEPT)
            .header("X-Client", &self.config.client_name)
    }

    fn base(&self) -> &str {
        self.config.nvdb_base_url.trim_end_matches('/')
    }
}

impl SegmentFetcher for NvdbClient {
    async fn fetch_link_sequence(&self, id: LinkSequenceId) -> Result<RawLinkSequence> {
        let target = format!("link sequence {id}");
        let url = format!("{}/vegnett/veglenkesekvenser/{id}", self.base());
        let response = self.get(&url).send().await?;
        let json = read_json(&target, response).await?;
        serde_json::from_value(json)
            .map_err(|e| Error::fetch(target, format!("unexpected response layout: {e}")))
    }
}

impl ThematicFetcher for NvdbClient {
    async fn fetch_records(&self, object_type: u32, filter: &str) -> Result<Vec<ThematicRecord>> {
        let target = format!("road objects of type {object_type}");
        let first = format!("{}/vegobjekter/{object_type}", self.base());

        let mut records = Vec::new();
        let mut request = self.get(&first).query(&[
            ("veglenkesekvens", filter),
            ("inkluder", "metadata,egenskaper,lokasjon,geometri"),
        ]);

        for page_number in 0..MAX_PAGES {
            let response = request.send().await?;
            let json = read_json(&target, response).await?;
            let page: RawObjectPage = serde_json::from_value(json)
                .map_err(|e| Error::fetch(&target, format!("unexpected response layout: {e}")))?;

            let next = page.next_href().map(str::to_string);
            for object in page.objects {
                records.extend(object.into_records()?);
            }

            match next {
                Some(href) => {
                    log::debug!("Fetching page {} of {target}", page_number + 2);
                    request = self.get(&href);
                }
                None => return Ok(records),
            }
        }

        Err(Error::fetch(
            target,
            format!("gave up after {MAX_PAGES} pages"),
        ))
    }
}
