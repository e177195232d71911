//! Adapters between the Workers runtime and the pipeline.

use std::rc::Rc;

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, Uri};
use worker::{kv::KvStore, Env, Fetch, Headers, Request, Response};

use crate::cache::{CacheGateway, KvBackend, DATA_BINDING, PAGE_BINDING};
use crate::config::GawConfig;
use crate::error::{GawError, GawResult};
use crate::pipeline::{header_names::GAW_APPLIED, Origin, ResponseDecision};
use crate::request::{GeoMetadata, RequestContext};

pub const CONFIG_VAR: &str = "GAW_CONFIG";
pub const API_KEY_SECRET: &str = "GAW_DATA_API_KEY";

/// Plugin configuration from the `GAW_CONFIG` variable plus the API key
/// secret. An absent variable means defaults; a malformed one is an error.
pub fn load_config(env: &Env) -> GawResult<GawConfig> {
    let config = match env.var(CONFIG_VAR) {
        Ok(raw) => GawConfig::from_json(&raw.to_string())?,
        Err(_) => GawConfig::default(),
    };

    let api_key = match env.secret(API_KEY_SECRET) {
        Ok(secret) => secret.to_string(),
        Err(_) => {
            log_info!("No {} secret set, querying the data source without a key", API_KEY_SECRET);
            String::new()
        }
    };

    Ok(config.with_api_key(api_key))
}

/// Gateway over whichever KV namespaces are bound. Unbound namespaces stay
/// empty so that enabling their cache fails loudly in the pipeline.
pub fn cache_gateway(env: &Env, config: &GawConfig) -> CacheGateway {
    let mut gateway = CacheGateway::new();
    match env.kv(DATA_BINDING) {
        Ok(store) => gateway = gateway.with_data(Rc::new(store)),
        Err(e) if config.kv_cache_data => log_error!("Data cache enabled but {}: {}", DATA_BINDING, e),
        Err(_) => {}
    }
    match env.kv(PAGE_BINDING) {
        Ok(store) => gateway = gateway.with_page(Rc::new(store)),
        Err(e) if config.kv_cache_page => log_error!("Page cache enabled but {}: {}", PAGE_BINDING, e),
        Err(_) => {}
    }
    gateway
}

#[async_trait(?Send)]
impl KvBackend for KvStore {
    async fn get(&self, key: &str) -> GawResult<Option<String>> {
        KvStore::get(self, key)
            .text()
            .await
            .map_err(|e| GawError::Kv(e.to_string()))
    }

    async fn put(&self, key: &str, value: String, ttl_secs: u64) -> GawResult<()> {
        KvStore::put(self, key, value)
            .map_err(|e| GawError::Kv(e.to_string()))?
            .expiration_ttl(ttl_secs)
            .execute()
            .await
            .map_err(|e| GawError::Kv(e.to_string()))
    }
}

/// URL, headers and `cf` geolocation of the incoming request.
pub fn request_context(req: &Request) -> GawResult<RequestContext> {
    let uri = req
        .url()?
        .as_str()
        .parse::<Uri>()
        .map_err(http::Error::from)?;

    let mut headers = HeaderMap::new();
    for (name, value) in req.headers().entries() {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            headers.append(name, value);
        }
    }

    let geo = req
        .cf()
        .map(|cf| {
            let coordinates = cf.coordinates();
            GeoMetadata {
                country: cf.country(),
                latitude: coordinates.map(|(lat, _)| coordinate(lat)),
                longitude: coordinates.map(|(_, lon)| coordinate(lon)),
            }
        })
        .unwrap_or_default();

    Ok(RequestContext::new(uri, headers).with_geo(geo))
}

/// Widen a `cf` coordinate through its shortest decimal form, so `52.52`
/// stays `52.52` in cache keys and query strings.
fn coordinate(value: f32) -> f64 {
    value.to_string().parse().unwrap_or(f64::from(value))
}

/// The request's own destination, fetched through the Workers runtime.
pub struct EdgeOrigin {
    request: Request,
}

impl EdgeOrigin {
    pub fn new(request: Request) -> Self {
        Self { request }
    }
}

#[async_trait(?Send)]
impl Origin for EdgeOrigin {
    async fn fetch(&self) -> GawResult<http::Response<Vec<u8>>> {
        let request = self.request.clone().map_err(origin_error)?;
        let mut response = Fetch::Request(request).send().await.map_err(origin_error)?;

        let mut builder = http::Response::builder().status(response.status_code());
        for (name, value) in response.headers().entries() {
            builder = builder.header(name, value);
        }
        let body = response.bytes().await.map_err(origin_error)?;
        Ok(builder.body(body)?)
    }
}

fn origin_error(err: worker::Error) -> GawError {
    GawError::Origin(err.to_string())
}

/// Send the request on unchanged. Used when the plugin cannot run at all.
pub async fn forward(req: &Request) -> worker::Result<Response> {
    Fetch::Request(req.clone()?).send().await
}

pub fn into_worker_response(response: http::Response<Vec<u8>>) -> GawResult<Response> {
    let (parts, body) = response.into_parts();
    let headers = Headers::new();
    for (name, value) in parts.headers.iter() {
        headers.append(name.as_str(), &String::from_utf8_lossy(value.as_bytes()))?;
    }
    let status = parts.status.as_u16();
    let response = if carries_body(status, &body) {
        Response::from_bytes(body)?
    } else {
        Response::empty()?
    };
    Ok(response.with_status(status).with_headers(headers))
}

/// The runtime rejects a body on null-body statuses, even an empty one.
fn carries_body(status: u16, body: &[u8]) -> bool {
    !body.is_empty() && !matches!(status, 101 | 204 | 205 | 304)
}

/// Diagnostic for a response forwarded because the plugin failed outright.
/// Only emitted when the configuration itself could be read.
fn fallback_diagnostic(config: Option<&GawConfig>) -> Option<(&'static str, &'static str)> {
    config
        .filter(|config| config.debug.should_emit_headers())
        .map(|_| (GAW_APPLIED, ResponseDecision::Failed.as_str()))
}

/// Tag a forwarded response with `gaw-applied: error` when debug headers
/// are on. Fetched responses have immutable headers, so they are copied.
pub fn mark_fallback(response: Response, config: Option<&GawConfig>) -> worker::Result<Response> {
    match fallback_diagnostic(config) {
        Some((name, value)) => {
            let headers = response.headers().clone();
            headers.set(name, value)?;
            Ok(response.with_headers(headers))
        }
        None => Ok(response),
    }
}
