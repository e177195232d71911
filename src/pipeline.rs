//! The request pipeline: guards, classification, page cache and rewrite.
//!
//! Every stage can end the request early with the origin response passed
//! through. Anything that goes wrong inside is caught once in
//! [`GridAwarePlugin::auto`] and answered with a fresh, unmodified origin
//! fetch.

use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use http::{
    header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE},
    HeaderValue, Response,
};

use crate::cache::{page_key, CacheGateway, DeferredWrite, Namespace};
use crate::config::GawConfig;
use crate::error::GawResult;
use crate::grid::{resolve_classification, GridClassification, GridLevel, GridReport, GridSource};
use crate::location::get_location;
use crate::request::RequestContext;
use crate::transform::{HtmlTransform, TransformSet};

/// Diagnostic header names.
pub mod header_names {
    pub const GAW_APPLIED: &str = "gaw-applied";
    pub const GAW_GRID_DATA: &str = "gaw-grid-data";
    pub const GAW_LOCATION: &str = "gaw-location";
    pub const GAW_DATA_SOURCE: &str = "gaw-data-source";
    pub const GAW_PAGE_SOURCE: &str = "gaw-page-source";
}

use header_names::*;

const HTML_CONTENT_TYPE: &str = "text/html;charset=UTF-8";

/// The site being fronted. Each call is a new upstream request.
#[async_trait(?Send)]
pub trait Origin {
    async fn fetch(&self) -> GawResult<Response<Vec<u8>>>;
}

/// How one request was answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseDecision {
    NoContentType,
    IgnoredRoute,
    OptedOut,
    NoLocation,
    ClassificationError,
    NoTransform,
    InvalidEncoding,
    Applied(GridLevel),
    Failed,
}

impl ResponseDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseDecision::NoContentType => "no-content-type",
            ResponseDecision::IgnoredRoute => "ignored-route",
            ResponseDecision::OptedOut => "user-opt-out",
            ResponseDecision::NoLocation => "no-location",
            ResponseDecision::ClassificationError => "error-fetching-data",
            ResponseDecision::NoTransform => "no-grid-aware",
            ResponseDecision::InvalidEncoding => "invalid-encoding",
            ResponseDecision::Applied(level) => level.as_str(),
            ResponseDecision::Failed => "error",
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ResponseDecision::Applied(_))
    }
}

impl fmt::Display for ResponseDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct Outcome {
    pub response: Response<Vec<u8>>,
    pub decision: ResponseDecision,
    /// Page-cache writes to issue once the response is on its way.
    pub deferred: Vec<DeferredWrite>,
}

#[derive(Debug, Default)]
struct Diagnostics(Vec<(&'static str, String)>);

impl Diagnostics {
    fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.push((name, value.into()));
    }
}

pub struct GridAwarePlugin {
    config: GawConfig,
    transforms: TransformSet,
    cache: CacheGateway,
    source: Rc<dyn GridSource>,
}

impl GridAwarePlugin {
    pub fn new(
        config: GawConfig,
        transforms: TransformSet,
        cache: CacheGateway,
        source: Rc<dyn GridSource>,
    ) -> Self {
        Self {
            config,
            transforms,
            cache,
            source,
        }
    }

    /// Plugin whose transforms come from `config.html_changes`.
    pub fn from_config(config: GawConfig, cache: CacheGateway, source: Rc<dyn GridSource>) -> Self {
        let transforms = TransformSet::from_changes(&config.html_changes);
        Self::new(config, transforms, cache, source)
    }

    pub fn cache(&self) -> &CacheGateway {
        &self.cache
    }

    /// Answer `request`. Internal failures fall back to an unmodified origin
    /// response marked `gaw-applied: error`; only an origin that cannot be
    /// reached at all surfaces as `Err`.
    pub async fn auto(&self, request: &RequestContext, origin: &dyn Origin) -> GawResult<Outcome> {
        match self.run(request, origin).await {
            Ok(outcome) => {
                log_debug!(
                    self.config.debug,
                    "{} answered with decision {}",
                    request.path(),
                    outcome.decision
                );
                Ok(outcome)
            }
            Err(e) => {
                log_error!("Grid-aware processing failed for {}: {}", request.path(), e);
                let response = origin.fetch().await?;
                let mut diagnostics = Diagnostics::default();
                diagnostics.set(GAW_APPLIED, ResponseDecision::Failed.as_str());
                Ok(self.finish(response, ResponseDecision::Failed, diagnostics, Vec::new()))
            }
        }
    }

    async fn run(&self, request: &RequestContext, origin: &dyn Origin) -> GawResult<Outcome> {
        let config = &self.config;
        if config.kv_cache_data {
            self.cache.ensure(Namespace::Data)?;
        }
        if config.kv_cache_page {
            self.cache.ensure(Namespace::Page)?;
        }

        let response = origin.fetch().await?;
        let mut diagnostics = Diagnostics::default();

        let accepted = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| config.accepts_content_type(content_type));
        if !accepted {
            return Ok(self.pass(response, ResponseDecision::NoContentType, diagnostics));
        }

        if let Some(route) = config.ignored_route(request.path()) {
            log_debug!(config.debug, "{} matches ignored route {}", request.path(), route);
            return Ok(self.pass(response, ResponseDecision::IgnoredRoute, diagnostics));
        }

        if request.has_cookie(&config.opt_out_cookie) {
            return Ok(self.pass(response, ResponseDecision::OptedOut, diagnostics));
        }

        let manual = request
            .cookie(&config.manual_view_cookie)
            .and_then(|value| value.parse::<GridLevel>().ok());

        let classification = match manual {
            Some(level) => {
                log_debug!(config.debug, "Manual view cookie forces level {}", level);
                diagnostics.set(GAW_DATA_SOURCE, "manual");
                GridClassification::new("manual", level)
            }
            None => {
                let location = match get_location(&request.geo, config.location_mode) {
                    Ok(location) => location,
                    Err(e) => {
                        log_debug!(config.debug, "No location for {}: {}", request.path(), e);
                        return Ok(self.pass(response, ResponseDecision::NoLocation, diagnostics));
                    }
                };
                diagnostics.set(GAW_LOCATION, location.cache_key());

                let resolution =
                    resolve_classification(&location, &*self.source, &self.cache, config)
                        .await;
                diagnostics.set(GAW_DATA_SOURCE, resolution.origin.to_string());

                match resolution.report {
                    GridReport::Success(classification) => classification,
                    GridReport::Error { .. } => {
                        return Ok(self.pass(
                            response,
                            ResponseDecision::ClassificationError,
                            diagnostics,
                        ));
                    }
                }
            }
        };
        diagnostics.set(GAW_GRID_DATA, serde_json::to_string(&classification)?);

        let Some(transform) = self.transforms.select(&classification) else {
            return Ok(self.pass(response, ResponseDecision::NoTransform, diagnostics));
        };
        let decision = ResponseDecision::Applied(classification.level);
        let key = page_key(classification.level, &request.url());

        if config.kv_cache_page {
            match self.cache.fetch_page(&key).await {
                Ok(Some(html)) => {
                    log_debug!(config.debug, "Page cache hit for {}", key);
                    diagnostics.set(GAW_PAGE_SOURCE, "cache");
                    let response = html_response(response, html.into_bytes());
                    return Ok(self.finish(response, decision, diagnostics, Vec::new()));
                }
                Ok(None) => log_debug!(config.debug, "Page cache miss for {}", key),
                Err(e) => log_error!("Page cache read failed for {}: {}", key, e),
            }
        }

        self.render(response, transform, key, decision, diagnostics)
    }

    fn render(
        &self,
        response: Response<Vec<u8>>,
        transform: &dyn HtmlTransform,
        key: String,
        decision: ResponseDecision,
        mut diagnostics: Diagnostics,
    ) -> GawResult<Outcome> {
        let (parts, body) = response.into_parts();
        let html = match String::from_utf8(body) {
            Ok(html) => html,
            Err(e) => {
                let response = Response::from_parts(parts, e.into_bytes());
                return Ok(self.pass(response, ResponseDecision::InvalidEncoding, diagnostics));
            }
        };

        let rendered = transform.transform(&html)?;

        let mut deferred = Vec::new();
        if self.config.kv_cache_page && parts.status.is_success() {
            deferred.push(DeferredWrite {
                namespace: Namespace::Page,
                key,
                value: rendered.clone(),
                ttl_secs: self.config.page_ttl_secs,
            });
        }

        diagnostics.set(GAW_PAGE_SOURCE, "rendered");
        let response = html_response(Response::from_parts(parts, ()), rendered.into_bytes());
        Ok(self.finish(response, decision, diagnostics, deferred))
    }

    fn pass(
        &self,
        response: Response<Vec<u8>>,
        decision: ResponseDecision,
        diagnostics: Diagnostics,
    ) -> Outcome {
        self.finish(response, decision, diagnostics, Vec::new())
    }

    fn finish(
        &self,
        mut response: Response<Vec<u8>>,
        decision: ResponseDecision,
        mut diagnostics: Diagnostics,
        deferred: Vec<DeferredWrite>,
    ) -> Outcome {
        if self.config.debug.should_emit_headers() {
            if !diagnostics.0.iter().any(|(name, _)| *name == GAW_APPLIED) {
                diagnostics.set(GAW_APPLIED, decision.as_str());
            }
            let headers = response.headers_mut();
            for (name, value) in diagnostics.0 {
                match HeaderValue::from_str(&value) {
                    Ok(value) => {
                        headers.insert(name, value);
                    }
                    Err(_) => log_error!("Skipping {} header with unencodable value", name),
                }
            }
        }
        Outcome {
            response,
            decision,
            deferred,
        }
    }
}

/// `base` headers and status with an HTML body the plugin produced.
fn html_response<T>(base: Response<T>, body: Vec<u8>) -> Response<Vec<u8>> {
    let (mut parts, _) = base.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    parts.headers.remove(CONTENT_ENCODING);
    parts
        .headers
        .insert(CONTENT_TYPE, HeaderValue::from_static(HTML_CONTENT_TYPE));
    Response::from_parts(parts, body)
}
