use std::rc::Rc;

use worker::*;

#[macro_use]
pub mod logger;

pub mod cache;
pub mod config;
pub mod edge;
pub mod error;
pub mod grid;
pub mod location;
pub mod pipeline;
pub mod request;
pub mod transform;

#[cfg(test)]
mod testing;

pub use cache::{CacheGateway, DeferredWrite, KvBackend, Namespace};
pub use config::GawConfig;
pub use error::{GawError, GawResult};
pub use grid::{GridClassification, GridLevel, GridReport, GridSource, HttpGridSource};
pub use location::{get_location, Location, LocationError, LocationMode};
pub use pipeline::{GridAwarePlugin, Origin, Outcome, ResponseDecision};
pub use request::{GeoMetadata, RequestContext};
pub use transform::{HtmlTransform, SnippetTransform, TransformSet};

#[event(fetch)]
async fn fetch(
    req: HttpRequest,
    env: Env,
    ctx: Context,
) -> Result<HttpResponse> {
    console_error_panic_hook::set_once();

    let worker_req = Request::try_from(req)?;

    match handle(&worker_req, &env, &ctx).await {
        Ok(response) => response.try_into(),
        Err(e) => {
            // Worst case the visitor gets the page as the origin serves it
            log_error!("Passing request through untouched: {}", e);
            let response = edge::forward(&worker_req).await?;
            let config = edge::load_config(&env).ok();
            edge::mark_fallback(response, config.as_ref())?.try_into()
        }
    }
}

async fn handle(worker_req: &Request, env: &Env, ctx: &Context) -> GawResult<Response> {
    let config = edge::load_config(env)?;
    let request = edge::request_context(worker_req)?;
    log_debug!(config.debug, "Request path: {}", request.path());

    let cache = edge::cache_gateway(env, &config);
    let source = Rc::new(HttpGridSource::new(config.data_source.clone()));
    let plugin = GridAwarePlugin::from_config(config, cache, source);

    let origin = edge::EdgeOrigin::new(worker_req.clone()?);
    let outcome = plugin.auto(&request, &origin).await?;

    // Page writes run after the response is handed back
    for write in outcome.deferred {
        let cache = plugin.cache().clone();
        ctx.wait_until(async move {
            let (namespace, key) = (write.namespace, write.key.clone());
            if let Err(e) = cache.apply(write).await {
                log_error!("Deferred {} cache write for {} failed: {}", namespace, key, e);
            }
        });
    }

    edge::into_worker_response(outcome.response)
}
