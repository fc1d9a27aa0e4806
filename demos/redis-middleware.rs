//! In this example, we create a RateLimiter with max 3 requests in 10 secs per `X-Api-Key`,
//! stored in redis: every instance of this program pointing at the same redis shares the limit.
//! Requests without `X-Api-Key` are rejected, `/healthz` is never limited.

use std::sync::Arc;
use std::time::Duration;
use actix_web::{App, HttpRequest, HttpServer, web};
use actix_srl::config::{ConfigurationSet, LimitConfiguration};
use actix_srl::controller;
use actix_srl::limiter::Limiter;
use actix_srl::middleware::RateLimit;
use actix_srl::store::redis_store::RedisStore;
use tracing_subscriber::EnvFilter;

const CATEGORY_FREE: u32 = 1;
const CATEGORY_INTERNAL: u32 = 2;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("actix_srl=debug")))
        .init();

    // connect to redis here...
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
    let store = RedisStore::open(url.as_str())?;

    let limits = ConfigurationSet::new()
        .with_category(CATEGORY_FREE, LimitConfiguration::new(3, Duration::from_secs(10)))
        .with_category(CATEGORY_INTERNAL, LimitConfiguration::unlimited());

    let limiter = Arc::new(
        Limiter::builder("redis-demo")
            .with_store(store)
            .with_configurations(limits)
            .with_extractor(api_key)
            .with_timeout(Duration::from_millis(250))
            .build()?,
    );

    // actix-web simple http-server starts here...
    HttpServer::new(move || {
        // create a controller which skips health checks and logs admitted requests.
        let controller = controller::Controller::default()
            .with_do_rate_limit(|req| req.path() != "/healthz")
            .on_success(|req, usage| {
                tracing::info!(path = req.path(), ?usage, "ok, request admitted");
            });

        App::new()
            .wrap(RateLimit::new(limiter.clone(), controller))
            .service(web::resource("/hello").route(web::get().to(hello_world)))
            .service(web::resource("/healthz").route(web::get().to(healthz)))
    })
        .bind("0.0.0.0:8080")?
        .run()
        .await?;

    Ok(())
}

/// `X-Api-Key` is the identity, keys starting with `internal-` are not limited.
fn api_key(req: &HttpRequest) -> (String, u32) {
    let key = req.headers()
        .get("X-Api-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let category = if key.starts_with("internal-") { CATEGORY_INTERNAL } else { CATEGORY_FREE };
    (key, category)
}

async fn hello_world() -> &'static str {
    "Hello, World!"
}

async fn healthz() -> &'static str {
    "ok"
}
