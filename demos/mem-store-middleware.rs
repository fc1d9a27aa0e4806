//! In this example, we create a RateLimiter with max 3 requests in 10 secs per client IP,
//! and 1 request in 10 secs on `/upload`.
//! We use [store::MemStore] as our storage, so the limit only holds inside this process.

use std::sync::Arc;
use std::time::Duration;
use actix_web::{App, HttpServer, web};
use actix_srl::config::{CategoryConfiguration, ConfigurationSet, LimitConfiguration};
use actix_srl::limiter::Limiter;
use actix_srl::middleware::RateLimit;
use actix_srl::store::MemStore;
use actix_srl::utils::peer_ip;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("actix_srl=debug")))
        .init();

    let limits = ConfigurationSet::new().with_category(
        1,
        CategoryConfiguration::new(LimitConfiguration::new(3, Duration::from_secs(10)))
            .with_route("/upload", LimitConfiguration::new(1, Duration::from_secs(10))),
    );

    // shared by every worker, so that they count together
    let limiter = Arc::new(
        Limiter::builder("mem-demo")
            .with_store(MemStore::default())
            .with_configurations(limits)
            .with_extractor(|req| (peer_ip(req), 1))
            .build()?,
    );

    HttpServer::new(move || {
        App::new()
            .wrap(RateLimit::new_default(limiter.clone()))
            .service(web::resource("/hello").route(web::get().to(hello_world)))
            .service(web::resource("/upload").route(web::post().to(upload)))
    })
        .bind("0.0.0.0:8080")?
        .run()
        .await?;

    Ok(())
}

async fn hello_world() -> &'static str {
    "Hello, World!"
}

async fn upload() -> &'static str {
    "Uploaded!"
}
