//! # `actix-srl`: distributed sliding-window RateLimiter for `actix-web`

//! ## Description
//! `actix-srl` is a RateLimit middleware for the `actix-web` library.
//! Requests are counted in a sliding window kept in a shared store,
//! so that every instance of a horizontally-scaled service enforces the same limit.
//! Two storage options are provided:
//! in-memory storage (`MemStore`) and Redis sorted sets (`RedisStore`).

//! ## Features
//! |    Feature    |  Component   |                                    Description                                    |
//! |:-------------:|:------------:|:---------------------------------------------------------------------------------:|
//! |   `default`   |  `MemStore`  |                     Store windows in memory (single process)                      |
//! | `redis-store` | `RedisStore` | Store windows using an async connection from [redis](https://crates.io/crates/redis) |

//! ## Usage
//! 1. Define a `Store` where the request windows live.
//! 2. Define the limits: a `ConfigurationSet` maps request categories
//!    to a maximum number of requests per window, optionally overridden per route.
//! 3. Build a `Limiter` with a name, the store, the limits,
//!    and a function mapping a request to its `(identity, category)`.
//! 4. Finally, add a `RateLimit` middleware to your HTTP Server using the `wrap` function (from `actix-web`).

//! ### Examples
//! You can find examples in `demos` folder.

//! ### Limits
//! ```rust
//! use std::time::Duration;
//! use actix_srl::config::{CategoryConfiguration, ConfigurationSet, LimitConfiguration};
//!
//! let limits = ConfigurationSet::new()
//!     // category 0 is never limited
//!     .with_category(0, LimitConfiguration::unlimited())
//!     // category 1: 10 requests per second, but 2 per second on "/upload"
//!     .with_category(1, CategoryConfiguration::new(LimitConfiguration::new(10, Duration::from_secs(1)))
//!         .with_route("/upload", LimitConfiguration::new(2, Duration::from_secs(1))));
//! ```

//! ### Limiter
//! ```rust
//! # use actix_srl::config::ConfigurationSet;
//! # let limits = ConfigurationSet::new();
//! use actix_srl::limiter::Limiter;
//! use actix_srl::store::MemStore;
//!
//! let limiter = Limiter::builder("upload-svc")
//!     .with_store(MemStore::default())
//!     .with_configurations(limits)
//!     .with_extractor(|req| (actix_srl::utils::peer_ip(req), 1))
//!     .build()
//!     .unwrap();
//! ```
//!
//! Requests without identity, or whose category has no limits, are rejected.
//! `Limiter::check_limit` can also be called directly, without the middleware.

//! ### RateLimit
//! Add it to `actix-web` HTTP server wrap:
//! ```rust,ignore
//! let limiter = std::sync::Arc::new(limiter);
//! HttpServer::new(move || {
//!     App::new()
//!         .wrap(actix_srl::middleware::RateLimit::new_default(limiter.clone()))
//!         // ...
//! })
//! ```
//!
//! Rejected requests get `429 Too Many Requests`, requests that could not be checked
//! because the store failed get `500 Internal Server Error`.
//! Use a `Controller` to change that.

pub mod store;
pub mod middleware;
pub mod error;
pub mod controller;
pub mod utils;
pub mod config;
pub mod key;
pub mod limiter;
