use std::collections::HashMap;
use actix_web::{HttpMessage, HttpRequest};
use crate::limiter::Usage;

/// [RateLimitInfo] is inserted into the request extensions once a limiter
/// admitted the request, so handlers can read what was observed:
///
/// ```ignore
/// async fn handler(req: HttpRequest) -> String {
///     let remaining = req.extensions()
///         .get::<RateLimitInfo>()
///         .and_then(|info| info.usage("upload-svc"))
///         .map(|usage| usage.remaining());
///     format!("{:?}", remaining)
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RateLimitInfo {
    usages: HashMap<String, Option<Usage>>,
}

impl RateLimitInfo {
    pub(crate) fn checked(req: &HttpRequest, limiter: &str) -> bool {
        req.extensions()
            .get::<RateLimitInfo>()
            .map_or(false, |info| info.is_checked(limiter))
    }

    pub(crate) fn check(req: &HttpRequest, limiter: &str, usage: Option<Usage>) {
        let mut extensions = req.extensions_mut();
        match extensions.get_mut::<RateLimitInfo>() {
            Some(info) => {
                info.usages.insert(limiter.to_string(), usage);
            }
            None => {
                let mut info = RateLimitInfo::default();
                info.usages.insert(limiter.to_string(), usage);
                extensions.insert(info);
            }
        }
    }

    /// Whether the limiter named `limiter` admitted this request.
    pub fn is_checked(&self, limiter: &str) -> bool {
        self.usages.contains_key(limiter)
    }

    /// The usage observed by `limiter`, `None` for unlimited categories.
    pub fn usage(&self, limiter: &str) -> Option<Usage> {
        self.usages.get(limiter).copied().flatten()
    }
}

/// Identity extractor helper: the peer IP address, or an empty identity
/// (rejected) when it is unknown.
pub fn peer_ip(req: &HttpRequest) -> String {
    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_default()
}
