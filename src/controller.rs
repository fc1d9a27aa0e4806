use actix_web::{HttpRequest, HttpResponse};
use actix_web::http::StatusCode;
use crate::error::Error;
use crate::limiter::Usage;

pub(crate) type FromRequestFunc<I> = Box<dyn Fn(&HttpRequest) -> I + 'static>;

pub(crate) type FromRequestOnError<E, R> = Box<dyn Fn(&HttpRequest, E) -> R + 'static>;

pub(crate) type FromRequestOnSuccess<V> = Box<dyn Fn(&HttpRequest, V) + 'static>;

/// [Controller] customizes how the middleware treats requests:
/// which ones are checked, and what is answered when they are not admitted.
pub struct Controller {
    pub(crate) fn_do_rate_limit: Option<FromRequestFunc<bool>>,
    pub(crate) fn_on_rate_limit_error: Option<FromRequestFunc<HttpResponse>>,
    pub(crate) fn_on_store_error: Option<FromRequestOnError<Error, HttpResponse>>,
    pub(crate) fn_on_success: Option<FromRequestOnSuccess<Option<Usage>>>,
}

impl Controller {
    /// Create a default Controller
    pub fn new() -> Self {
        Self {
            fn_do_rate_limit: None,
            fn_on_rate_limit_error: None,
            fn_on_store_error: None,
            fn_on_success: None,
        }
    }

    /// Only requests for which `f` returns `true` are checked.
    pub fn with_do_rate_limit(mut self, f: impl Fn(&HttpRequest) -> bool + 'static) -> Self {
        self.fn_do_rate_limit = Some(Box::new(f));
        self
    }

    /// Response for rejected requests, `429 Too Many Requests` by default.
    pub fn on_rate_limit_error(mut self, f: impl Fn(&HttpRequest) -> HttpResponse + 'static) -> Self {
        self.fn_on_rate_limit_error = Some(Box::new(f));
        self
    }

    /// Response when the store could not answer, `500 Internal Server Error` by default.
    pub fn on_store_error(mut self, f: impl Fn(&HttpRequest, Error) -> HttpResponse + 'static) -> Self {
        self.fn_on_store_error = Some(Box::new(f));
        self
    }

    /// Called for admitted requests, before the downstream handler.
    pub fn on_success(mut self, f: impl Fn(&HttpRequest, Option<Usage>) + 'static) -> Self {
        self.fn_on_success = Some(Box::new(f));
        self
    }

    pub(crate) fn do_rate_limit(&self, req: &HttpRequest) -> bool {
        self.fn_do_rate_limit.as_ref().map_or_else(|| default_do_rate_limit(req), |f| f(req))
    }

    pub(crate) fn rate_limit_error(&self, req: &HttpRequest) -> HttpResponse {
        self.fn_on_rate_limit_error.as_ref().map_or_else(|| default_on_rate_limit_error(req), |f| f(req))
    }

    pub(crate) fn store_error(&self, req: &HttpRequest, error: Error) -> HttpResponse {
        match &self.fn_on_store_error {
            Some(f) => f(req, error),
            None => default_on_store_error(req, error),
        }
    }

    pub(crate) fn success(&self, req: &HttpRequest, usage: Option<Usage>) {
        if let Some(f) = &self.fn_on_success {
            f(req, usage)
        }
    }
}

impl Default for Controller {
    /// alias of [Self::new]
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn default_do_rate_limit(_: &HttpRequest) -> bool {
    true
}

pub(crate) fn default_on_rate_limit_error(_: &HttpRequest) -> HttpResponse {
    HttpResponse::new(StatusCode::TOO_MANY_REQUESTS)
}

pub(crate) fn default_on_store_error(_: &HttpRequest, _: Error) -> HttpResponse {
    HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR)
}
