use std::rc::Rc;
use std::sync::Arc;
use actix_web::body::EitherBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use crate::controller::Controller;
use crate::error::Error;
use crate::limiter::Limiter;
use crate::store::SlidingWindowStore;
use crate::utils::RateLimitInfo;

/// [RateLimit] is the `actix-web` middleware checking every request
/// against a [Limiter] before it reaches the wrapped service:
///
/// - admitted requests are forwarded unchanged;
/// - rejected requests get `429 Too Many Requests`;
/// - requests whose check failed in the store get `500 Internal Server Error`.
///
/// Responses are customized with a [Controller].
pub struct RateLimit<T: SlidingWindowStore> {
    limiter: Arc<Limiter<T>>,
    controller: Rc<Controller>,
}

impl<T, S, B> Transform<S, ServiceRequest> for RateLimit<T>
    where
        T: SlidingWindowStore + 'static,
        S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
        S::Future: 'static,
        B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = S::Error;
    type Transform = RateLimitService<T, S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitService {
            limiter: self.limiter.clone(),
            controller: self.controller.clone(),
            service: Rc::new(service),
        }))
    }
}

pub struct RateLimitService<T, S>
    where T: SlidingWindowStore,
{
    limiter: Arc<Limiter<T>>,
    controller: Rc<Controller>,
    service: Rc<S>,
}

impl<T, S, B> Service<ServiceRequest> for RateLimitService<T, S>
    where
        T: SlidingWindowStore + 'static,
        S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = actix_web::Error> + 'static,
        S::Future: 'static,
        B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = S::Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, svc: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let limiter = self.limiter.clone();
        let controller = self.controller.clone();

        Box::pin(async move {
            // only borrow the request here: the router needs sole ownership of it further in
            let req = svc.request();

            // already admitted by this limiter further out, don't count twice
            if controller.do_rate_limit(req) && !RateLimitInfo::checked(req, limiter.name()) {
                let rejection = match limiter.check_request(req).await {
                    Ok(usage) => {
                        RateLimitInfo::check(req, limiter.name(), usage);
                        controller.success(req, usage);
                        None
                    }
                    Err(Error::LimitExceeded) => Some(controller.rate_limit_error(req)),
                    Err(e) => Some(controller.store_error(req, e)),
                };

                if let Some(body) = rejection {
                    return Ok(svc.into_response(body.map_into_right_body()));
                }
            }

            let res = service.call(svc).await?.map_into_left_body();
            Ok(res)
        })
    }
}

impl<T: SlidingWindowStore> RateLimit<T> {
    /// create a new [RateLimit] middleware with a custom [Controller].
    pub fn new<L: Into<Arc<Limiter<T>>>>(limiter: L, controller: Controller) -> Self {
        Self {
            limiter: limiter.into(),
            controller: Rc::new(controller),
        }
    }

    /// create a new [RateLimit] middleware with the default [Controller].
    pub fn new_default<L: Into<Arc<Limiter<T>>>>(limiter: L) -> Self {
        Self::new(limiter, Controller::default())
    }
}
