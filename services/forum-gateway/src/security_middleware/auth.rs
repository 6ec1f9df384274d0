use crate::database::PgStore;
use crate::errors::GatewayError;
use crate::models::AuthUser;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures_util::future::LocalBoxFuture;
use std::future::{ready, Ready};
use std::rc::Rc;

/// Session token from `Authorization: Bearer <token>` or the legacy `Token` header
pub fn extract_token(req: &ServiceRequest) -> Option<String> {
    if let Some(value) = req.headers().get("Authorization") {
        let auth_str = value.to_str().ok()?;
        return auth_str
            .strip_prefix("Bearer ")
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
    }

    req.headers()
        .get("Token")
        .and_then(|value| value.to_str().ok())
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Resolves session tokens against the `tokens` table
pub struct TokenAuth {
    store: PgStore,
}

impl TokenAuth {
    pub fn new(store: PgStore) -> Self {
        Self { store }
    }
}

impl<S, B> Transform<S, ServiceRequest> for TokenAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = TokenAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(TokenAuthMiddleware {
            service: Rc::new(service),
            store: self.store.clone(),
        }))
    }
}

pub struct TokenAuthMiddleware<S> {
    service: Rc<S>,
    store: PgStore,
}

impl<S, B> Service<ServiceRequest> for TokenAuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Skip auth for health and metrics endpoints
        if req.path() == "/health" || req.path() == "/metrics" {
            let fut = self.service.call(req);
            return Box::pin(async move { fut.await });
        }

        let token = match extract_token(&req) {
            Some(token) => token,
            None => {
                tracing::debug!(path = req.path(), "Rejected request without a session token");
                return Box::pin(async { Err(Error::from(GatewayError::Unauthorized)) });
            }
        };

        let service = self.service.clone();
        let store = self.store.clone();

        Box::pin(async move {
            match store.find_session(&token).await {
                Ok(Some(user)) => {
                    // Add user info to request extensions for handlers to access
                    req.extensions_mut().insert(user);
                    service.call(req).await
                }
                Ok(None) => {
                    tracing::warn!(path = req.path(), "Rejected unknown or expired token");
                    Err(Error::from(GatewayError::Unauthorized))
                }
                Err(err) => {
                    tracing::error!("Session lookup failed: {}", err);
                    Err(Error::from(err))
                }
            }
        })
    }
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<AuthUser>()
                .cloned()
                .ok_or_else(|| Error::from(GatewayError::Unauthorized)),
        )
    }
}
