use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::api::response::ApiError;
use crate::pipeline::ActorKey;

/// Header the gateway sets to the authenticated user id.
pub const ACTOR_HEADER: &str = "x-actor-id";

const MAX_ACTOR_ID_LEN: usize = 128;

/// Authenticated user taken from the `X-Actor-Id` header.
///
/// Add this as a handler parameter to require an identified caller. Use
/// `Option<Actor>` where anonymous callers are allowed.
#[derive(Debug, Clone)]
pub struct Actor(pub String);

fn actor_from_headers(headers: &HeaderMap) -> Result<Actor, ApiError> {
    let value = headers
        .get(ACTOR_HEADER)
        .ok_or_else(|| ApiError::unauthorized("missing X-Actor-Id header"))?;

    let id = value
        .to_str()
        .map_err(|_| ApiError::unauthorized("X-Actor-Id header is not valid text"))?
        .trim();

    if id.is_empty() || id.len() > MAX_ACTOR_ID_LEN || id.chars().any(char::is_control) {
        return Err(ApiError::unauthorized("X-Actor-Id header is not a valid id"));
    }
    Ok(Actor(id.to_string()))
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_headers(&parts.headers)
    }
}

/// Identity used for reactions: the authenticated user if there is one,
/// otherwise the client IP.
#[derive(Debug, Clone)]
pub struct ReactionActor(pub ActorKey);

/// Best-effort client IP: first `X-Forwarded-For` entry, then `X-Real-IP`,
/// then the socket peer.
pub fn client_ip(parts: &Parts) -> Option<IpAddr> {
    let header_ip = |name: &str| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| {
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for ReactionActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if parts.headers.contains_key(ACTOR_HEADER) {
            let Actor(id) = actor_from_headers(&parts.headers)?;
            return Ok(ReactionActor(ActorKey::User(id)));
        }

        client_ip(parts)
            .map(|ip| ReactionActor(ActorKey::Anonymous(ip)))
            .ok_or_else(|| ApiError::bad_request("could not determine client identity"))
    }
}
