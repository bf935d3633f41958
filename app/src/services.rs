//! Message-style entry points shared by the CLI and the HTTP handlers.
//!
//! Services are synchronous: they check out a pooled connection and block on
//! it. The HTTP side hops onto the blocking thread pool via
//! [`query_blocking`] and [`execute_blocking`].

use actix_web::web;
use anyhow::{anyhow, Result};

pub trait Request {
    type Resp;
}

/// Read-only requests.
pub trait Queryable<Req>
where
    Req: Request,
{
    fn query(&self, req: Req) -> Result<Req::Resp>;
}

/// Requests that write.
pub trait Commandable<Req>
where
    Req: Request,
{
    fn execute(&self, req: Req) -> Result<Req::Resp>;
}

pub async fn query_blocking<S, Req>(service: S, req: Req) -> Result<Req::Resp>
where
    S: Queryable<Req> + Send + 'static,
    Req: Request + Send + 'static,
    Req::Resp: Send + 'static,
{
    web::block(move || service.query(req))
        .await
        .map_err(|e| anyhow!("blocking query cancelled: {}", e))?
}

pub async fn execute_blocking<S, Req>(service: S, req: Req) -> Result<Req::Resp>
where
    S: Commandable<Req> + Send + 'static,
    Req: Request + Send + 'static,
    Req::Resp: Send + 'static,
{
    web::block(move || service.execute(req))
        .await
        .map_err(|e| anyhow!("blocking command cancelled: {}", e))?
}
