use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Resource, Route};
use log::*;
use serde::Serialize;

use crate::responses::{internal_error, PrettyJson};
use crate::services::query_blocking;

use super::{Catalog, CatalogCounts, CatalogStore, CheckReadiness, ListAvailableProducts};

#[derive(Debug, Serialize)]
struct ReadinessBody {
    status: &'static str,
    message: &'static str,
    database_status: CatalogCounts,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl<M: r2d2::ManageConnection<Connection = D>, D: CatalogStore + Send + 'static> Catalog<M> {
    pub fn products_resource(&self) -> Resource {
        let me = self.clone();
        web::resource("/products/").route(web::get().to(move || {
            let me = me.clone();
            async move { me.products().await }
        }))
    }

    pub fn readiness_route(&self) -> Route {
        let me = self.clone();
        web::get().to(move || {
            let me = me.clone();
            async move { me.readiness().await }
        })
    }

    async fn products(self) -> HttpResponse {
        info!("Handle product list");
        match query_blocking(self, ListAvailableProducts).await {
            Ok(products) => PrettyJson::ok(products).into_response(),
            Err(e) => internal_error(e),
        }
    }

    async fn readiness(self) -> HttpResponse {
        debug!("Handle readiness probe");
        let readiness = match query_blocking(self, CheckReadiness).await {
            Ok(readiness) => readiness,
            Err(e) => return internal_error(e),
        };
        let (status, body) = if readiness.ready {
            (
                StatusCode::OK,
                ReadinessBody {
                    status: "ready",
                    message: "Ready to accept orders",
                    database_status: readiness.counts,
                    errors: Vec::new(),
                },
            )
        } else {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ReadinessBody {
                    status: "error",
                    message: "Not enough catalog data to accept orders",
                    database_status: readiness.counts,
                    errors: readiness.errors,
                },
            )
        };
        PrettyJson::with_status(status, body).into_response()
    }
}
