use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Route};
use log::*;
use serde::Serialize;

use infra::ids::Id;
use infra::persistence::Storage;

use crate::catalog::{CatalogStore, Product};
use crate::locations::LocationStore;
use crate::responses::{internal_error, ErrorBody, PrettyJson};
use crate::services::execute_blocking;

use super::{
    AddedProduct, Customer, Order, OrderOutcome, OrderPayload, OrderReceipt, OrderStore, Orders,
    RegisterOrder, RegistrationStatus,
};

#[derive(Debug, Serialize)]
struct RegisteredBody {
    order_id: Id<Order>,
    status: RegistrationStatus,
    message: String,
    customer: Customer,
    added_products: Vec<AddedProduct>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_products: Vec<Id<Product>>,
}

impl From<OrderReceipt> for RegisteredBody {
    fn from(receipt: OrderReceipt) -> Self {
        let status = receipt.status();
        let message = match status {
            RegistrationStatus::Success => format!("Order {} registered", receipt.order_id),
            RegistrationStatus::PartialSuccess => format!(
                "Order {} registered without {} unknown product(s)",
                receipt.order_id,
                receipt.missing_products.len()
            ),
        };
        RegisteredBody {
            order_id: receipt.order_id,
            status,
            message,
            customer: receipt.customer,
            added_products: receipt.added_products,
            missing_products: receipt.missing_products,
        }
    }
}

impl<M, D> Orders<M>
where
    M: r2d2::ManageConnection<Connection = D>,
    D: Storage + CatalogStore + OrderStore + LocationStore + Send + 'static,
{
    pub fn register_route(&self) -> Route {
        let me = self.clone();
        web::post().to(move |payload: web::Json<OrderPayload>| {
            let me = me.clone();
            async move { me.submit(payload.into_inner()).await }
        })
    }

    async fn submit(self, payload: OrderPayload) -> HttpResponse {
        debug!("Submit order: {:?}", payload);
        match execute_blocking(self, RegisterOrder(payload)).await {
            Ok(OrderOutcome::Registered(receipt)) => {
                let code = match receipt.status() {
                    RegistrationStatus::Success => StatusCode::OK,
                    RegistrationStatus::PartialSuccess => StatusCode::MULTI_STATUS,
                };
                PrettyJson::with_status(code, RegisteredBody::from(receipt)).into_response()
            }
            Ok(OrderOutcome::Rejected(errors)) => PrettyJson::with_status(
                StatusCode::BAD_REQUEST,
                ErrorBody::rejected(errors.into_messages()),
            )
            .into_response(),
            Err(e) => internal_error(e),
        }
    }
}
