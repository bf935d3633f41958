use actix_web::{web, Resource};
use serde::Serialize;

use crate::responses::PrettyJson;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Banner {
    pub title: &'static str,
    pub src: &'static str,
    pub text: &'static str,
}

// TODO: move to the database once the back-office can edit banners.
pub const BANNERS: &[Banner] = &[
    Banner {
        title: "Burger",
        src: "/static/burger.jpg",
        text: "Tasty Burger at your door step",
    },
    Banner {
        title: "Spices",
        src: "/static/food.jpg",
        text: "All Cuisines",
    },
    Banner {
        title: "New York",
        src: "/static/tasty.jpg",
        text: "Food is incomplete without a tasty dessert",
    },
];

pub fn resource() -> Resource {
    web::resource("/banners/").route(web::get().to(|| async { PrettyJson::ok(BANNERS) }))
}
