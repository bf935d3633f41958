//! Plumbing shared by the food-cart services: typed row identifiers and
//! pooled Postgres connections with an explicit transaction scope.

pub mod ids;
pub mod persistence;
