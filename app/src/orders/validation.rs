//! Turns an untrusted order payload into a [`ValidOrder`].
//!
//! Every field is checked even after an earlier one fails, so the client
//! gets the full list of problems in one round trip.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use infra::ids::Id;

use crate::catalog::Product;

use super::Customer;

const NAME_LEN: (usize, usize) = (2, 50);
const ADDRESS_LEN: (usize, usize) = (5, 200);
pub const MAX_QUANTITY: i64 = 100;

/// Request body as received. Fields stay untyped until validated, so a
/// wrongly typed field becomes a message instead of a parse failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OrderPayload {
    #[serde(default)]
    pub firstname: Value,
    #[serde(default)]
    pub lastname: Value,
    #[serde(default)]
    pub phonenumber: Value,
    #[serde(default)]
    pub address: Value,
    #[serde(default)]
    pub products: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidOrder {
    pub customer: Customer,
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderLine {
    pub product: Id<Product>,
    pub quantity: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(Vec<String>);

impl ValidationErrors {
    pub fn single<S: Into<String>>(msg: S) -> Self {
        ValidationErrors(vec![msg.into()])
    }

    pub fn push<S: Into<String>>(&mut self, msg: S) {
        self.0.push(msg.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn messages(&self) -> &[String] {
        &self.0
    }

    pub fn into_messages(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str(&self.0.join("; "))
    }
}

pub fn validate(payload: &OrderPayload) -> Result<ValidOrder, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let firstname = text(&payload.firstname, "firstname", NAME_LEN, &mut errors);
    let lastname = text(&payload.lastname, "lastname", NAME_LEN, &mut errors);
    let phonenumber = phone(&payload.phonenumber, &mut errors);
    let address = text(&payload.address, "address", ADDRESS_LEN, &mut errors);
    let lines = product_lines(&payload.products, &mut errors);

    match (firstname, lastname, phonenumber, address, lines) {
        (Some(firstname), Some(lastname), Some(phonenumber), Some(address), Some(lines))
            if errors.is_empty() =>
        {
            Ok(ValidOrder {
                customer: Customer {
                    firstname,
                    lastname,
                    phonenumber,
                    address,
                },
                lines,
            })
        }
        _ => Err(errors),
    }
}

fn required<'a>(value: &'a Value, field: &str, errors: &mut ValidationErrors) -> Option<&'a str> {
    match value {
        Value::Null => {
            errors.push(format!("{}: this field is required", field));
            None
        }
        Value::String(s) if s.trim().is_empty() => {
            errors.push(format!("{}: this field may not be blank", field));
            None
        }
        Value::String(s) => Some(s.trim()),
        other => {
            errors.push(format!(
                "{}: expected a string, got {}",
                field,
                kind_of(other)
            ));
            None
        }
    }
}

fn text(
    value: &Value,
    field: &str,
    (min, max): (usize, usize),
    errors: &mut ValidationErrors,
) -> Option<String> {
    let s = required(value, field, errors)?;
    let len = s.chars().count();
    if len < min {
        errors.push(format!("{}: must be at least {} characters", field, min));
        None
    } else if len > max {
        errors.push(format!("{}: must be at most {} characters", field, max));
        None
    } else {
        Some(s.to_string())
    }
}

fn phone(value: &Value, errors: &mut ValidationErrors) -> Option<String> {
    let raw = required(value, "phonenumber", errors)?;
    match phonenumber::parse(None, raw) {
        Ok(number) if phonenumber::is_valid(&number) => Some(
            number
                .format()
                .mode(phonenumber::Mode::E164)
                .to_string(),
        ),
        _ => {
            errors.push("phonenumber: not a valid international phone number");
            None
        }
    }
}

fn product_lines(value: &Value, errors: &mut ValidationErrors) -> Option<Vec<OrderLine>> {
    let entries = match value {
        Value::Null => {
            errors.push("products: this field is required");
            return None;
        }
        Value::Array(entries) if entries.is_empty() => {
            errors.push("products: this list may not be empty");
            return None;
        }
        Value::Array(entries) => entries,
        other => {
            errors.push(format!(
                "products: expected a list, got {}",
                kind_of(other)
            ));
            return None;
        }
    };

    let mut lines = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        if let Some(line) = product_line(i, entry, errors) {
            lines.push(line);
        }
    }
    if lines.len() == entries.len() {
        Some(lines)
    } else {
        None
    }
}

fn product_line(i: usize, entry: &Value, errors: &mut ValidationErrors) -> Option<OrderLine> {
    let entry = match entry.as_object() {
        Some(entry) => entry,
        None => {
            errors.push(format!(
                "products[{}]: expected an object, got {}",
                i,
                kind_of(entry)
            ));
            return None;
        }
    };

    let product = match entry.get("product").and_then(Value::as_i64) {
        Some(id) if id > 0 => Some(Id::new(id)),
        _ => {
            errors.push(format!(
                "products[{}].product: expected a positive integer id",
                i
            ));
            None
        }
    };
    let quantity = match entry.get("quantity").and_then(Value::as_i64) {
        Some(n) if (1..=MAX_QUANTITY).contains(&n) => Some(n as i32),
        _ => {
            errors.push(format!(
                "products[{}].quantity: expected an integer from 1 to {}",
                i, MAX_QUANTITY
            ));
            None
        }
    };

    Some(OrderLine {
        product: product?,
        quantity: quantity?,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
