//! Parses and validates the expense fields sent by clients, as JSON or as a multipart form.

use axum::{
    Json,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use serde::{Deserialize, Deserializer};
use time::{Date, OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    Error, FieldError,
    expense::{ExpenseChanges, date_format::DATE_FORMAT},
    media::{UploadedFile, read_file_field},
};

/// The expense fields exactly as the client sent them.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseInput {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Either a JSON number or a numeric string.
    #[serde(default, deserialize_with = "string_or_number")]
    pub amount: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(serde_json::Number),
}

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<StringOrNumber>::deserialize(deserializer)?;

    Ok(value.map(|value| match value {
        StringOrNumber::String(string) => string,
        StringOrNumber::Number(number) => number.to_string(),
    }))
}

/// The fields of a new expense after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedExpense {
    pub date: Date,
    pub category: String,
    pub amount: f64,
    pub description: Option<String>,
    pub payment_method: String,
}

impl ExpenseInput {
    /// Validate the fields for a new expense, every field except the description is required.
    ///
    /// # Errors
    ///
    /// Returns a [Error::Validation] listing every invalid or missing field.
    pub fn validate_new(self, today: Date) -> Result<ValidatedExpense, Error> {
        let mut errors = Vec::new();

        let date = match non_empty(self.date) {
            Some(raw) => parse_date_field(&raw, today).map_err(|e| errors.push(e)).ok(),
            None => {
                errors.push(FieldError::new("date", "Date is required"));
                None
            }
        };

        let category = non_empty(self.category);
        if category.is_none() {
            errors.push(FieldError::new("category", "Category is required"));
        }

        let amount = match non_empty(self.amount) {
            Some(raw) => parse_amount_field(&raw).map_err(|e| errors.push(e)).ok(),
            None => {
                errors.push(FieldError::new("amount", "Amount is required"));
                None
            }
        };

        let payment_method = non_empty(self.payment_method);
        if payment_method.is_none() {
            errors.push(FieldError::new("paymentMethod", "Payment method is required"));
        }

        match (date, category, amount, payment_method) {
            (Some(date), Some(category), Some(amount), Some(payment_method)) if errors.is_empty() => {
                Ok(ValidatedExpense {
                    date,
                    category,
                    amount,
                    description: non_empty(self.description),
                    payment_method,
                })
            }
            _ => Err(Error::Validation(errors)),
        }
    }

    /// Validate the fields present for an update. Empty fields count as absent.
    ///
    /// # Errors
    ///
    /// Returns a [Error::Validation] listing every invalid field.
    pub fn validate_changes(self, today: Date) -> Result<ExpenseChanges, Error> {
        let mut errors = Vec::new();

        let date = non_empty(self.date)
            .and_then(|raw| parse_date_field(&raw, today).map_err(|e| errors.push(e)).ok());
        let amount = non_empty(self.amount)
            .and_then(|raw| parse_amount_field(&raw).map_err(|e| errors.push(e)).ok());

        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        Ok(ExpenseChanges {
            date,
            category: non_empty(self.category),
            amount,
            description: non_empty(self.description),
            payment_method: non_empty(self.payment_method),
            media_file: None,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Parse a date given as "YYYY-MM-DD" or as an RFC 3339 date-time.
pub(crate) fn parse_date(raw: &str) -> Option<Date> {
    let raw = raw.trim();

    Date::parse(raw, DATE_FORMAT)
        .ok()
        .or_else(|| {
            OffsetDateTime::parse(raw, &Rfc3339)
                .ok()
                .map(|date_time| date_time.date())
        })
}

fn parse_date_field(raw: &str, today: Date) -> Result<Date, FieldError> {
    let date = parse_date(raw).ok_or_else(|| {
        FieldError::new("date", "Invalid date format, use YYYY-MM-DD")
    })?;

    if date > today {
        return Err(FieldError::new("date", "Expense date cannot be in the future"));
    }

    Ok(date)
}

fn parse_amount_field(raw: &str) -> Result<f64, FieldError> {
    match raw.trim().parse::<f64>() {
        Ok(amount) if amount.is_finite() => Ok(amount),
        _ => Err(FieldError::new("amount", "Amount must be a number")),
    }
}

/// An expense request body, with the optional media file when it was sent as a multipart form.
///
/// JSON bodies never carry a file.
#[derive(Debug, Default)]
pub struct ExpensePayload {
    pub input: ExpenseInput,
    pub file: Option<UploadedFile>,
}

impl<S> FromRequest<S> for ExpensePayload
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = request
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if is_multipart {
            let multipart = Multipart::from_request(request, state)
                .await
                .map_err(|error| Error::MultipartError(error.body_text()))?;

            return read_multipart(multipart).await;
        }

        let Json(input) = Json::<ExpenseInput>::from_request(request, state).await?;

        Ok(Self { input, file: None })
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<ExpensePayload, Error> {
    let mut payload = ExpensePayload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| Error::MultipartError(error.body_text()))?
    {
        // Browsers send an empty file part when no file was chosen.
        if field.file_name() == Some("") {
            continue;
        }

        if field.file_name().is_some() {
            let file = read_file_field(field, payload.file.is_some()).await?;
            payload.file = Some(file);
            continue;
        }

        let name = field.name().unwrap_or_default().to_owned();
        let value = field
            .text()
            .await
            .map_err(|error| Error::MultipartError(error.body_text()))?;

        let slot = match name.as_str() {
            "date" => &mut payload.input.date,
            "category" => &mut payload.input.category,
            "amount" => &mut payload.input.amount,
            "description" => &mut payload.input.description,
            "paymentMethod" => &mut payload.input.payment_method,
            _ => {
                tracing::debug!("Ignoring unknown form field {name}");
                continue;
            }
        };

        *slot = Some(value);
    }

    Ok(payload)
}
