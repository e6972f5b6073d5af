//! The query string filters shared by the expense list and the reports.

use serde::Deserialize;

use crate::{
    Error, FieldError,
    expense::{ExpenseFilter, form::parse_date},
};

/// Filters for listing expenses, as sent in the query string.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpenseQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub category: Option<String>,
}

impl ExpenseQuery {
    /// Parse the query into a filter, treating empty parameters as absent.
    ///
    /// # Errors
    ///
    /// Returns a [Error::Validation] if a date cannot be parsed.
    pub fn into_filter(self) -> Result<ExpenseFilter, Error> {
        let mut errors = Vec::new();

        let mut parse = |raw: Option<String>, field: &str| {
            let raw = raw.filter(|raw| !raw.trim().is_empty())?;
            let date = parse_date(&raw);
            if date.is_none() {
                errors.push(FieldError::new(field, "Invalid date format, use YYYY-MM-DD"));
            }
            date
        };

        let start_date = parse(self.start_date, "startDate");
        let end_date = parse(self.end_date, "endDate");

        if !errors.is_empty() {
            return Err(Error::Validation(errors));
        }

        Ok(ExpenseFilter {
            start_date,
            end_date,
            category: self
                .category
                .map(|category| category.trim().to_owned())
                .filter(|category| !category.is_empty()),
        })
    }
}
