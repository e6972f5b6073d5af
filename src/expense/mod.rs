//! Expense management.
//!
//! This module contains everything related to expenses:
//! - The `Expense` model and `ExpenseBuilder` for creating expenses
//! - Database functions for storing, querying, and managing expenses
//! - Route handlers for the expense REST endpoints, including the attached media files

mod core;
mod create_endpoint;
mod delete_endpoint;
mod form;
mod list_endpoint;
mod media_endpoint;
mod query;
mod update_endpoint;

use std::sync::{Arc, Mutex};

use axum::extract::FromRef;
use rusqlite::Connection;

use crate::{
    AppState,
    media::{FileDeletion, MediaStore},
};

pub(crate) use core::date_format;
pub use core::{
    Expense, ExpenseChanges, ExpenseFilter, clear_media_file, create_expense,
    create_expense_table, delete_expense, get_expense, list_expenses, update_expense,
};
pub use create_endpoint::create_expense_endpoint;
pub use delete_endpoint::delete_expense_endpoint;
pub use form::ExpensePayload;
pub use list_endpoint::list_expenses_endpoint;
pub use media_endpoint::{delete_media_endpoint, get_media_endpoint};
pub use query::ExpenseQuery;
pub use update_endpoint::update_expense_endpoint;

/// The state needed by the expense route handlers.
#[derive(Debug, Clone)]
pub struct ExpenseState {
    /// The shared database connection.
    pub db_connection: Arc<Mutex<Connection>>,
    /// Where attached media files are kept.
    pub media_store: MediaStore,
}

impl FromRef<AppState> for ExpenseState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            media_store: state.media_store.clone(),
        }
    }
}

/// Delete a stored media file that is no longer referenced, logging instead of failing.
async fn discard_media_file(store: &MediaStore, file_name: &str) {
    match store.delete(file_name).await {
        Ok(FileDeletion::Deleted) => tracing::info!("Deleted media file {file_name}"),
        Ok(FileDeletion::Missing) => {
            tracing::warn!("Media file {file_name} was already gone")
        }
        Err(error) => tracing::error!("Could not delete media file {file_name}: {error}"),
    }
}
