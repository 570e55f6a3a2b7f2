//! Book model
//!
//! Books are a reference entity: catalog management lives elsewhere. The
//! circulation core reads them and settles `available_copies` around a
//! transaction's borrowed period.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: Option<String>,
    pub publication_year: Option<i32>,
    pub total_copies: i32,
    /// Copies currently on the shelf; never negative
    pub available_copies: i32,
    pub created_at: DateTime<Utc>,
}
