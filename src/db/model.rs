use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub created: Option<DateTime<Utc>>,
    pub lastlogin: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessToken {
    pub token: String,
    pub userid: String,
    pub created: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserProfile {
    pub user_id: String,
    pub region_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Region {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub center_lat: f64,
    pub center_lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Movie {
    pub id: i64,
    pub name: String,
    pub price: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: i64,
    pub comment: String,
    pub date: DateTime<Utc>,
    pub movie_id: i64,
    pub user_id: String,
    /// Author's username, joined in for display.
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    pub movie_id: i64,
    pub user_id: String,
    pub value: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MovieRequest {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A movie request as listed on the community page.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MovieRequestWithVotes {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub user_id: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub vote_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoteToggle {
    Added,
    Removed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,
    pub user_id: String,
    pub region_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub movie_id: i64,
    pub quantity: i64,
    pub price: i64,
}

/// Largest quantity accepted on a single order line.
pub const MAX_LINE_QUANTITY: i64 = 10_000;

/// Requested line of a new order; price is taken from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub movie_id: i64,
    pub quantity: i64,
}

/// One purchase line joined with its order, movie and region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LineItem {
    pub id: i64,
    pub movie_id: i64,
    pub movie_name: String,
    pub quantity: i64,
    pub region_id: Option<i64>,
    pub region_code: Option<String>,
    pub region_name: Option<String>,
    pub order_date: DateTime<Utc>,
    pub user_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Invalid: {0}")]
    Invalid(String),
}

pub type DbResult<T> = Result<T, DbError>;
