use serde::{Deserialize, Serialize};

use crate::db::{Movie, MovieRequest, NewOrderLine, Order, OrderItem, RatingSummary, Review};
use crate::popularity::RegionInfo;

#[derive(Debug, Clone, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub password1: String,
    pub password2: String,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResult {
    pub user: UserInfo,
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormErrors {
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileView {
    pub username: String,
    pub region: Option<RegionInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovieSearch {
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieIndex {
    pub title: String,
    pub movies: Vec<Movie>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovieDetail {
    pub title: String,
    pub movie: Movie,
    pub reviews: Vec<Review>,
    pub rating: RatingSummary,
    pub user_rating: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewForm {
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RatingForm {
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestActionForm {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyRequests {
    pub title: String,
    pub my_requests: Vec<MovieRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityRequest {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub username: String,
    pub created_at: String,
    pub vote_count: i64,
    pub voted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunityRequests {
    pub title: String,
    pub requests: Vec<CommunityRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrder {
    pub items: Vec<NewOrderLine>,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order: Order,
    pub items: Vec<OrderItem>,
}
