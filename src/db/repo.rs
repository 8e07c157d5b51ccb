use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::*;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user(&self, username: &str) -> DbResult<User>;
    async fn get_user_by_id(&self, id: &str) -> DbResult<User>;
    async fn create_user(&self, user: &User) -> DbResult<()>;
    async fn touch_lastlogin(&self, id: &str) -> DbResult<()>;
}

#[async_trait]
pub trait AccessTokenRepo: Send + Sync {
    async fn get_token(&self, token: &str) -> DbResult<AccessToken>;
    async fn upsert_token(&self, token: &AccessToken) -> DbResult<()>;
    async fn delete_token(&self, token: &str) -> DbResult<()>;
}

#[async_trait]
pub trait ProfileRepo: Send + Sync {
    async fn create_profile(&self, user_id: &str, region_id: Option<i64>) -> DbResult<()>;
    async fn get_profile(&self, user_id: &str) -> DbResult<UserProfile>;
    async fn set_profile_region(&self, user_id: &str, region_id: Option<i64>) -> DbResult<()>;
}

#[async_trait]
pub trait RegionRepo: Send + Sync {
    async fn list_regions(&self) -> DbResult<Vec<Region>>;
    async fn get_region(&self, id: i64) -> DbResult<Region>;
    async fn get_region_by_code(&self, code: &str) -> DbResult<Region>;
}

#[async_trait]
pub trait MovieRepo: Send + Sync {
    async fn list_movies(&self, search: Option<&str>) -> DbResult<Vec<Movie>>;
    async fn get_movie(&self, id: i64) -> DbResult<Movie>;
    async fn seed_movie(&self, name: &str, price: i64, description: &str) -> DbResult<()>;
}

#[async_trait]
pub trait ReviewRepo: Send + Sync {
    async fn list_reviews(&self, movie_id: i64) -> DbResult<Vec<Review>>;
    async fn create_review(&self, movie_id: i64, user_id: &str, comment: &str) -> DbResult<i64>;
    /// Looks a review up by id and owner; other users' reviews are not found.
    async fn get_own_review(&self, id: i64, user_id: &str) -> DbResult<Review>;
    async fn update_review(&self, id: i64, user_id: &str, comment: &str) -> DbResult<()>;
    async fn delete_review(&self, id: i64, user_id: &str) -> DbResult<()>;
}

#[async_trait]
pub trait RatingRepo: Send + Sync {
    async fn upsert_rating(&self, movie_id: i64, user_id: &str, value: i64) -> DbResult<()>;
    async fn get_rating(&self, movie_id: i64, user_id: &str) -> DbResult<Rating>;
    async fn rating_summary(&self, movie_id: i64) -> DbResult<RatingSummary>;
}

#[async_trait]
pub trait MovieRequestRepo: Send + Sync {
    async fn create_request(&self, user_id: &str, name: &str, description: &str) -> DbResult<i64>;
    async fn get_request(&self, id: i64) -> DbResult<MovieRequest>;
    async fn list_requests_by_user(&self, user_id: &str) -> DbResult<Vec<MovieRequest>>;
    async fn list_requests_with_votes(&self) -> DbResult<Vec<MovieRequestWithVotes>>;
    async fn delete_request(&self, id: i64, user_id: &str) -> DbResult<()>;
}

#[async_trait]
pub trait VoteRepo: Send + Sync {
    async fn toggle_vote(&self, request_id: i64, user_id: &str) -> DbResult<VoteToggle>;
    async fn voted_request_ids(&self, user_id: &str) -> DbResult<Vec<i64>>;
}

#[async_trait]
pub trait OrderRepo: Send + Sync {
    async fn create_order(
        &self,
        user_id: &str,
        region_id: Option<i64>,
        lines: &[NewOrderLine],
        date: DateTime<Utc>,
    ) -> DbResult<Order>;
    async fn list_order_items(&self, order_id: i64) -> DbResult<Vec<OrderItem>>;
    async fn list_line_items(&self) -> DbResult<Vec<LineItem>>;
}
