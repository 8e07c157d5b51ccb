use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::RwLock;
use tracing::info;

use super::model::*;
use super::repo::*;

pub struct SqliteRepository {
    pool: SqlitePool,
    token_cache: Arc<RwLock<HashMap<String, AccessToken>>>,
}

fn not_found(what: String) -> impl FnOnce(sqlx::Error) -> DbError {
    move |e| match e {
        sqlx::Error::RowNotFound => DbError::NotFound(what),
        _ => DbError::Sqlx(e),
    }
}

/// Escapes LIKE wildcards so a search term matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl SqliteRepository {
    pub async fn new(db_path: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(db_path)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to an in-memory database gets its own database,
        // so those are pinned to one long-lived connection.
        let pool = if db_path.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None::<std::time::Duration>)
                .max_lifetime(None::<std::time::Duration>)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let repo = Self {
            pool,
            token_cache: Arc::new(RwLock::new(HashMap::new())),
        };

        repo.init_schema().await?;

        info!("Database initialized at {}", db_path);

        Ok(repo)
    }

    async fn init_schema(&self) -> DbResult<()> {
        let schema = include_str!("schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
impl SqliteRepository {
    /// Inserts a movie and returns its id; production catalogs go through
    /// `seed_movie`.
    pub(crate) async fn create_movie(&self, name: &str, price: i64, description: &str) -> DbResult<i64> {
        let result = sqlx::query("INSERT INTO movies (name, price, description) VALUES (?, ?, ?)")
            .bind(name)
            .bind(price)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DbError::AlreadyExists(format!("Movie already exists: {}", name))
                }
                _ => DbError::Sqlx(e),
            })?;
        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl UserRepo for SqliteRepository {
    async fn get_user(&self, username: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password, created, lastlogin FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User not found: {}", username)))
    }

    async fn get_user_by_id(&self, id: &str) -> DbResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password, created, lastlogin FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("User not found: {}", id)))
    }

    async fn create_user(&self, user: &User) -> DbResult<()> {
        sqlx::query("INSERT INTO users (id, username, password, created, lastlogin) VALUES (?, ?, ?, ?, ?)")
            .bind(&user.id)
            .bind(&user.username)
            .bind(&user.password)
            .bind(user.created)
            .bind(user.lastlogin)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DbError::AlreadyExists(format!("User already exists: {}", user.username))
                }
                _ => DbError::Sqlx(e),
            })?;
        Ok(())
    }

    async fn touch_lastlogin(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE users SET lastlogin = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl AccessTokenRepo for SqliteRepository {
    async fn get_token(&self, token: &str) -> DbResult<AccessToken> {
        {
            let cache = self.token_cache.read().await;
            if let Some(t) = cache.get(token) {
                return Ok(t.clone());
            }
        }

        let access_token = sqlx::query_as::<_, AccessToken>(
            "SELECT token, userid, created FROM accesstokens WHERE token = ?",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found("Token not found".to_string()))?;

        let mut cache = self.token_cache.write().await;
        cache.insert(token.to_string(), access_token.clone());

        Ok(access_token)
    }

    async fn upsert_token(&self, token: &AccessToken) -> DbResult<()> {
        sqlx::query("INSERT OR REPLACE INTO accesstokens (token, userid, created) VALUES (?, ?, ?)")
            .bind(&token.token)
            .bind(&token.userid)
            .bind(token.created)
            .execute(&self.pool)
            .await?;

        let mut cache = self.token_cache.write().await;
        cache.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn delete_token(&self, token: &str) -> DbResult<()> {
        {
            let mut cache = self.token_cache.write().await;
            cache.remove(token);
        }

        sqlx::query("DELETE FROM accesstokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProfileRepo for SqliteRepository {
    async fn create_profile(&self, user_id: &str, region_id: Option<i64>) -> DbResult<()> {
        sqlx::query("INSERT OR IGNORE INTO profiles (user_id, region_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(region_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> DbResult<UserProfile> {
        sqlx::query_as::<_, UserProfile>("SELECT user_id, region_id FROM profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Profile not found: {}", user_id)))
    }

    async fn set_profile_region(&self, user_id: &str, region_id: Option<i64>) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, region_id) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET region_id = excluded.region_id",
        )
        .bind(user_id)
        .bind(region_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RegionRepo for SqliteRepository {
    async fn list_regions(&self) -> DbResult<Vec<Region>> {
        let regions = sqlx::query_as::<_, Region>(
            "SELECT id, name, code, center_lat, center_lng FROM regions ORDER BY name, id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(regions)
    }

    async fn get_region(&self, id: i64) -> DbResult<Region> {
        sqlx::query_as::<_, Region>(
            "SELECT id, name, code, center_lat, center_lng FROM regions WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Region not found: {}", id)))
    }

    async fn get_region_by_code(&self, code: &str) -> DbResult<Region> {
        sqlx::query_as::<_, Region>(
            "SELECT id, name, code, center_lat, center_lng FROM regions WHERE code = ?",
        )
        .bind(code)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Region not found: {}", code)))
    }
}

#[async_trait]
impl MovieRepo for SqliteRepository {
    async fn list_movies(&self, search: Option<&str>) -> DbResult<Vec<Movie>> {
        let movies = match search {
            Some(term) => {
                sqlx::query_as::<_, Movie>(
                    "SELECT id, name, price, description FROM movies
                     WHERE name LIKE ? ESCAPE '\\' ORDER BY name, id",
                )
                .bind(like_pattern(term))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Movie>(
                    "SELECT id, name, price, description FROM movies ORDER BY name, id",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(movies)
    }

    async fn get_movie(&self, id: i64) -> DbResult<Movie> {
        sqlx::query_as::<_, Movie>("SELECT id, name, price, description FROM movies WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Movie not found: {}", id)))
    }

    async fn seed_movie(&self, name: &str, price: i64, description: &str) -> DbResult<()> {
        sqlx::query("INSERT OR IGNORE INTO movies (name, price, description) VALUES (?, ?, ?)")
            .bind(name)
            .bind(price)
            .bind(description)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

const REVIEW_SELECT: &str = "SELECT r.id, r.comment, r.date, r.movie_id, r.user_id, u.username
    FROM reviews r JOIN users u ON u.id = r.user_id";

#[async_trait]
impl ReviewRepo for SqliteRepository {
    async fn list_reviews(&self, movie_id: i64) -> DbResult<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(&format!(
            "{} WHERE r.movie_id = ? ORDER BY r.date, r.id",
            REVIEW_SELECT
        ))
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(reviews)
    }

    async fn create_review(&self, movie_id: i64, user_id: &str, comment: &str) -> DbResult<i64> {
        let result = sqlx::query("INSERT INTO reviews (comment, date, movie_id, user_id) VALUES (?, ?, ?, ?)")
            .bind(comment)
            .bind(Utc::now())
            .bind(movie_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_own_review(&self, id: i64, user_id: &str) -> DbResult<Review> {
        sqlx::query_as::<_, Review>(&format!("{} WHERE r.id = ? AND r.user_id = ?", REVIEW_SELECT))
            .bind(id)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(not_found(format!("Review not found: {}", id)))
    }

    async fn update_review(&self, id: i64, user_id: &str, comment: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE reviews SET comment = ? WHERE id = ? AND user_id = ?")
            .bind(comment)
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Review not found: {}", id)));
        }
        Ok(())
    }

    async fn delete_review(&self, id: i64, user_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Review not found: {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RatingRepo for SqliteRepository {
    async fn upsert_rating(&self, movie_id: i64, user_id: &str, value: i64) -> DbResult<()> {
        if !(1..=5).contains(&value) {
            return Err(DbError::Invalid(format!("Rating out of range: {}", value)));
        }
        sqlx::query(
            "INSERT INTO ratings (movie_id, user_id, value) VALUES (?, ?, ?)
             ON CONFLICT(movie_id, user_id) DO UPDATE SET value = excluded.value",
        )
        .bind(movie_id)
        .bind(user_id)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_rating(&self, movie_id: i64, user_id: &str) -> DbResult<Rating> {
        sqlx::query_as::<_, Rating>(
            "SELECT id, movie_id, user_id, value FROM ratings WHERE movie_id = ? AND user_id = ?",
        )
        .bind(movie_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Rating not found: {}/{}", movie_id, user_id)))
    }

    async fn rating_summary(&self, movie_id: i64) -> DbResult<RatingSummary> {
        let (average, count) = sqlx::query_as::<_, (Option<f64>, i64)>(
            "SELECT AVG(value), COUNT(*) FROM ratings WHERE movie_id = ?",
        )
        .bind(movie_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(RatingSummary { average, count })
    }
}

#[async_trait]
impl MovieRequestRepo for SqliteRepository {
    async fn create_request(&self, user_id: &str, name: &str, description: &str) -> DbResult<i64> {
        let result = sqlx::query(
            "INSERT INTO movie_requests (name, description, user_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn get_request(&self, id: i64) -> DbResult<MovieRequest> {
        sqlx::query_as::<_, MovieRequest>(
            "SELECT id, name, description, user_id, created_at FROM movie_requests WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found(format!("Request not found: {}", id)))
    }

    async fn list_requests_by_user(&self, user_id: &str) -> DbResult<Vec<MovieRequest>> {
        let requests = sqlx::query_as::<_, MovieRequest>(
            "SELECT id, name, description, user_id, created_at FROM movie_requests
             WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn list_requests_with_votes(&self) -> DbResult<Vec<MovieRequestWithVotes>> {
        let requests = sqlx::query_as::<_, MovieRequestWithVotes>(
            "SELECT r.id, r.name, r.description, r.user_id, u.username, r.created_at,
                    COUNT(v.id) AS vote_count
             FROM movie_requests r
             JOIN users u ON u.id = r.user_id
             LEFT JOIN movie_request_votes v ON v.request_id = r.id
             GROUP BY r.id
             ORDER BY r.created_at DESC, r.id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(requests)
    }

    async fn delete_request(&self, id: i64, user_id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM movie_requests WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Request not found: {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl VoteRepo for SqliteRepository {
    async fn toggle_vote(&self, request_id: i64, user_id: &str) -> DbResult<VoteToggle> {
        self.get_request(request_id).await?;

        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM movie_request_votes WHERE request_id = ? AND user_id = ?")
            .bind(request_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let outcome = if removed > 0 {
            VoteToggle::Removed
        } else {
            // The unique (request_id, user_id) index keeps a racing toggle from duplicating.
            sqlx::query(
                "INSERT OR IGNORE INTO movie_request_votes (request_id, user_id, created_at) VALUES (?, ?, ?)",
            )
            .bind(request_id)
            .bind(user_id)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await?;
            VoteToggle::Added
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn voted_request_ids(&self, user_id: &str) -> DbResult<Vec<i64>> {
        let results = sqlx::query_as::<_, (i64,)>(
            "SELECT request_id FROM movie_request_votes WHERE user_id = ? ORDER BY request_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results.into_iter().map(|r| r.0).collect())
    }
}

#[async_trait]
impl OrderRepo for SqliteRepository {
    async fn create_order(
        &self,
        user_id: &str,
        region_id: Option<i64>,
        lines: &[NewOrderLine],
        date: DateTime<Utc>,
    ) -> DbResult<Order> {
        if lines.is_empty() {
            return Err(DbError::Invalid("Order has no items".to_string()));
        }
        if let Some(line) = lines
            .iter()
            .find(|l| l.quantity <= 0 || l.quantity > MAX_LINE_QUANTITY)
        {
            return Err(DbError::Invalid(format!(
                "Quantity must be between 1 and {} for movie {}",
                MAX_LINE_QUANTITY, line.movie_id
            )));
        }

        let mut tx = self.pool.begin().await?;

        let mut priced = Vec::with_capacity(lines.len());
        let mut total = 0i64;
        for line in lines {
            let (price,) = sqlx::query_as::<_, (i64,)>("SELECT price FROM movies WHERE id = ?")
                .bind(line.movie_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(not_found(format!("Movie not found: {}", line.movie_id)))?;
            total = price
                .checked_mul(line.quantity)
                .and_then(|amount| total.checked_add(amount))
                .ok_or_else(|| DbError::Invalid("Order total out of range".to_string()))?;
            priced.push((line, price));
        }

        let order_id = sqlx::query("INSERT INTO orders (user_id, region_id, date, total) VALUES (?, ?, ?, ?)")
            .bind(user_id)
            .bind(region_id)
            .bind(date)
            .bind(total)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for (line, price) in priced {
            sqlx::query("INSERT INTO items (order_id, movie_id, quantity, price) VALUES (?, ?, ?, ?)")
                .bind(order_id)
                .bind(line.movie_id)
                .bind(line.quantity)
                .bind(price)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Order {
            id: order_id,
            user_id: user_id.to_string(),
            region_id,
            date,
            total,
        })
    }

    async fn list_order_items(&self, order_id: i64) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(
            "SELECT id, order_id, movie_id, quantity, price FROM items WHERE order_id = ? ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn list_line_items(&self) -> DbResult<Vec<LineItem>> {
        let items = sqlx::query_as::<_, LineItem>(
            "SELECT i.id, i.movie_id, m.name AS movie_name, i.quantity,
                    o.region_id, r.code AS region_code, r.name AS region_name,
                    o.date AS order_date, o.user_id
             FROM items i
             JOIN orders o ON o.id = i.order_id
             JOIN movies m ON m.id = i.movie_id
             LEFT JOIN regions r ON r.id = o.region_id
             ORDER BY i.id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    async fn memory_repo() -> SqliteRepository {
        SqliteRepository::new("sqlite::memory:").await.unwrap()
    }

    async fn add_user(repo: &SqliteRepository, username: &str) -> String {
        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            password: String::new(),
            created: Some(Utc::now()),
            lastlogin: None,
        };
        repo.create_user(&user).await.unwrap();
        repo.create_profile(&user.id, None).await.unwrap();
        user.id
    }

    #[tokio::test]
    async fn test_regions_are_seeded_once() {
        let repo = memory_repo().await;
        repo.init_schema().await.unwrap();
        let regions = repo.list_regions().await.unwrap();
        assert_eq!(regions.len(), 5);
        assert_eq!(regions[0].name, "Midwest US");
        let region = repo.get_region_by_code("west-coast-us").await.unwrap();
        assert_eq!(region.center_lat, 34.0522);
        assert!(matches!(
            repo.get_region_by_code("mars").await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let repo = memory_repo().await;
        add_user(&repo, "alice").await;
        let dup = User {
            id: uuid::Uuid::new_v4().to_string(),
            username: "alice".to_string(),
            password: String::new(),
            created: None,
            lastlogin: None,
        };
        assert!(matches!(repo.create_user(&dup).await, Err(DbError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_movie_search_is_case_insensitive_and_literal() {
        let repo = memory_repo().await;
        repo.create_movie("The Matrix", 10, "").await.unwrap();
        repo.create_movie("Inception", 12, "").await.unwrap();
        repo.create_movie("100% Wolf", 8, "").await.unwrap();

        let found = repo.list_movies(Some("matrix")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "The Matrix");

        let found = repo.list_movies(Some("%")).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "100% Wolf");

        assert_eq!(repo.list_movies(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_seed_movie_is_idempotent() {
        let repo = memory_repo().await;
        repo.seed_movie("Avatar", 15, "Blue").await.unwrap();
        repo.seed_movie("Avatar", 99, "Changed").await.unwrap();
        let movies = repo.list_movies(None).await.unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].price, 15);
    }

    #[tokio::test]
    async fn test_review_owner_scoping() {
        let repo = memory_repo().await;
        let alice = add_user(&repo, "alice").await;
        let bob = add_user(&repo, "bob").await;
        let movie = repo.create_movie("Heat", 9, "").await.unwrap();

        let review = repo.create_review(movie, &alice, "Great").await.unwrap();
        assert!(matches!(
            repo.get_own_review(review, &bob).await,
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            repo.update_review(review, &bob, "Bad").await,
            Err(DbError::NotFound(_))
        ));
        assert!(matches!(
            repo.delete_review(review, &bob).await,
            Err(DbError::NotFound(_))
        ));

        repo.update_review(review, &alice, "Still great").await.unwrap();
        let reviews = repo.list_reviews(movie).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].comment, "Still great");
        assert_eq!(reviews[0].username, "alice");

        repo.delete_review(review, &alice).await.unwrap();
        assert!(repo.list_reviews(movie).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rating_upsert_keeps_latest() {
        let repo = memory_repo().await;
        let alice = add_user(&repo, "alice").await;
        let bob = add_user(&repo, "bob").await;
        let movie = repo.create_movie("Heat", 9, "").await.unwrap();

        repo.upsert_rating(movie, &alice, 2).await.unwrap();
        repo.upsert_rating(movie, &alice, 5).await.unwrap();
        repo.upsert_rating(movie, &bob, 4).await.unwrap();

        assert_eq!(repo.get_rating(movie, &alice).await.unwrap().value, 5);
        let summary = repo.rating_summary(movie).await.unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.average, Some(4.5));

        assert!(matches!(
            repo.upsert_rating(movie, &alice, 6).await,
            Err(DbError::Invalid(_))
        ));
        assert_eq!(repo.get_rating(movie, &alice).await.unwrap().value, 5);
    }

    #[tokio::test]
    async fn test_rating_summary_without_ratings() {
        let repo = memory_repo().await;
        let movie = repo.create_movie("Heat", 9, "").await.unwrap();
        let summary = repo.rating_summary(movie).await.unwrap();
        assert_eq!(summary.count, 0);
        assert_eq!(summary.average, None);
    }

    #[tokio::test]
    async fn test_vote_toggle_parity() {
        let repo = memory_repo().await;
        let alice = add_user(&repo, "alice").await;
        let bob = add_user(&repo, "bob").await;
        let request = repo.create_request(&alice, "Alien", "Classic").await.unwrap();

        assert_eq!(repo.toggle_vote(request, &bob).await.unwrap(), VoteToggle::Added);
        assert_eq!(repo.toggle_vote(request, &bob).await.unwrap(), VoteToggle::Removed);
        assert!(repo.voted_request_ids(&bob).await.unwrap().is_empty());

        for _ in 0..3 {
            repo.toggle_vote(request, &bob).await.unwrap();
        }
        assert_eq!(repo.voted_request_ids(&bob).await.unwrap(), vec![request]);

        let listed = repo.list_requests_with_votes().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].vote_count, 1);
        assert_eq!(listed[0].username, "alice");

        assert!(matches!(
            repo.toggle_vote(request + 100, &bob).await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_request_delete_is_owner_scoped() {
        let repo = memory_repo().await;
        let alice = add_user(&repo, "alice").await;
        let bob = add_user(&repo, "bob").await;
        let request = repo.create_request(&alice, "Alien", "Classic").await.unwrap();

        assert!(matches!(
            repo.delete_request(request, &bob).await,
            Err(DbError::NotFound(_))
        ));
        assert_eq!(repo.list_requests_by_user(&alice).await.unwrap().len(), 1);
        repo.delete_request(request, &alice).await.unwrap();
        assert!(repo.list_requests_by_user(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_and_line_items() {
        let repo = memory_repo().await;
        let alice = add_user(&repo, "alice").await;
        let a = repo.create_movie("A", 3, "").await.unwrap();
        let b = repo.create_movie("B", 7, "").await.unwrap();
        let region = repo.get_region_by_code("midwest-us").await.unwrap();
        let date = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        let order = repo
            .create_order(
                &alice,
                Some(region.id),
                &[
                    NewOrderLine { movie_id: a, quantity: 2 },
                    NewOrderLine { movie_id: b, quantity: 1 },
                ],
                date,
            )
            .await
            .unwrap();
        assert_eq!(order.total, 13);
        assert_eq!(repo.list_order_items(order.id).await.unwrap().len(), 2);

        let lines = repo.list_line_items().await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].movie_name, "A");
        assert_eq!(lines[0].region_code.as_deref(), Some("midwest-us"));
        assert_eq!(lines[0].order_date, date);
        assert_eq!(lines[0].user_id, alice);
    }

    #[tokio::test]
    async fn test_create_order_rejects_bad_lines() {
        let repo = memory_repo().await;
        let alice = add_user(&repo, "alice").await;
        let a = repo.create_movie("A", 3, "").await.unwrap();

        assert!(matches!(
            repo.create_order(&alice, None, &[], Utc::now()).await,
            Err(DbError::Invalid(_))
        ));
        assert!(matches!(
            repo.create_order(&alice, None, &[NewOrderLine { movie_id: a, quantity: 0 }], Utc::now())
                .await,
            Err(DbError::Invalid(_))
        ));
        assert!(matches!(
            repo.create_order(&alice, None, &[NewOrderLine { movie_id: a + 50, quantity: 1 }], Utc::now())
                .await,
            Err(DbError::NotFound(_))
        ));
        assert!(repo.list_line_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_rejects_out_of_range_amounts() {
        let repo = memory_repo().await;
        let alice = add_user(&repo, "alice").await;
        let cheap = repo.create_movie("Cheap", 3, "").await.unwrap();
        let pricey = repo.create_movie("Pricey", i64::MAX / 2, "").await.unwrap();

        let huge = NewOrderLine { movie_id: cheap, quantity: i64::MAX / 2 };
        assert!(matches!(
            repo.create_order(&alice, None, &[huge], Utc::now()).await,
            Err(DbError::Invalid(_))
        ));

        let overflowing = NewOrderLine { movie_id: pricey, quantity: 3 };
        assert!(matches!(
            repo.create_order(&alice, None, &[overflowing], Utc::now()).await,
            Err(DbError::Invalid(_))
        ));

        let at_cap = NewOrderLine { movie_id: cheap, quantity: MAX_LINE_QUANTITY };
        let order = repo
            .create_order(&alice, None, &[at_cap], Utc::now())
            .await
            .unwrap();
        assert_eq!(order.total, 3 * MAX_LINE_QUANTITY);
        assert_eq!(repo.list_line_items().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_token_roundtrip_and_delete() {
        let repo = memory_repo().await;
        let alice = add_user(&repo, "alice").await;
        let token = AccessToken {
            token: "tok".to_string(),
            userid: alice.clone(),
            created: Some(Utc::now()),
        };
        repo.upsert_token(&token).await.unwrap();
        assert_eq!(repo.get_token("tok").await.unwrap().userid, alice);
        repo.delete_token("tok").await.unwrap();
        assert!(matches!(repo.get_token("tok").await, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }
}
