use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // argon2 PHC string, never exposed in JSON
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub date_joined: OffsetDateTime, // write-once, set by the database
}

/// Column values for a new row. Flags and `date_joined` come from the table
/// defaults: active, non-privileged, joined now.
#[derive(Debug)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl User {
    /// All users, oldest first.
    pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, phone,
                   is_active, is_staff, is_superuser, date_joined
            FROM users
            ORDER BY id
            "#,
        )
        .fetch_all(db)
        .await?;
        Ok(users)
    }

    pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, phone,
                   is_active, is_staff, is_superuser, date_joined
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// Find a user by (normalized) email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, first_name, last_name, phone,
                   is_active, is_staff, is_superuser, date_joined
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    /// True if another row (id != `exclude_id`) already claims this email.
    pub async fn email_taken(
        db: &PgPool,
        email: &str,
        exclude_id: Option<i64>,
    ) -> anyhow::Result<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND id != COALESCE($2, -1))",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(db)
        .await?;
        Ok(taken)
    }

    pub async fn insert(db: &PgPool, new: NewUser) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, first_name, last_name, phone)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, password_hash, first_name, last_name, phone,
                      is_active, is_staff, is_superuser, date_joined
            "#,
        )
        .bind(new.email)
        .bind(new.password_hash)
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.phone)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Persist the mutable columns. `id`, `date_joined` and the privilege
    /// flags are never written here.
    pub async fn update(db: &PgPool, user: &User) -> anyhow::Result<User> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, first_name = $4, last_name = $5, phone = $6
            WHERE id = $1
            RETURNING id, email, password_hash, first_name, last_name, phone,
                      is_active, is_staff, is_superuser, date_joined
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .fetch_one(db)
        .await?;
        Ok(updated)
    }

    /// Delete outright; returns false when no row matched.
    pub async fn delete(db: &PgPool, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn sample() -> User {
        User {
            id: 1,
            email: "a@x.com".into(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$abc$def".into(),
            first_name: "A".into(),
            last_name: "B".into(),
            phone: None,
            is_active: true,
            is_staff: false,
            is_superuser: false,
            date_joined: datetime!(2024-05-01 12:00:00 UTC),
        }
    }

    #[test]
    fn password_hash_never_serializes() {
        let json = serde_json::to_string(&sample()).expect("serialize");
        assert!(!json.contains("password"));
        assert!(!json.contains("argon2"));
    }
}
