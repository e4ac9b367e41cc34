use lazy_static::lazy_static;
use regex::Regex;
use sqlx::PgPool;
use thiserror::Error;
use tracing::warn;

use crate::auth::password::{hash_password, verify_password};
use crate::error::FieldErrors;
use crate::users::dto::{CreateUserRequest, UpdateUserRequest};
use crate::users::repo::{NewUser, User};

const MSG_EMAIL_REQUIRED: &str = "El Email es obligatorio";
const MSG_EMAIL_INVALID: &str = "Correo electrónico inválido";
const MSG_EMAIL_TAKEN: &str = "Error el correo ya existe";
const MSG_PASSWORD_REQUIRED: &str = "La contraseña es obligatoria";
const MSG_PASSWORD_SHORT: &str = "La contraseña debe tener al menos 8 caracteres";
const MSG_FIELD_REQUIRED: &str = "Este campo es obligatorio";

const PASSWORD_MIN_CHARS: usize = 8;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("validation failed")]
    Invalid(FieldErrors),
    #[error(transparent)]
    Db(#[from] anyhow::Error),
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Lowercase only the domain part, leaving the local part as typed.
pub(crate) fn normalize_email(email: &str) -> String {
    let email = email.trim();
    match email.rsplit_once('@') {
        Some((local, domain)) => format!("{local}@{}", domain.to_lowercase()),
        None => email.to_string(),
    }
}

fn push(errors: &mut FieldErrors, field: &'static str, message: &str) {
    errors.entry(field).or_default().push(message.to_string());
}

/// Creation payload after field screening. Each value is present iff its
/// field passed; `errors` collects everything that did not.
#[derive(Debug, Default)]
pub(crate) struct ScreenedCreate {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub errors: FieldErrors,
}

pub(crate) fn screen_create(payload: CreateUserRequest) -> ScreenedCreate {
    let mut out = ScreenedCreate {
        phone: payload.phone.filter(|p| !p.trim().is_empty()),
        ..Default::default()
    };

    match payload.email.as_deref().map(normalize_email) {
        Some(email) if !email.is_empty() => {
            if is_valid_email(&email) {
                out.email = Some(email);
            } else {
                push(&mut out.errors, "email", MSG_EMAIL_INVALID);
            }
        }
        _ => push(&mut out.errors, "email", MSG_EMAIL_REQUIRED),
    }

    match payload.password {
        Some(password) if !password.is_empty() => {
            if password.chars().count() < PASSWORD_MIN_CHARS {
                push(&mut out.errors, "password", MSG_PASSWORD_SHORT);
            } else {
                out.password = Some(password);
            }
        }
        _ => push(&mut out.errors, "password", MSG_PASSWORD_REQUIRED),
    }

    match payload.first_name {
        Some(name) if !name.trim().is_empty() => out.first_name = Some(name),
        _ => push(&mut out.errors, "first_name", MSG_FIELD_REQUIRED),
    }

    match payload.last_name {
        Some(name) if !name.trim().is_empty() => out.last_name = Some(name),
        _ => push(&mut out.errors, "last_name", MSG_FIELD_REQUIRED),
    }

    out
}

/// Validate, normalize, hash and persist a new user. The only code path that
/// inserts into `users`, so a record can never be stored with a raw password.
///
/// The uniqueness pre-check gives the friendly per-field 400; a concurrent
/// insert that slips past it still dies on the database constraint and
/// surfaces through `UserError::Db`.
pub async fn create_user(db: &PgPool, payload: CreateUserRequest) -> Result<User, UserError> {
    let mut screened = screen_create(payload);

    if let Some(email) = &screened.email {
        if User::email_taken(db, email, None).await? {
            warn!(email = %email, "create rejected: email already registered");
            push(&mut screened.errors, "email", MSG_EMAIL_TAKEN);
        }
    }

    if !screened.errors.is_empty() {
        return Err(UserError::Invalid(screened.errors));
    }

    let (email, password, first_name, last_name) = match (
        screened.email,
        screened.password,
        screened.first_name,
        screened.last_name,
    ) {
        (Some(e), Some(p), Some(f), Some(l)) => (e, p, f, l),
        _ => return Err(UserError::Invalid(screened.errors)),
    };

    let password_hash = hash_password(&password)?;
    let user = User::insert(
        db,
        NewUser {
            email,
            password_hash,
            first_name,
            last_name,
            phone: screened.phone,
        },
    )
    .await?;
    Ok(user)
}

/// Apply a partial update. A supplied password is re-hashed; `id`,
/// `date_joined` and the privilege flags are never touched.
pub async fn update_user(
    db: &PgPool,
    mut user: User,
    changes: UpdateUserRequest,
) -> Result<User, UserError> {
    let mut errors = FieldErrors::new();

    if let Some(email) = changes.email {
        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            push(&mut errors, "email", MSG_EMAIL_INVALID);
        } else if User::email_taken(db, &email, Some(user.id)).await? {
            warn!(user_id = user.id, email = %email, "update rejected: email already registered");
            push(&mut errors, "email", MSG_EMAIL_TAKEN);
        } else {
            user.email = email;
        }
    }

    if let Some(first_name) = changes.first_name {
        if first_name.trim().is_empty() {
            push(&mut errors, "first_name", MSG_FIELD_REQUIRED);
        } else {
            user.first_name = first_name;
        }
    }

    if let Some(last_name) = changes.last_name {
        if last_name.trim().is_empty() {
            push(&mut errors, "last_name", MSG_FIELD_REQUIRED);
        } else {
            user.last_name = last_name;
        }
    }

    if let Some(phone) = changes.phone {
        user.phone = if phone.trim().is_empty() { None } else { Some(phone) };
    }

    if let Some(password) = changes.password {
        if password.chars().count() < PASSWORD_MIN_CHARS {
            push(&mut errors, "password", MSG_PASSWORD_SHORT);
        } else {
            user.password_hash = hash_password(&password)?;
        }
    }

    if !errors.is_empty() {
        return Err(UserError::Invalid(errors));
    }

    let updated = User::update(db, &user).await?;
    Ok(updated)
}

/// Look up by normalized email and check the password. `Ok(None)` on any
/// mismatch: unknown email, inactive account or wrong password. The caller
/// cannot tell which, and no lockout or rate limiting is applied.
pub async fn authenticate(
    db: &PgPool,
    email: &str,
    password: &str,
) -> anyhow::Result<Option<User>> {
    let email = normalize_email(email);
    let Some(user) = User::find_by_email(db, &email).await? else {
        warn!(email = %email, "authenticate: unknown email");
        return Ok(None);
    };
    if !user.is_active {
        warn!(user_id = user.id, "authenticate: inactive account");
        return Ok(None);
    }
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = user.id, "authenticate: password mismatch");
        return Ok(None);
    }
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_payload() -> CreateUserRequest {
        CreateUserRequest {
            email: Some("a@x.com".into()),
            password: Some("longpass1".into()),
            first_name: Some("A".into()),
            last_name: Some("B".into()),
            phone: None,
        }
    }

    #[test]
    fn normalize_email_lowercases_domain_only() {
        assert_eq!(normalize_email("Ana.Lopez@EXAMPLE.Com"), "Ana.Lopez@example.com");
        assert_eq!(normalize_email("  a@x.com  "), "a@x.com");
        assert_eq!(normalize_email("not-an-email"), "not-an-email");
    }

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("invalid_email"));
        assert!(!is_valid_email("user@nodot"));
        assert!(!is_valid_email("spaced user@example.com"));
    }

    #[test]
    fn screen_accepts_complete_payload() {
        let screened = screen_create(full_payload());
        assert!(screened.errors.is_empty());
        assert_eq!(screened.email.as_deref(), Some("a@x.com"));
        assert_eq!(screened.password.as_deref(), Some("longpass1"));
    }

    #[test]
    fn screen_reports_every_missing_field() {
        let screened = screen_create(CreateUserRequest {
            email: None,
            password: None,
            first_name: None,
            last_name: None,
            phone: None,
        });
        assert_eq!(screened.errors.len(), 4);
        assert_eq!(screened.errors["email"], vec![MSG_EMAIL_REQUIRED]);
        assert_eq!(screened.errors["password"], vec![MSG_PASSWORD_REQUIRED]);
        assert_eq!(screened.errors["first_name"], vec![MSG_FIELD_REQUIRED]);
        assert_eq!(screened.errors["last_name"], vec![MSG_FIELD_REQUIRED]);
    }

    #[test]
    fn screen_rejects_short_password() {
        let mut payload = full_payload();
        payload.password = Some("short".into());
        let screened = screen_create(payload);
        assert_eq!(screened.errors["password"], vec![MSG_PASSWORD_SHORT]);
        assert!(screened.password.is_none());
    }

    #[test]
    fn screen_rejects_malformed_email_but_keeps_other_fields() {
        let mut payload = full_payload();
        payload.email = Some("invalid_email".into());
        let screened = screen_create(payload);
        assert_eq!(screened.errors["email"], vec![MSG_EMAIL_INVALID]);
        assert!(screened.email.is_none());
        assert_eq!(screened.first_name.as_deref(), Some("A"));
    }

    #[test]
    fn screen_normalizes_email_domain() {
        let mut payload = full_payload();
        payload.email = Some("Ana@EXAMPLE.COM".into());
        let screened = screen_create(payload);
        assert_eq!(screened.email.as_deref(), Some("Ana@example.com"));
    }

    #[test]
    fn screen_drops_blank_phone() {
        let mut payload = full_payload();
        payload.phone = Some("   ".into());
        let screened = screen_create(payload);
        assert!(screened.phone.is_none());
        assert!(screened.errors.is_empty());
    }

    #[test]
    fn password_minimum_counts_characters_not_bytes() {
        let mut payload = full_payload();
        // eight multi-byte characters
        payload.password = Some("ññññññññ".into());
        let screened = screen_create(payload);
        assert!(screened.errors.is_empty());
        assert!(screened.password.is_some());
    }
}
