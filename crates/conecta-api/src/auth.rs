use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::Rng;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use conecta_db::format_ts;
use conecta_db::models::NewUser;
use conecta_types::api::{
    Claims, LoginRequest, LoginResponse, PasswordResetConfirm, PasswordResetRequest,
    RegisterRequest, RegisterResponse,
};
use conecta_types::completion::{ProfileFields, completion_percentage};
use conecta_types::events::NotificationEvent;
use conecta_types::models::RoleName;

use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::mailer::notify;
use crate::profiles::load_profile;
use crate::state::AppState;
use crate::validate;

const TOKEN_TTL_DAYS: i64 = 30;
const RESET_TTL_HOURS: i64 = 1;

pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = validate::email(&req.email)?;
    validate::password(&req.password)?;
    let name = validate::required_text(&req.name, "Name", validate::MAX_NAME_LEN)?;

    let role = req.role.unwrap_or(RoleName::Emprendedor);
    if !role.is_self_assignable() {
        return Err(ApiError::validation(format!(
            "Role `{}` cannot be chosen at signup",
            role
        )));
    }

    let bootstrap_admin = state.config.is_admin_email(&email);
    let user_id = Uuid::new_v4();
    let completion = completion_percentage(&ProfileFields {
        name: Some(&name),
        ..Default::default()
    });

    let created = {
        let email = email.clone();
        let name = name.clone();
        let password = req.password;
        state
            .run_db(move |db| {
                let id = user_id.to_string();
                let password_hash = hash_password(&password)?;
                db.create_user(
                    &NewUser {
                        id: &id,
                        email: &email,
                        password_hash: &password_hash,
                        name: &name,
                        completion,
                    },
                    role,
                    bootstrap_admin,
                )
            })
            .await?
    };

    if created.is_none() {
        return Err(ApiError::Conflict("Email is already registered".into()));
    }
    info!("Registered user {} as {}", user_id, role);

    let token = create_token(&state.config.jwt_secret, user_id, &email)?;
    notify(state.mailer.clone(), email, NotificationEvent::Welcome { name });

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let password = req.password;

    let user = state
        .run_db(move |db| {
            let Some(user) = db.get_user_by_email(&email)? else {
                return Ok(None);
            };
            Ok(verify_password(&password, &user.password)?.then_some(user))
        })
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Corrupt user id '{}': {}", user.id, e)))?;
    let token = create_token(&state.config.jwt_secret, user_id, &user.email)?;

    Ok(Json(LoginResponse {
        user_id,
        name: user.name,
        token,
    }))
}

/// Always answers 202 so the endpoint does not reveal which emails have accounts.
pub async fn request_password_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PasswordResetRequest>,
) -> ApiResult<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    let token = generate_reset_token();
    let token_hash = hash_reset_token(&token);
    let expires_at = format_ts(Utc::now() + Duration::hours(RESET_TTL_HOURS));

    let user = {
        let email = email.clone();
        state
            .run_db(move |db| {
                let Some(user) = db.get_user_by_email(&email)? else {
                    return Ok(None);
                };
                db.create_password_reset(&token_hash, &user.id, &expires_at)?;
                Ok(Some(user))
            })
            .await?
    };

    match user {
        Some(user) => {
            info!("Password reset requested for user {}", user.id);
            let reset_url = format!(
                "{}/reset-password?token={}",
                state.config.frontend_url, token
            );
            notify(
                state.mailer.clone(),
                user.email,
                NotificationEvent::PasswordReset { reset_url },
            );
        }
        None => debug!("Password reset requested for unknown email"),
    }

    Ok(StatusCode::ACCEPTED)
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<PasswordResetConfirm>,
) -> ApiResult<impl IntoResponse> {
    validate::password(&req.new_password)?;
    let token_hash = hash_reset_token(req.token.trim());
    let password = req.new_password;

    let consumed = state
        .run_db(move |db| {
            let password_hash = hash_password(&password)?;
            db.consume_password_reset(&token_hash, &password_hash)
        })
        .await?;

    if !consumed {
        return Err(ApiError::validation("Invalid or expired reset token"));
    }
    Ok(StatusCode::OK)
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let id = claims.sub.to_string();
    let profile = state
        .run_db(move |db| load_profile(db, &id))
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(profile))
}

pub fn create_token(secret: &str, user_id: Uuid, email: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        email: email.to_string(),
        exp: (Utc::now() + Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

pub fn decode_token(secret: &str, token: &str) -> anyhow::Result<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

/// Argon2id with a random salt.
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

pub fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed =
        PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("Corrupt password hash: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// 32 random bytes, URL-safe base64. Only the SHA-256 of this value is stored.
fn generate_reset_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn hash_reset_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_and_wrong_secret() {
        let id = Uuid::new_v4();
        let token = create_token("secret-a", id, "ana@example.com").unwrap();

        let claims = decode_token("secret-a", &token).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, "ana@example.com");

        assert!(decode_token("secret-b", &token).is_err());
        assert!(decode_token("secret-a", "not.a.jwt").is_err());
    }

    #[test]
    fn password_hashes_verify() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
        assert!(verify_password("x", "not-a-phc-string").is_err());
    }

    #[test]
    fn reset_tokens_are_unique_and_hashed() {
        let a = generate_reset_token();
        let b = generate_reset_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert_eq!(hash_reset_token(&a).len(), 64);
        assert_ne!(hash_reset_token(&a), a);
    }
}
