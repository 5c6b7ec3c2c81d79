// src/auth.rs

use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{error, info};
use mongodb::bson::doc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::errors::ApiError;
use crate::models::User;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Debug, Deserialize)]
pub struct SignupInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginInfo {
    pub email: Option<String>,
    pub password: Option<String>,
}

pub fn create_jwt(user_id: &str, secret: &str) -> Result<String, ApiError> {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|e| {
        error!("Error signing token: {}", e);
        ApiError::Service("Internal Server Error".to_string())
    })
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// The authenticated user id placed into request extensions by the
/// Authentication middleware in main.rs.
pub fn current_user_id(req: &HttpRequest) -> Result<String, ApiError> {
    req.extensions()
        .get::<String>()
        .cloned()
        .ok_or_else(|| ApiError::Permission("Unauthorized".to_string()))
}

/// Resolves a user id (from the bearer token) to the stored account record.
pub async fn find_user(db: &mongodb::Database, user_id: &str) -> Result<User, ApiError> {
    db.collection::<User>("users")
        .find_one(doc! { "id": user_id })
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
        .map(|re| re.is_match(email))
        .unwrap_or(false)
}

// POST /auth/signup
pub async fn signup(
    data: web::Data<AppState>,
    info: web::Json<SignupInfo>,
) -> Result<HttpResponse, ApiError> {
    let (name, email, phone, password) = match (&info.name, &info.email, &info.phone, &info.password)
    {
        (Some(n), Some(e), Some(p), Some(pw)) => (n.trim(), e.trim(), p.trim(), pw.as_str()),
        _ => return Err(ApiError::Validation("Please fill all the fields".to_string())),
    };

    if name.is_empty() || email.is_empty() || phone.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("Please fill all the fields".to_string()));
    }
    if password.len() < 4 {
        return Err(ApiError::Validation(
            "Password length must be at least 4 characters".to_string(),
        ));
    }
    if !valid_email(email) {
        return Err(ApiError::Validation("Invalid Email".to_string()));
    }

    let users = data.mongodb.db.collection::<User>("users");

    if users.find_one(doc! { "email": email }).await?.is_some() {
        return Err(ApiError::Conflict(
            "This email is already registered".to_string(),
        ));
    }
    if users.find_one(doc! { "phone": phone }).await?.is_some() {
        return Err(ApiError::Conflict(
            "This phone number is already registered".to_string(),
        ));
    }

    let hashed_password = hash(password, DEFAULT_COST).map_err(|e| {
        error!("Error hashing password: {}", e);
        ApiError::Service("Internal Server Error".to_string())
    })?;

    let new_user = User {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        phone: phone.to_string(),
        password: hashed_password,
        created_at: Utc::now(),
    };
    users.insert_one(&new_user).await?;

    info!("Account created for {}", new_user.email);
    Ok(HttpResponse::Ok().json(json!({
        "msg": "Congratulations!! Account has been created for you.."
    })))
}

// POST /auth/login
pub async fn login(
    data: web::Data<AppState>,
    info: web::Json<LoginInfo>,
) -> Result<HttpResponse, ApiError> {
    let (email, password) = match (&info.email, &info.password) {
        (Some(e), Some(p)) => (e.trim(), p.as_str()),
        _ => return Err(ApiError::Validation("Please fill all the fields".to_string())),
    };
    if email.is_empty() || password.is_empty() {
        return Err(ApiError::Validation("Please fill all the fields".to_string()));
    }

    let users = data.mongodb.db.collection::<User>("users");
    let user = users
        .find_one(doc! { "email": email })
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid email or password".to_string()))?;

    if !verify(password, &user.password).unwrap_or(false) {
        return Err(ApiError::Validation("Invalid email or password".to_string()));
    }

    let token = create_jwt(&user.id, &data.config.jwt_secret)?;

    // Keep the hash out of the response body.
    let mut user_body = serde_json::to_value(&user).map_err(|e| {
        error!("Error serializing user: {}", e);
        ApiError::Service("Internal Server Error".to_string())
    })?;
    if let Some(obj) = user_body.as_object_mut() {
        obj.remove("password");
    }

    Ok(HttpResponse::Ok().json(json!({
        "token": token,
        "user": user_body,
        "status": true,
        "msg": "Login successful.."
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_validation() {
        assert!(valid_email("alice@example.com"));
        assert!(valid_email("a.b+c@sub.domain.io"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing@tld"));
        assert!(!valid_email("spaces in@example.com"));
    }

    #[test]
    fn jwt_round_trip() {
        let token = create_jwt("user-1", "test-secret").unwrap();
        let claims = validate_jwt(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn jwt_rejects_wrong_secret() {
        let token = create_jwt("user-1", "test-secret").unwrap();
        assert!(validate_jwt(&token, "other-secret").is_err());
    }
}
