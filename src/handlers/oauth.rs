// src/handlers/oauth.rs

use std::{fmt, str::FromStr};

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use url::Url;

use crate::{
    config::{Config, OAuthClient},
    error::AppError,
    handlers::auth::USER_COLUMNS,
    models::{
        envelope::Envelope,
        user::{AuthResponse, User},
    },
    state::AppState,
    utils::jwt::{sign_jwt, sign_oauth_state, verify_oauth_state},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Google => "google",
            Provider::Facebook => "facebook",
        }
    }

    fn authorize_endpoint(&self) -> &'static str {
        match self {
            Provider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            Provider::Facebook => "https://www.facebook.com/v19.0/dialog/oauth",
        }
    }

    fn token_endpoint(&self) -> &'static str {
        match self {
            Provider::Google => "https://oauth2.googleapis.com/token",
            Provider::Facebook => "https://graph.facebook.com/v19.0/oauth/access_token",
        }
    }

    fn profile_endpoint(&self) -> &'static str {
        match self {
            Provider::Google => "https://openidconnect.googleapis.com/v1/userinfo",
            Provider::Facebook => "https://graph.facebook.com/me?fields=id,name,email",
        }
    }

    fn scope(&self) -> &'static str {
        match self {
            Provider::Google => "openid email profile",
            Provider::Facebook => "email public_profile",
        }
    }

    fn client<'a>(&self, config: &'a Config) -> Result<&'a OAuthClient, AppError> {
        let client = match self {
            Provider::Google => config.oauth.google.as_ref(),
            Provider::Facebook => config.oauth.facebook.as_ref(),
        };
        client.ok_or_else(|| AppError::NotFound(format!("Sign-in with {} is not enabled", self)))
    }

    fn redirect_uri(&self, config: &Config) -> String {
        format!(
            "{}/api/auth/oauth/{}/callback",
            config.oauth.redirect_base.trim_end_matches('/'),
            self.as_str()
        )
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google" => Ok(Provider::Google),
            "facebook" => Ok(Provider::Facebook),
            other => Err(AppError::NotFound(format!("Unknown provider '{}'", other))),
        }
    }
}

/// Builds the provider's consent-screen URL.
pub fn authorize_url(
    provider: Provider,
    client: &OAuthClient,
    redirect_uri: &str,
    state: &str,
) -> Result<Url, AppError> {
    Url::parse_with_params(
        provider.authorize_endpoint(),
        &[
            ("client_id", client.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", provider.scope()),
            ("state", state),
        ],
    )
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    pub url: String,
    pub state: String,
}

/// Starts a sign-in: returns the consent URL and the signed state it carries.
pub async fn authorize(
    State(config): State<Config>,
    Path(provider): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let provider: Provider = provider.parse()?;
    let client = provider.client(&config)?;
    let state = sign_oauth_state(provider.as_str(), &config.jwt_secret)?;
    let url = authorize_url(provider, client, &provider.redirect_uri(&config), &state)?;

    Ok(Json(Envelope::ok(
        "Redirect to provider",
        AuthorizeResponse {
            url: url.to_string(),
            state,
        },
    )))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Google's userinfo calls the id `sub`, Facebook calls it `id`.
#[derive(Debug, Deserialize)]
pub struct ProviderProfile {
    #[serde(alias = "sub")]
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Completes a sign-in: exchanges the code, links the provider account to a
/// user (creating one if needed) and issues our own token.
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, AppError> {
    let provider: Provider = provider.parse()?;
    let config = &state.config;
    let client = provider.client(config)?;

    if let Some(error) = query.error {
        return Err(AppError::AuthError(format!("{} sign-in was cancelled: {}", provider, error)));
    }
    let oauth_state = query
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state".to_string()))?;
    verify_oauth_state(&oauth_state, provider.as_str(), &config.jwt_secret)?;
    let code = query
        .code
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let profile = fetch_profile(&state.http, provider, client, &provider.redirect_uri(config), &code).await?;
    let user = link_account(&state.pool, provider, &profile).await?;

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;
    tracing::info!(user_id = user.id, provider = %provider, "OAuth sign-in");

    Ok(Json(Envelope::ok("Logged in", AuthResponse::bearer(token, user))))
}

async fn fetch_profile(
    http: &reqwest::Client,
    provider: Provider,
    client: &OAuthClient,
    redirect_uri: &str,
    code: &str,
) -> Result<ProviderProfile, AppError> {
    let upstream = |e: reqwest::Error| {
        tracing::warn!(provider = %provider, "OAuth provider call failed: {:?}", e);
        AppError::ExternalService(format!("{} sign-in failed", provider))
    };

    let token: TokenResponse = http
        .post(provider.token_endpoint())
        .form(&[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
            ("code", code),
        ])
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(upstream)?
        .json()
        .await
        .map_err(upstream)?;

    http.get(provider.profile_endpoint())
        .bearer_auth(&token.access_token)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(upstream)?
        .json()
        .await
        .map_err(upstream)
}

/// Finds or creates the user behind a provider account.
///
/// An existing link wins; otherwise a user with the same email is linked;
/// otherwise a new passwordless user is created.
async fn link_account(
    pool: &PgPool,
    provider: Provider,
    profile: &ProviderProfile,
) -> Result<User, AppError> {
    let mut tx = pool.begin().await?;

    let linked: Option<i64> = sqlx::query_scalar(
        "SELECT user_id FROM accounts WHERE provider = $1 AND provider_account_id = $2",
    )
    .bind(provider.as_str())
    .bind(&profile.id)
    .fetch_optional(&mut *tx)
    .await?;

    let user_id = match linked {
        Some(id) => id,
        None => {
            let by_email: Option<i64> = match &profile.email {
                Some(email) => {
                    sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
                        .bind(email)
                        .fetch_optional(&mut *tx)
                        .await?
                }
                None => None,
            };

            let user_id = match by_email {
                Some(id) => id,
                None => {
                    sqlx::query_scalar::<_, i64>(
                        "INSERT INTO users (username, email, name) VALUES ($1, $2, $3) RETURNING id",
                    )
                    .bind(format!("{}_{}", provider, profile.id))
                    .bind(&profile.email)
                    .bind(&profile.name)
                    .fetch_one(&mut *tx)
                    .await?
                }
            };

            sqlx::query(
                "INSERT INTO accounts (user_id, provider, provider_account_id) VALUES ($1, $2, $3)",
            )
            .bind(user_id)
            .bind(provider.as_str())
            .bind(&profile.id)
            .execute(&mut *tx)
            .await?;

            user_id
        }
    };

    let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_url_carries_parameters() {
        let client = OAuthClient {
            client_id: "abc123".to_string(),
            client_secret: "shh".to_string(),
        };
        let url = authorize_url(
            Provider::Google,
            &client,
            "http://localhost:3000/api/auth/oauth/google/callback",
            "signed-state",
        )
        .unwrap();

        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "abc123");
        assert_eq!(
            params["redirect_uri"],
            "http://localhost:3000/api/auth/oauth/google/callback"
        );
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(params["state"], "signed-state");
        assert!(!url.as_str().contains("shh"));
    }

    #[test]
    fn test_provider_names() {
        assert_eq!("facebook".parse::<Provider>().unwrap(), Provider::Facebook);
        assert!(matches!("github".parse::<Provider>(), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_profile_accepts_either_id_field() {
        let google: ProviderProfile =
            serde_json::from_str(r#"{"sub":"g-1","email":"a@b.c","name":"Ada"}"#).unwrap();
        assert_eq!(google.id, "g-1");

        let facebook: ProviderProfile = serde_json::from_str(r#"{"id":"f-9","name":"Ada"}"#).unwrap();
        assert_eq!(facebook.id, "f-9");
        assert_eq!(facebook.email, None);
    }

    #[test]
    fn test_redirect_uri_uses_public_base() {
        let mut config = Config::default();
        config.oauth.redirect_base = "https://quiz.example.com/".to_string();
        assert_eq!(
            Provider::Facebook.redirect_uri(&config),
            "https://quiz.example.com/api/auth/oauth/facebook/callback"
        );
    }
}
