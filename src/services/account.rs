//! Account service
//!
//! Signup with email verification, login/logout over opaque session tokens,
//! and username availability checks. Verification emails go through the task
//! queue like every other message.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{AppConfig, BookingConfig};
use crate::db::repositories::{SessionRepository, UserRepository, VerificationTokenRepository};
use crate::models::booking::generate_token;
use crate::models::{EmailVerificationToken, Session, User};
use crate::services::password::{hash_password, verify_password};
use crate::services::OutboundEmail;
use crate::tasks::{Job, TaskDispatcher};

/// Login sessions live this long
const SESSION_TTL_DAYS: i64 = 14;

/// Account service errors
#[derive(Debug, Error)]
pub enum AccountServiceError {
    #[error("{0} is already taken")]
    Duplicate(String),
    #[error("{0}")]
    Validation(String),
    #[error("Verification token not found")]
    TokenNotFound,
    #[error("This verification link has expired")]
    TokenExpired,
    #[error("This account has already been verified")]
    AlreadyVerified,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Please verify your email address before logging in")]
    NotVerified,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Input for creating an account
#[derive(Debug, Clone)]
pub struct SignupRequest {
    /// Desired username; generated from the email when absent
    pub username: Option<String>,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Result of a username availability check
#[derive(Debug, Clone)]
pub struct UsernameCheck {
    pub available: bool,
    /// An available alternative, present only when the name is taken
    pub suggestion: Option<String>,
}

/// Account lifecycle service
pub struct AccountService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn VerificationTokenRepository>,
    sessions: Arc<dyn SessionRepository>,
    dispatcher: Arc<dyn TaskDispatcher>,
    app: AppConfig,
    booking_cfg: BookingConfig,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn VerificationTokenRepository>,
        sessions: Arc<dyn SessionRepository>,
        dispatcher: Arc<dyn TaskDispatcher>,
        app: AppConfig,
        booking_cfg: BookingConfig,
    ) -> Self {
        Self {
            users,
            tokens,
            sessions,
            dispatcher,
            app,
            booking_cfg,
        }
    }

    /// Create an inactive account and send its verification email.
    pub async fn signup(&self, request: SignupRequest) -> Result<User, AccountServiceError> {
        if !request.email.contains('@') {
            return Err(AccountServiceError::Validation(
                "A valid email address is required".to_string(),
            ));
        }
        if request.password.len() < 8 {
            return Err(AccountServiceError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }
        if self.users.get_by_email(&request.email).await?.is_some() {
            return Err(AccountServiceError::Duplicate(
                "An account with this email".to_string(),
            ));
        }

        let username = match request.username {
            Some(name) if !name.trim().is_empty() => {
                let name = name.trim().to_string();
                if self.users.get_by_username(&name).await?.is_some() {
                    return Err(AccountServiceError::Duplicate(format!(
                        "The username '{}'",
                        name
                    )));
                }
                name
            }
            _ => {
                self.generate_username(&request.first_name, &request.last_name, &request.email)
                    .await?
            }
        };

        let password_hash = hash_password(&request.password)?;
        let user = self
            .users
            .create(&User::new(
                username,
                request.email,
                request.first_name,
                request.last_name,
                password_hash,
            ))
            .await?;
        tracing::info!(user_id = user.id, "Account created, pending verification");

        self.issue_verification_email(&user).await?;
        Ok(user)
    }

    /// Send (or re-send) the verification email for a user.
    ///
    /// An existing unexpired token is reused so that repeated signup
    /// attempts don't invalidate a link that is already in the user's inbox.
    pub async fn issue_verification_email(&self, user: &User) -> Result<(), AccountServiceError> {
        let now = Utc::now();
        let valid_minutes = self.booking_cfg.verification_token_valid_minutes;

        let token = match self.tokens.get_unused_for_user(user.id).await? {
            Some(existing) if !existing.is_expired(valid_minutes, now) => existing,
            _ => {
                self.tokens
                    .create(&EmailVerificationToken {
                        id: 0,
                        user_id: user.id,
                        token: generate_token(),
                        created_at: now,
                        used: false,
                    })
                    .await?
            }
        };

        let verify_url = format!("{}/api/v1/auth/verify-email/{}", self.app.base_url, token.token);
        let email = OutboundEmail::html(
            user.email.clone(),
            "Verify your email address",
            format!(
                "<p>Hi {},</p>\
                 <p>Please confirm your email address to activate your account:</p>\
                 <p><a href=\"{}\">Verify my email</a></p>\
                 <p>The link expires in {} minutes.</p>",
                user.first_name, verify_url, valid_minutes,
            ),
        );

        self.dispatcher
            .enqueue(Job::SendEmail(email))
            .await
            .context("Failed to enqueue verification email")?;

        Ok(())
    }

    /// Consume a verification token and activate its account.
    pub async fn verify_email(&self, token: &str) -> Result<User, AccountServiceError> {
        let record = self
            .tokens
            .get_by_token(token)
            .await?
            .ok_or(AccountServiceError::TokenNotFound)?;

        if record.used {
            return Err(AccountServiceError::AlreadyVerified);
        }
        if record.is_expired(self.booking_cfg.verification_token_valid_minutes, Utc::now()) {
            return Err(AccountServiceError::TokenExpired);
        }

        self.tokens.mark_used(record.id).await?;
        self.users.activate(record.user_id).await?;
        tracing::info!(user_id = record.user_id, "Email verified, account activated");

        self.users
            .get_by_id(record.user_id)
            .await?
            .ok_or(AccountServiceError::TokenNotFound)
    }

    /// Authenticate and open a login session.
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<(User, Session), AccountServiceError> {
        let user = match self.users.get_by_username(username_or_email).await? {
            Some(user) => Some(user),
            None => self.users.get_by_email(username_or_email).await?,
        };
        let user = user.ok_or(AccountServiceError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AccountServiceError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AccountServiceError::NotVerified);
        }

        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().simple().to_string(),
            user_id: user.id,
            expires_at: now + Duration::days(SESSION_TTL_DAYS),
            created_at: now,
        };
        self.sessions.create(&session).await?;
        tracing::info!(user_id = user.id, "User logged in");

        Ok((user, session))
    }

    /// Close a login session. Unknown session ids are ignored.
    pub async fn logout(&self, session_id: &str) -> Result<(), AccountServiceError> {
        self.sessions.delete(session_id).await?;
        Ok(())
    }

    /// Resolve a session cookie to its user, if the session is still live.
    pub async fn current_user(&self, session_id: &str) -> Result<Option<User>, AccountServiceError> {
        let session = match self.sessions.get_by_id(session_id).await? {
            Some(session) if !session.is_expired() => session,
            _ => return Ok(None),
        };
        Ok(self.users.get_by_id(session.user_id).await?)
    }

    /// Check username availability, suggesting an alternative when taken.
    pub async fn check_username(&self, username: &str) -> Result<UsernameCheck, AccountServiceError> {
        if self.users.get_by_username(username).await?.is_none() {
            return Ok(UsernameCheck {
                available: true,
                suggestion: None,
            });
        }

        let suggestion = self.find_free_username(username).await?;
        Ok(UsernameCheck {
            available: false,
            suggestion: Some(suggestion),
        })
    }

    /// Derive a username from the person's name, falling back to the email's
    /// local part, and suffix until free.
    async fn generate_username(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
    ) -> Result<String, AccountServiceError> {
        let from_name: String = format!("{}{}", first_name, last_name)
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();

        let base = if !from_name.is_empty() {
            from_name
        } else {
            let from_email: String = email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_lowercase()
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
                .collect();
            if from_email.is_empty() {
                "user".to_string()
            } else {
                from_email
            }
        };

        if self.users.get_by_username(&base).await?.is_none() {
            return Ok(base);
        }
        self.find_free_username(&base).await
    }

    async fn find_free_username(&self, base: &str) -> Result<String, AccountServiceError> {
        use std::time::{SystemTime, UNIX_EPOCH};

        for _ in 0..5 {
            let seed = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default();
            let candidate = format!("{}{}", base, (seed % 10_000) as u32);
            if self.users.get_by_username(&candidate).await?.is_none() {
                return Ok(candidate);
            }
        }

        // Numeric suffixes exhausted; a random token cannot collide in practice
        Ok(format!("{}_{}", base, &Uuid::new_v4().simple().to_string()[..8]))
    }
}
