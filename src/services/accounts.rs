use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    error::{AppError, AppResult},
    models::{LoginRequest, PublicUser, RegisterRequest, USERS, User},
    store::{Record, RecordStore, StoreError, next_numeric_id, reject_existing_field},
};

const ALL_FIELDS_REQUIRED: &str = "All fields are required";

/// Registration and login over the `users` collection.
#[derive(Debug, Clone)]
pub struct AccountService {
    store: RecordStore,
}

impl AccountService {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    /// Creates a user with a fresh numeric id. The email check, id allocation
    /// and append run as one locked update, so concurrent sign-ups with the
    /// same email cannot both succeed.
    pub async fn register(&self, request: RegisterRequest) -> AppResult<PublicUser> {
        let (Some(name), Some(email), Some(password)) = (
            required(request.name),
            required(request.email),
            required(request.password),
        ) else {
            return Err(AppError::validation(ALL_FIELDS_REQUIRED));
        };

        let now_ms = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let created = self
            .store
            .update(USERS, move |records| {
                reject_existing_field(USERS, records, "email", &Value::String(email.clone()))?;
                let user = User {
                    id: next_numeric_id(records, now_ms),
                    name,
                    email,
                    password,
                };
                records.push(Record::from_serialize(&user)?);
                Ok(user)
            })
            .await;

        match created {
            Ok(user) => {
                info!(user_id = user.id, "user registered");
                Ok(PublicUser::from(user))
            }
            Err(StoreError::DuplicateField { .. }) => Err(AppError::conflict("User already exists")),
            Err(err) => Err(AppError::from(err)),
        }
    }

    pub async fn login(&self, request: LoginRequest) -> AppResult<PublicUser> {
        let (Some(email), Some(password)) = (required(request.email), required(request.password))
        else {
            return Err(AppError::validation(ALL_FIELDS_REQUIRED));
        };

        if !self.store.exists(USERS).await? {
            return Err(AppError::validation("No users found"));
        }

        let users = self.store.load_all(USERS).await?;
        let Some(record) = users.iter().find(|user| {
            user.get_str("email") == Some(email.as_str())
                && user.get_str("password") == Some(password.as_str())
        }) else {
            warn!("login rejected: invalid credentials");
            return Err(AppError::unauthorized("Invalid credentials"));
        };

        let user = PublicUser::from_record(record);
        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }
}

/// `None` for missing or blank input.
fn required(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
