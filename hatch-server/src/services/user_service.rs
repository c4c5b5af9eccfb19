//! User business logic
//!
//! Every operation opens its own store session and ends it on every path:
//! commit on success, rollback on error. Provider calls run only after the
//! commit, through [`PostCommitHooks`].

use std::sync::Arc;

use super::error::EMAIL_CONFLICT;
use super::{PostCommitHooks, RequestContext, ServiceError};
use crate::db::{UserSession, UserStore};
use crate::models::{
    DisplayName, EmailAddress, NewUser, Paginated, Pagination, Sort, User, UserChanges,
};
use crate::providers::{EmailMessage, NotificationSender};

const RESOURCE: &str = "User";

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_NAME: &str = "Admin User";

pub const WELCOME_SUBJECT: &str = "Welcome to our platform!";

fn welcome_email(user: &User) -> EmailMessage {
    let name = user.name.as_deref().unwrap_or(&user.email);
    EmailMessage::new(
        user.email.clone(),
        WELCOME_SUBJECT,
        format!("Hello {name}, welcome aboard!"),
    )
}

/// Result of [`UserService::seed_admin`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedOutcome {
    Created(User),
    AlreadyPresent(User),
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn UserStore>,
    notifier: Arc<dyn NotificationSender>,
}

impl UserService {
    pub fn new(store: Arc<dyn UserStore>, notifier: Arc<dyn NotificationSender>) -> Self {
        Self { store, notifier }
    }

    /// Commit on success, roll back on failure.
    async fn finish<T>(
        session: Box<dyn UserSession>,
        result: Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        match result {
            Ok(value) => {
                session.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = session.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn get_by_id(&self, ctx: &RequestContext, id: i64) -> Result<User, ServiceError> {
        let mut session = self.store.begin().await?;
        let result = match session.find_by_id(id).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => Err(ServiceError::not_found(RESOURCE, id)),
            Err(e) => Err(e.into()),
        };
        Self::finish(session, result).await
    }

    #[tracing::instrument(skip(self, ctx, email), fields(request_id = %ctx.request_id))]
    pub async fn get_by_email(
        &self,
        ctx: &RequestContext,
        email: &EmailAddress,
    ) -> Result<Option<User>, ServiceError> {
        let mut session = self.store.begin().await?;
        let result = session.find_by_email(email).await.map_err(ServiceError::from);
        Self::finish(session, result).await
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn list(
        &self,
        ctx: &RequestContext,
        pagination: Pagination,
        sort: Sort,
    ) -> Result<Paginated<User>, ServiceError> {
        let mut session = self.store.begin().await?;
        let result = session
            .list(pagination, sort)
            .await
            .map(|(items, total)| Paginated::new(items, total, pagination))
            .map_err(ServiceError::from);
        Self::finish(session, result).await
    }

    /// Create a user and send the welcome email once the row is committed.
    #[tracing::instrument(skip(self, ctx, new), fields(request_id = %ctx.request_id))]
    pub async fn create(&self, ctx: &RequestContext, new: NewUser) -> Result<User, ServiceError> {
        let mut session = self.store.begin().await?;
        let result = async {
            if session.find_by_email(&new.email).await?.is_some() {
                return Err(ServiceError::conflict(EMAIL_CONFLICT));
            }
            Ok::<_, ServiceError>(session.insert(&new).await?)
        }
        .await;
        let user = Self::finish(session, result).await?;
        tracing::info!(user_id = user.id, "User created");

        let mut hooks = PostCommitHooks::new();
        let notifier = Arc::clone(&self.notifier);
        let message = welcome_email(&user);
        hooks.push("welcome_email", async move { notifier.send_email(&message).await });
        hooks.spawn();

        Ok(user)
    }

    /// Apply a partial update. An empty patch returns the user unchanged.
    #[tracing::instrument(skip(self, ctx, changes), fields(request_id = %ctx.request_id))]
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: i64,
        changes: UserChanges,
    ) -> Result<User, ServiceError> {
        let mut session = self.store.begin().await?;
        let result = async {
            if changes.is_empty() {
                return session
                    .find_by_id(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(RESOURCE, id));
            }

            if let Some(email) = &changes.email {
                if let Some(other) = session.find_by_email(email).await? {
                    if other.id != id {
                        return Err(ServiceError::conflict(EMAIL_CONFLICT));
                    }
                }
            }

            session
                .update(id, &changes)
                .await?
                .ok_or_else(|| ServiceError::not_found(RESOURCE, id))
        }
        .await;
        let user = Self::finish(session, result).await?;
        tracing::info!(user_id = user.id, "User updated");
        Ok(user)
    }

    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn delete(&self, ctx: &RequestContext, id: i64) -> Result<(), ServiceError> {
        let mut session = self.store.begin().await?;
        let result = match session.delete(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(ServiceError::not_found(RESOURCE, id)),
            Err(e) => Err(e.into()),
        };
        Self::finish(session, result).await?;
        tracing::info!(user_id = id, "User deleted");
        Ok(())
    }

    /// Create the initial superuser unless it already exists. No welcome email.
    #[tracing::instrument(skip(self, ctx), fields(request_id = %ctx.request_id))]
    pub async fn seed_admin(&self, ctx: &RequestContext) -> Result<SeedOutcome, ServiceError> {
        let email = EmailAddress::new(ADMIN_EMAIL)?;
        let name = DisplayName::new(ADMIN_NAME)?;

        let mut session = self.store.begin().await?;
        let result = async {
            if let Some(existing) = session.find_by_email(&email).await? {
                return Ok(SeedOutcome::AlreadyPresent(existing));
            }
            let admin = session.insert(&NewUser::superuser(email, Some(name))).await?;
            Ok::<_, ServiceError>(SeedOutcome::Created(admin))
        }
        .await;
        Self::finish(session, result).await
    }
}
