//! User account use cases: registration, profile update, listing, removal
//! and login.

use crate::auth::{CredentialStore, Role, TokenService};
use crate::context::RequestContext;
use crate::error::{CoreError, CoreResult};
use crate::model::{new_id, Page, Paged, User, UserId};
use crate::notify::WelcomeEmailJob;
use crate::repo::job_repo::JobQueue;
use crate::repo::user_repo::UserRepository;
use crate::repo::RepoError;
use chrono::Utc;
use log::{info, warn};

/// Registration input, already validated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub memo: Option<String>,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub password: Option<String>,
}

pub struct UserService<'a, R: UserRepository, Q: JobQueue> {
    repo: R,
    queue: Q,
    credentials: &'a CredentialStore,
    tokens: &'a TokenService,
}

impl<'a, R: UserRepository, Q: JobQueue> UserService<'a, R, Q> {
    pub fn new(
        repo: R,
        queue: Q,
        credentials: &'a CredentialStore,
        tokens: &'a TokenService,
    ) -> Self {
        Self {
            repo,
            queue,
            credentials,
            tokens,
        }
    }

    /// Registers a user and queues the welcome email.
    ///
    /// Fails with `Conflict` when the email is taken. Queueing failures are
    /// logged and do not affect the result.
    pub fn create_user(&self, ctx: &RequestContext, input: NewUser) -> CoreResult<User> {
        match self.repo.find_by_email(&input.email) {
            Ok(_) => {
                info!(
                    "event=user_create module=user_service status=rejected {} error_code=email_taken",
                    ctx
                );
                return Err(CoreError::Conflict {
                    entity: "user",
                    key: input.email,
                });
            }
            Err(RepoError::NotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }

        let now = Utc::now();
        let user = User {
            id: new_id(),
            name: input.name,
            email: input.email,
            password: self.credentials.hash(&input.password)?,
            memo: input.memo,
            created_at: now,
            updated_at: now,
        };
        self.repo.save(&user)?;
        info!(
            "event=user_create module=user_service status=ok {} created_user_id={}",
            ctx, user.id
        );

        let job = WelcomeEmailJob {
            user_id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
        };
        match self.queue.enqueue(&job) {
            Ok(job_id) => info!(
                "event=welcome_email_enqueue module=user_service status=ok {} job_id={}",
                ctx, job_id
            ),
            Err(err) => warn!(
                "event=welcome_email_enqueue module=user_service status=error {} created_user_id={} error={}",
                ctx, user.id, err
            ),
        }

        Ok(user)
    }

    /// Applies the provided fields; `updated_at` is refreshed on every call.
    pub fn update_user(
        &self,
        ctx: &RequestContext,
        id: UserId,
        update: UserUpdate,
    ) -> CoreResult<User> {
        let mut user = self.repo.find_by_id(id)?;

        if let Some(name) = update.name {
            user.name = name;
        }
        if let Some(password) = update.password {
            user.password = self.credentials.hash(&password)?;
        }
        user.updated_at = Utc::now();

        self.repo.update(&user)?;
        info!("event=user_update module=user_service status=ok {}", ctx);
        Ok(user)
    }

    pub fn get_users(&self, ctx: &RequestContext, page: Page) -> CoreResult<Paged<User>> {
        let users = self.repo.get_users(page)?;
        info!(
            "event=user_list module=user_service status=ok {} page={} returned={} total={}",
            ctx,
            page.page,
            users.items.len(),
            users.total_count
        );
        Ok(users)
    }

    /// Hard delete; the user's notes go with it.
    pub fn delete_user(&self, ctx: &RequestContext, id: UserId) -> CoreResult<()> {
        self.repo.delete(id)?;
        info!("event=user_delete module=user_service status=ok {}", ctx);
        Ok(())
    }

    /// Checks credentials and issues a `USER` token.
    ///
    /// An unknown email and a wrong password both fail `Unauthenticated`.
    pub fn login(&self, ctx: &RequestContext, email: &str, password: &str) -> CoreResult<String> {
        let user = match self.repo.find_by_email(email) {
            Ok(user) => user,
            Err(RepoError::NotFound { .. }) => {
                info!(
                    "event=login module=user_service status=rejected {} error_code=unknown_email",
                    ctx
                );
                return Err(CoreError::Unauthenticated);
            }
            Err(err) => return Err(err.into()),
        };

        if !self.credentials.verify(password, &user.password) {
            info!(
                "event=login module=user_service status=rejected {} subject_id={} error_code=bad_password",
                ctx, user.id
            );
            return Err(CoreError::Unauthenticated);
        }

        let token = self.tokens.issue(user.id, Role::User)?;
        info!(
            "event=login module=user_service status=ok {} subject_id={}",
            ctx, user.id
        );
        Ok(token)
    }
}
