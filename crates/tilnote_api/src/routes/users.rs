//! `/users` endpoints.

use crate::auth::{AdminAuth, UserAuth};
use crate::error::ApiError;
use crate::extract::{ValidForm, ValidJson, ValidQuery};
use crate::state::AppState;
use crate::validation::{page_from_query, Validator, NAME_LEN, PASSWORD_LEN};
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use tilnote_core::{
    CoreResult, NewUser, RequestContext, SqliteJobQueue, SqliteUserRepository, User, UserService,
    UserUpdate, TOKEN_TYPE,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub memo: Option<String>,
}

impl CreateUserRequest {
    fn validate(&self) -> CoreResult<()> {
        let mut check = Validator::new();
        check.length("name", &self.name, NAME_LEN);
        check.email("email", &self.email);
        check.length("password", &self.password, PASSWORD_LEN);
        check.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl UpdateUserRequest {
    fn validate(&self) -> CoreResult<()> {
        let mut check = Validator::new();
        if let Some(name) = &self.name {
            check.length("name", name, NAME_LEN);
        }
        if let Some(password) = &self.password {
            check.length("password", password, PASSWORD_LEN);
        }
        check.finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub items_per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct UsersPage {
    pub total_count: u64,
    pub page: u32,
    pub users: Vec<User>,
}

/// Login form; `username` carries the email.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

fn user_service<'a>(
    conn: &'a rusqlite::Connection,
    state: &'a AppState,
) -> UserService<'a, SqliteUserRepository<'a>, SqliteJobQueue<'a>> {
    UserService::new(
        SqliteUserRepository::new(conn),
        SqliteJobQueue::new(conn),
        state.credentials(),
        state.tokens(),
    )
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ValidJson(body): ValidJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    body.validate()?;
    let input = NewUser {
        name: body.name,
        email: body.email,
        password: body.password,
        memo: body.memo,
    };
    let user = state
        .run_blocking(move |conn, state| user_service(conn, state).create_user(&ctx, input))
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    UserAuth(current): UserAuth,
    ValidJson(body): ValidJson<UpdateUserRequest>,
) -> Result<Json<User>, ApiError> {
    body.validate()?;
    let ctx = ctx.with_user(current.id);
    let update = UserUpdate {
        name: body.name,
        password: body.password,
    };
    let user = state
        .run_blocking(move |conn, state| {
            user_service(conn, state).update_user(&ctx, current.id, update)
        })
        .await?;
    Ok(Json(user))
}

pub async fn get_users(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    AdminAuth(current): AdminAuth,
    ValidQuery(query): ValidQuery<PageQuery>,
) -> Result<Json<UsersPage>, ApiError> {
    let page = page_from_query(query.page, query.items_per_page)?;
    let ctx = ctx.with_user(current.id);
    let users = state
        .run_blocking(move |conn, state| user_service(conn, state).get_users(&ctx, page))
        .await?;
    Ok(Json(UsersPage {
        total_count: users.total_count,
        page: page.page,
        users: users.items,
    }))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    UserAuth(current): UserAuth,
) -> Result<StatusCode, ApiError> {
    let ctx = ctx.with_user(current.id);
    state
        .run_blocking(move |conn, state| user_service(conn, state).delete_user(&ctx, current.id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    ValidForm(form): ValidForm<LoginForm>,
) -> Result<Json<TokenResponse>, ApiError> {
    let access_token = state
        .run_blocking(move |conn, state| {
            user_service(conn, state).login(&ctx, &form.username, &form.password)
        })
        .await?;
    Ok(Json(TokenResponse {
        access_token,
        token_type: TOKEN_TYPE,
    }))
}
