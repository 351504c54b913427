use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::application::ports::Page;
use crate::application::ports::user_repository::{UserPatch, UserQuery};
use crate::application::use_cases::users::create_user::{CreateUser, StaffRegistration};
use crate::application::use_cases::users::manage_users::{
    AvailableDentists, DeactivateUser, GetUser, ListUsers, UpdateUser,
};
use crate::bootstrap::app_context::AppContext;
use crate::domain::users::{Gender, StaffRole, User};
use crate::presentation::http::error::ApiResult;
use crate::presentation::http::security::CurrentUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub contact_number: String,
    pub role: StaffRole,
    pub gender: Gender,
    pub date_of_birth: Option<NaiveDate>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub employee_id: Option<String>,
    #[schema(value_type = Object)]
    pub work_schedule: serde_json::Value,
    pub is_available: bool,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            full_name: u.full_name(),
            id: u.id,
            tenant_id: u.tenant_id,
            first_name: u.first_name,
            last_name: u.last_name,
            email: u.email,
            contact_number: u.contact_number,
            role: u.role,
            gender: u.gender,
            date_of_birth: u.date_of_birth,
            specialization: u.specialization,
            license_number: u.license_number,
            employee_id: u.employee_id,
            work_schedule: u.work_schedule,
            is_available: u.is_available,
            is_active: u.is_active,
            is_verified: u.is_verified,
            created_at: u.created_at,
            updated_at: u.updated_at,
            last_login_at: u.last_login_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub contact_number: String,
    pub role: StaffRole,
    pub gender: Gender,
    pub date_of_birth: Option<NaiveDate>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub employee_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub work_schedule: Option<serde_json::Value>,
}

impl From<CreateUserRequest> for StaffRegistration {
    fn from(r: CreateUserRequest) -> Self {
        StaffRegistration {
            first_name: r.first_name,
            last_name: r.last_name,
            email: r.email,
            password: r.password,
            contact_number: r.contact_number,
            role: r.role,
            gender: r.gender,
            date_of_birth: r.date_of_birth,
            specialization: r.specialization,
            license_number: r.license_number,
            employee_id: r.employee_id,
            work_schedule: r.work_schedule,
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub contact_number: Option<String>,
    pub gender: Option<Gender>,
    pub date_of_birth: Option<NaiveDate>,
    pub specialization: Option<String>,
    pub license_number: Option<String>,
    pub employee_id: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub work_schedule: Option<serde_json::Value>,
    pub is_available: Option<bool>,
    pub role: Option<StaffRole>,
    pub is_active: Option<bool>,
}

impl From<UpdateUserRequest> for UserPatch {
    fn from(r: UpdateUserRequest) -> Self {
        UserPatch {
            first_name: r.first_name,
            last_name: r.last_name,
            contact_number: r.contact_number,
            gender: r.gender,
            date_of_birth: r.date_of_birth,
            specialization: r.specialization,
            license_number: r.license_number,
            employee_id: r.employee_id,
            work_schedule: r.work_schedule,
            is_available: r.is_available,
            role: r.role,
            is_active: r.is_active,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListUsersQuery {
    pub role: Option<StaffRole>,
    pub active_only: Option<bool>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

pub fn routes(ctx: AppContext) -> Router {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/dentists/available", get(available_dentists))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(deactivate_user),
        )
        .with_state(ctx)
}

#[utoipa::path(get, path = "/api/v2/users", tag = "Users", params(ListUsersQuery),
    responses((status = 200, body = [UserResponse])))]
pub async fn list_users(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Query(q): Query<ListUsersQuery>,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let repo = ctx.user_repo();
    let uc = ListUsers {
        repo: repo.as_ref(),
    };
    let query = UserQuery {
        role: q.role,
        active_only: q.active_only.unwrap_or(false),
        page: Page::new(q.skip, q.limit),
    };
    let users = uc.execute(&current.principal, &query).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(post, path = "/api/v2/users", tag = "Users", request_body = CreateUserRequest,
    responses((status = 201, body = UserResponse)))]
pub async fn create_user(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Json(req): Json<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let repo = ctx.user_repo();
    let uc = CreateUser {
        repo: repo.as_ref(),
    };
    let user = uc
        .execute(&current.principal, &current.tenant, &req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

#[utoipa::path(get, path = "/api/v2/users/dentists/available", tag = "Users",
    responses((status = 200, body = [UserResponse])))]
pub async fn available_dentists(
    State(ctx): State<AppContext>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<UserResponse>>> {
    let repo = ctx.user_repo();
    let uc = AvailableDentists {
        repo: repo.as_ref(),
    };
    let users = uc.execute(&current.principal).await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(get, path = "/api/v2/users/{id}", tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = UserResponse)))]
pub async fn get_user(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let repo = ctx.user_repo();
    let uc = GetUser {
        repo: repo.as_ref(),
    };
    Ok(Json(uc.execute(&current.principal, id).await?.into()))
}

#[utoipa::path(put, path = "/api/v2/users/{id}", tag = "Users", request_body = UpdateUserRequest,
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = UserResponse)))]
pub async fn update_user(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let repo = ctx.user_repo();
    let uc = UpdateUser {
        repo: repo.as_ref(),
    };
    let patch: UserPatch = req.into();
    Ok(Json(uc.execute(&current.principal, id, &patch).await?.into()))
}

#[utoipa::path(delete, path = "/api/v2/users/{id}", tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses((status = 200, body = UserResponse)))]
pub async fn deactivate_user(
    State(ctx): State<AppContext>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserResponse>> {
    let repo = ctx.user_repo();
    let uc = DeactivateUser {
        repo: repo.as_ref(),
    };
    let user = uc.execute(&current.principal, id).await?;
    tracing::info!(user_id = %id, by = %current.principal.user_id, "user_deactivated");
    Ok(Json(user.into()))
}
