//! Dashboard, settings and profile endpoints.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};

use super::envelope::{ApiError, Envelope};
use crate::middleware::CurrentIdentity;
use crate::models::{DashboardQuery, DashboardStats, SettingsDetails, SettingsInput, UpdateUser, User};
use crate::services::{dashboard, settings, users};
use crate::startup::AppState;

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

pub async fn dashboard_stats(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> ApiResult<DashboardStats> {
    ApiError::signed_in(identity.as_ref())?;
    let Query(query) = query.map_err(ApiError::rejected)?;

    let stats = dashboard::dashboard_stats(state.store.as_ref(), identity.as_ref(), query.bucket)
        .await
        .map_err(|e| ApiError::new(e, "Failed to fetch dashboard stats"))?;

    Ok(Json(Envelope::data(stats)))
}

pub async fn get_settings(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> ApiResult<Option<SettingsDetails>> {
    let settings = settings::get_settings(state.store.as_ref(), identity.as_ref())
        .await
        .map_err(|e| ApiError::new(e, "Failed to fetch settings"))?;

    Ok(Json(Envelope::data(settings)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    body: Result<Json<SettingsInput>, JsonRejection>,
) -> ApiResult<SettingsDetails> {
    ApiError::signed_in(identity.as_ref())?;
    let Json(input) = body.map_err(ApiError::rejected)?;

    let settings = settings::update_settings(state.store.as_ref(), identity.as_ref(), &input)
        .await
        .map_err(|e| ApiError::new(e, "Failed to update settings"))?;

    Ok(Json(Envelope::data(settings)))
}

pub async fn get_current_user(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> ApiResult<User> {
    let user = users::get_current_user(state.store.as_ref(), identity.as_ref())
        .await
        .map_err(|e| ApiError::new(e, "Failed to fetch user"))?;

    Ok(Json(Envelope::data(user)))
}

pub async fn update_user(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
    body: Result<Json<UpdateUser>, JsonRejection>,
) -> ApiResult<User> {
    ApiError::signed_in(identity.as_ref())?;
    let Json(update) = body.map_err(ApiError::rejected)?;

    let user = users::update_user(state.store.as_ref(), identity.as_ref(), &update)
        .await
        .map_err(|e| ApiError::new(e, "Failed to update user"))?;

    Ok(Json(Envelope::data(user)))
}
