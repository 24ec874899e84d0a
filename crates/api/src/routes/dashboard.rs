//! Role-gated dashboard entry points
//!
//! Only the gate lives here; what a dashboard shows is up to its consumer.

use axum::{Extension, Json};
use serde::Serialize;

use crate::auth::RoleAssertion;

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub dashboard: &'static str,
    pub viewer: RoleAssertion,
}

/// Admin dashboard (admin role only)
pub async fn admin_dashboard(Extension(viewer): Extension<RoleAssertion>) -> Json<DashboardResponse> {
    tracing::info!(account_id = %viewer.account_id, "Admin dashboard accessed");
    Json(DashboardResponse {
        dashboard: "admin",
        viewer,
    })
}

/// Personal dashboard (any authenticated role)
pub async fn user_dashboard(Extension(viewer): Extension<RoleAssertion>) -> Json<DashboardResponse> {
    Json(DashboardResponse {
        dashboard: "user",
        viewer,
    })
}
