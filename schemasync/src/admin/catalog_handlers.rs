use axum::{
    extract::{Path, State},
    response::Json,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use uuid::Uuid;

use crate::catalog::{self, CatalogField, CatalogSchema};
use crate::entity::{field_semantics_history, metadata_field};
use crate::store::{self, SemanticsEdit};

use super::{
    AppState, ApiErr,
    connection_handlers::find_connection,
    dto::{HistoryEntryResponse, UpdateSemanticsRequest},
    jwt::AuthClaims,
};

// ---------- GET /connections/{id}/catalog ----------

pub async fn get_catalog(
    AuthClaims(_): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<CatalogSchema>>, ApiErr> {
    find_connection(&state, id).await?;
    let tree = catalog::load_catalog(&state.db, id)
        .await
        .map_err(ApiErr::internal)?;
    Ok(Json(tree))
}

// ---------- PUT /fields/{id}/semantics ----------

pub async fn update_semantics(
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateSemanticsRequest>,
) -> Result<Json<CatalogField>, ApiErr> {
    if body.description.as_deref().is_some_and(|d| d.trim().is_empty()) {
        return Err(ApiErr::unprocessable("Description must not be empty"));
    }

    let updated = store::apply_user_semantics(
        &state.db,
        id,
        SemanticsEdit {
            description: body.description,
            business_definition: body.business_definition,
        },
        Some(claims.sub),
    )
    .await
    .map_err(ApiErr::internal)?
    .ok_or_else(|| ApiErr::not_found("Field not found"))?;

    Ok(Json(updated.into()))
}

// ---------- GET /fields/{id}/history ----------

pub async fn field_history(
    AuthClaims(_): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntryResponse>>, ApiErr> {
    metadata_field::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Field not found"))?;

    let rows = field_semantics_history::Entity::find()
        .filter(field_semantics_history::Column::FieldId.eq(id))
        .order_by_desc(field_semantics_history::Column::CreatedAt)
        .order_by_desc(field_semantics_history::Column::Id)
        .all(&state.db)
        .await
        .map_err(ApiErr::internal)?;

    Ok(Json(rows.into_iter().map(HistoryEntryResponse::from).collect()))
}
