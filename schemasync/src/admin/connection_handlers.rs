use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::connection::{
    self, NewConnection, RegistryError, ResolvedConnection, is_unique_violation,
    types::{self, ConnectionTypeResponse},
};
use crate::entity::connection as connection_entity;
use crate::introspect::gateway::{HttpGateway, QueryGateway};

use super::{
    AppState, ApiErr,
    dto::{
        ConnectionResponse, CreateConnectionRequest, ListConnectionsQuery, PaginatedResponse,
        TestConnectionResponse, UpdateConnectionRequest,
    },
    jwt::AuthClaims,
};

// ---------- helpers ----------

fn conn_response(model: connection_entity::Model) -> Result<ConnectionResponse, ApiErr> {
    let config = connection::stored_config(&model).map_err(ApiErr::internal)?;
    Ok(ConnectionResponse {
        id: model.id,
        organization_id: model.organization_id,
        name: model.name,
        kind: model.kind,
        config,
        is_active: model.is_active,
        created_by: model.created_by,
        last_sync_at: model.last_sync_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
    })
}

impl From<RegistryError> for ApiErr {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::Config(e) => ApiErr::unprocessable(e.to_string()),
            RegistryError::DuplicateName(_) => ApiErr::conflict("Connection name already exists"),
            other => ApiErr::internal(other),
        }
    }
}

pub(super) async fn find_connection(
    state: &AppState,
    id: Uuid,
) -> Result<connection_entity::Model, ApiErr> {
    connection_entity::Entity::find_by_id(id)
        .one(&state.db)
        .await
        .map_err(ApiErr::internal)?
        .ok_or_else(|| ApiErr::not_found("Connection not found"))
}

// ---------- GET /connection-types ----------

pub async fn list_connection_types(
    AuthClaims(_): AuthClaims,
) -> Json<Vec<ConnectionTypeResponse>> {
    let types = types::get_type_defs()
        .iter()
        .map(ConnectionTypeResponse::from)
        .collect();
    Json(types)
}

// ---------- GET /connections ----------

pub async fn list_connections(
    AuthClaims(_): AuthClaims,
    State(state): State<AppState>,
    Query(params): Query<ListConnectionsQuery>,
) -> Result<Json<PaginatedResponse<ConnectionResponse>>, ApiErr> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);

    let mut query = connection_entity::Entity::find();
    if let Some(org) = params.organization_id {
        query = query.filter(connection_entity::Column::OrganizationId.eq(org));
    }

    let paginator = query
        .order_by_asc(connection_entity::Column::CreatedAt)
        .order_by_asc(connection_entity::Column::Id)
        .paginate(&state.db, page_size);

    let total = paginator.num_items().await.map_err(ApiErr::internal)?;
    let items = paginator
        .fetch_page(page - 1)
        .await
        .map_err(ApiErr::internal)?;

    let data = items
        .into_iter()
        .map(conn_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(PaginatedResponse {
        data,
        total,
        page,
        page_size,
    }))
}

// ---------- POST /connections ----------

pub async fn create_connection(
    AuthClaims(claims): AuthClaims,
    State(state): State<AppState>,
    Json(body): Json<CreateConnectionRequest>,
) -> Result<(StatusCode, Json<ConnectionResponse>), ApiErr> {
    if body.name.trim().is_empty() {
        return Err(ApiErr::unprocessable("Connection name must not be empty"));
    }

    let model = connection::create_connection(
        &state.db,
        &state.secrets,
        NewConnection {
            organization_id: body.organization_id,
            name: body.name,
            kind: body.kind,
            config: body.config,
            created_by: Some(claims.sub),
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(conn_response(model)?)))
}

// ---------- GET /connections/{id} ----------

pub async fn get_connection(
    AuthClaims(_): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ConnectionResponse>, ApiErr> {
    let model = find_connection(&state, id).await?;
    Ok(Json(conn_response(model)?))
}

// ---------- PUT /connections/{id} ----------

pub async fn update_connection(
    AuthClaims(_): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateConnectionRequest>,
) -> Result<Json<ConnectionResponse>, ApiErr> {
    let model = find_connection(&state, id).await?;
    let mut active: connection_entity::ActiveModel = model.clone().into();

    if let Some(name) = body.name {
        if name.trim().is_empty() {
            return Err(ApiErr::unprocessable("Connection name must not be empty"));
        }
        active.name = Set(name);
    }
    if let Some(is_active) = body.is_active {
        active.is_active = Set(is_active);
    }

    if let Some(config_input) = body.config {
        let existing_config = connection::stored_config(&model)?;
        let existing_secure = state
            .secrets
            .open(&model.secure_config)
            .map_err(ApiErr::internal)?;

        let (new_config, new_secure) =
            types::merge_config(&model.kind, existing_config, existing_secure, config_input)
                .map_err(|e| ApiErr::unprocessable(e.to_string()))?;

        let sealed = if new_secure.as_object().is_some_and(|m| m.is_empty()) {
            String::new()
        } else {
            state.secrets.seal(&new_secure).map_err(ApiErr::internal)?
        };
        active.config = Set(new_config.to_string());
        active.secure_config = Set(sealed);
    }

    active.updated_at = Set(Utc::now().naive_utc());
    let updated = active.update(&state.db).await.map_err(|e| {
        if is_unique_violation(&e) {
            ApiErr::conflict("Connection name already exists")
        } else {
            ApiErr::internal(e)
        }
    })?;

    tracing::info!(connection_id = %id, "connection updated");
    Ok(Json(conn_response(updated)?))
}

// ---------- DELETE /connections/{id} ----------

pub async fn delete_connection(
    AuthClaims(_): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiErr> {
    // Held until the row is gone so no sync can start on it meanwhile.
    let _guard = state
        .locks
        .try_acquire(id)
        .map_err(|_| ApiErr::conflict("Sync in progress for this connection"))?;
    let model = find_connection(&state, id).await?;

    let active: connection_entity::ActiveModel = model.into();
    active.delete(&state.db).await.map_err(ApiErr::internal)?;

    tracing::info!(connection_id = %id, "connection deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ---------- POST /connections/{id}/test ----------

pub async fn test_connection(
    AuthClaims(_): AuthClaims,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TestConnectionResponse>, ApiErr> {
    let model = find_connection(&state, id).await?;
    let resolved = ResolvedConnection::resolve(&model, &state.secrets)?;
    let gateway = HttpGateway::new(&state.settings.gateway).map_err(ApiErr::internal)?;

    match gateway.query("SELECT 1", &resolved.datasource_context()).await {
        Ok(_) => Ok(Json(TestConnectionResponse {
            success: true,
            message: None,
        })),
        Err(e) => {
            tracing::error!(
                connection_id = %id,
                kind = %resolved.kind,
                error = %e,
                "test connection failed"
            );
            Ok(Json(TestConnectionResponse {
                success: false,
                message: Some(e.to_string()),
            }))
        }
    }
}
