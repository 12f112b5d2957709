use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::{
    dto::categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
    entity::{
        Categories,
        categories::{ActiveModel, Column},
    },
    error::{AppError, AppResult},
    middleware::auth::Principal,
    models::{Category, category_from_entity},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

pub async fn list_categories(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<CategoryList>> {
    let (page, per_page, offset) = pagination.normalize();
    let finder = Categories::find().order_by_asc(Column::Name);
    let total = finder.clone().count(&state.orm).await?;

    let items = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(category_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        Some(Meta::new(page, per_page, total)),
    ))
}

pub async fn get_category(state: &AppState, id: i64) -> AppResult<ApiResponse<Category>> {
    let category = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))?;
    Ok(ApiResponse::item("Category", category_from_entity(category)))
}

pub async fn create_category(
    state: &AppState,
    principal: &Principal,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    principal.require_admin()?;
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    ensure_name_free(state, &name, None).await?;

    let category = ActiveModel {
        name: Set(name),
        description: Set(payload.description.unwrap_or_default()),
        ..Default::default()
    }
    .insert(&state.orm)
    .await?;
    tracing::info!(category_id = category.id, "category created");

    Ok(ApiResponse::item("Category created", category_from_entity(category)))
}

pub async fn update_category(
    state: &AppState,
    principal: &Principal,
    id: i64,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    principal.require_admin()?;
    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound("Category"))?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::BadRequest("name must not be empty".into()));
        }
        ensure_name_free(state, &name, Some(id)).await?;
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(description);
    }
    let category = active.update(&state.orm).await?;

    Ok(ApiResponse::item("Category updated", category_from_entity(category)))
}

/// Products of the deleted category keep existing with no category.
pub async fn delete_category(state: &AppState, principal: &Principal, id: i64) -> AppResult<()> {
    principal.require_admin()?;
    let result = Categories::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound("Category"));
    }
    tracing::info!(category_id = id, "category deleted");
    Ok(())
}

async fn ensure_name_free(state: &AppState, name: &str, except: Option<i64>) -> AppResult<()> {
    let mut finder = Categories::find().filter(Column::Name.eq(name));
    if let Some(id) = except {
        finder = finder.filter(Column::Id.ne(id));
    }
    if finder.one(&state.orm).await?.is_some() {
        return Err(AppError::Conflict("category name already exists".into()));
    }
    Ok(())
}
