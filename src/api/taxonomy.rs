/// Category and tag administration
use crate::{
    api::{
        admin::SuccessResponse,
        forms::{render, MultipartForm},
    },
    auth::{Admins, Authorized, PageAuthorized},
    content::{CategoryInput, TagInput},
    context::AppContext,
    error::{AppError, AppResult, PageResult},
    views::{CategoriesPage, CategoryFormPage, TagFormPage, TagsPage},
};
use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/admin/categories", get(list_categories))
        .route("/admin/categories/new", get(new_category_page).post(create_category))
        .route("/admin/categories/:id/edit", get(edit_category_page).post(update_category))
        .route("/admin/categories/:id/delete", post(delete_category))
        .route("/admin/tags", get(list_tags))
        .route("/admin/tags/new", get(new_tag_page).post(create_tag))
        .route("/admin/tags/:id/edit", get(edit_tag_page).post(update_tag))
        .route("/admin/tags/:id/delete", post(delete_tag))
}

async fn list_categories(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
) -> PageResult<Html<String>> {
    let categories = ctx.taxonomy_manager.categories_with_counts().await?;

    Ok(render(&CategoriesPage {
        viewer: Some(&auth.user),
        categories: &categories,
    })?)
}

async fn new_category_page(auth: PageAuthorized<Admins>) -> PageResult<Html<String>> {
    Ok(render(&CategoryFormPage {
        viewer: Some(&auth.user),
        heading: "New category",
        action: "/admin/categories/new",
        name: "",
        slug: "",
        description: "",
        image_id: None,
        error: None,
    })?)
}

fn category_fields(form: &MultipartForm) -> CategoryInput {
    CategoryInput {
        name: form.text("name"),
        slug: form.optional("slug"),
        description: form.optional("description"),
        image: None,
        remove_image: form.flag("remove_image"),
    }
}

/// Render the category form again with the submitted values
fn category_form_error(
    auth: &PageAuthorized<Admins>,
    heading: &str,
    action: &str,
    form: &MultipartForm,
    image_id: Option<i64>,
    err: AppError,
) -> PageResult<Response> {
    match err {
        AppError::Validation(message) => {
            let page = render(&CategoryFormPage {
                viewer: Some(&auth.user),
                heading,
                action,
                name: &form.text("name"),
                slug: &form.text("slug"),
                description: &form.text("description"),
                image_id,
                error: Some(&message),
            })?;
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        other => Err(other.into()),
    }
}

async fn create_category(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    multipart: Multipart,
) -> PageResult<Response> {
    let form = MultipartForm::read(multipart).await?;
    let mut input = category_fields(&form);

    let result = match form.image("image", &ctx.image_store) {
        Ok(image) => {
            input.image = image;
            ctx.taxonomy_manager.create_category(input).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(Redirect::to("/admin/categories").into_response()),
        Err(e) => category_form_error(&auth, "New category", "/admin/categories/new", &form, None, e),
    }
}

async fn edit_category_page(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    Path(id): Path<i64>,
) -> PageResult<Html<String>> {
    let category = ctx.taxonomy_manager.category(id).await?;
    let action = format!("/admin/categories/{}/edit", id);

    Ok(render(&CategoryFormPage {
        viewer: Some(&auth.user),
        heading: "Edit category",
        action: &action,
        name: &category.name,
        slug: &category.slug,
        description: category.description.as_deref().unwrap_or_default(),
        image_id: category.image_id,
        error: None,
    })?)
}

async fn update_category(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> PageResult<Response> {
    let current = ctx.taxonomy_manager.category(id).await?;
    let form = MultipartForm::read(multipart).await?;
    let mut input = category_fields(&form);

    let result = match form.image("image", &ctx.image_store) {
        Ok(image) => {
            input.image = image;
            ctx.taxonomy_manager.update_category(id, input).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(_) => Ok(Redirect::to("/admin/categories").into_response()),
        Err(e) => {
            let action = format!("/admin/categories/{}/edit", id);
            category_form_error(&auth, "Edit category", &action, &form, current.image_id, e)
        }
    }
}

async fn delete_category(
    State(ctx): State<AppContext>,
    auth: Authorized<Admins>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse>> {
    ctx.taxonomy_manager.delete_category(id).await?;
    tracing::info!("User {} deleted category {}", auth.id, id);
    Ok(Json(SuccessResponse { success: true }))
}

async fn list_tags(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
) -> PageResult<Html<String>> {
    let tags = ctx.taxonomy_manager.tags().await?;

    Ok(render(&TagsPage {
        viewer: Some(&auth.user),
        tags: &tags,
    })?)
}

async fn new_tag_page(auth: PageAuthorized<Admins>) -> PageResult<Html<String>> {
    Ok(render(&TagFormPage {
        viewer: Some(&auth.user),
        heading: "New tag",
        action: "/admin/tags/new",
        name: "",
        slug: "",
        error: None,
    })?)
}

fn tag_form_error(
    auth: &PageAuthorized<Admins>,
    heading: &str,
    action: &str,
    input: &TagInput,
    err: AppError,
) -> PageResult<Response> {
    match err {
        AppError::Validation(message) => {
            let page = render(&TagFormPage {
                viewer: Some(&auth.user),
                heading,
                action,
                name: &input.name,
                slug: input.slug.as_deref().unwrap_or_default(),
                error: Some(&message),
            })?;
            Ok((StatusCode::BAD_REQUEST, page).into_response())
        }
        other => Err(other.into()),
    }
}

async fn create_tag(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    Form(input): Form<TagInput>,
) -> PageResult<Response> {
    match ctx.taxonomy_manager.create_tag(input.clone()).await {
        Ok(_) => Ok(Redirect::to("/admin/tags").into_response()),
        Err(e) => tag_form_error(&auth, "New tag", "/admin/tags/new", &input, e),
    }
}

async fn edit_tag_page(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    Path(id): Path<i64>,
) -> PageResult<Html<String>> {
    let tag = ctx.taxonomy_manager.tag(id).await?;
    let action = format!("/admin/tags/{}/edit", id);

    Ok(render(&TagFormPage {
        viewer: Some(&auth.user),
        heading: "Edit tag",
        action: &action,
        name: &tag.name,
        slug: &tag.slug,
        error: None,
    })?)
}

async fn update_tag(
    State(ctx): State<AppContext>,
    auth: PageAuthorized<Admins>,
    Path(id): Path<i64>,
    Form(input): Form<TagInput>,
) -> PageResult<Response> {
    match ctx.taxonomy_manager.update_tag(id, input.clone()).await {
        Ok(_) => Ok(Redirect::to("/admin/tags").into_response()),
        Err(e) => {
            let action = format!("/admin/tags/{}/edit", id);
            tag_form_error(&auth, "Edit tag", &action, &input, e)
        }
    }
}

async fn delete_tag(
    State(ctx): State<AppContext>,
    auth: Authorized<Admins>,
    Path(id): Path<i64>,
) -> AppResult<Json<SuccessResponse>> {
    ctx.taxonomy_manager.delete_tag(id).await?;
    tracing::info!("User {} deleted tag {}", auth.id, id);
    Ok(Json(SuccessResponse { success: true }))
}
