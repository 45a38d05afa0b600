/// Comment and favorite JSON API for logged-in readers
use crate::{
    admin::{VoteKind, VoteTotals},
    auth::{AnyUser, Authorized},
    context::AppContext,
    db::content::Comment,
    error::AppResult,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/comments", post(create_comment))
        .route("/comments/:id", put(edit_comment))
        .route("/comments/:id/flag", post(flag_comment))
        .route("/comments/:id/vote/:kind", post(vote_comment))
        .route("/news/:article/favorite", post(toggle_favorite))
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub article_id: i64,
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub success: bool,
    pub message: &'static str,
    pub comment: Comment,
}

/// Submit a comment; it stays hidden until approved
async fn create_comment(
    State(ctx): State<AppContext>,
    auth: Authorized<AnyUser>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    let comment = ctx
        .comment_manager
        .submit(&auth.user, req.article_id, &req.body, req.parent_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            success: true,
            message: "Comment submitted for moderation",
            comment,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct EditCommentRequest {
    pub body: String,
}

async fn edit_comment(
    State(ctx): State<AppContext>,
    auth: Authorized<AnyUser>,
    Path(id): Path<i64>,
    Json(req): Json<EditCommentRequest>,
) -> AppResult<Json<CommentResponse>> {
    let comment = ctx.comment_manager.edit(&auth.user, id, &req.body).await?;

    Ok(Json(CommentResponse {
        success: true,
        message: "Comment updated and sent back to moderation",
        comment,
    }))
}

#[derive(Debug, Deserialize)]
pub struct FlagCommentRequest {
    pub reason: String,
}

async fn flag_comment(
    State(ctx): State<AppContext>,
    auth: Authorized<AnyUser>,
    Path(id): Path<i64>,
    Json(req): Json<FlagCommentRequest>,
) -> AppResult<Json<serde_json::Value>> {
    ctx.comment_manager.flag(&auth.user, id, &req.reason).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Comment reported"
    })))
}

async fn vote_comment(
    State(ctx): State<AppContext>,
    _auth: Authorized<AnyUser>,
    Path((id, kind)): Path<(i64, String)>,
) -> AppResult<Json<VoteTotals>> {
    let kind = VoteKind::from_str(&kind)?;
    Ok(Json(ctx.comment_manager.vote(id, kind).await?))
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub favorite: bool,
}

async fn toggle_favorite(
    State(ctx): State<AppContext>,
    auth: Authorized<AnyUser>,
    Path(article_id): Path<i64>,
) -> AppResult<Json<FavoriteResponse>> {
    let favorite = ctx.article_manager.toggle_favorite(auth.id, article_id).await?;
    Ok(Json(FavoriteResponse { favorite }))
}
