//! HTTP handlers for reviews.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::models::{
        bookings::BookingStatus,
        pagination::PaginatedResponse,
        reviews::{ListReviewsQuery, ReviewCreate, ReviewResponse},
    },
    auth::permissions::{operation, resource, RequiresPermission},
    db::{
        handlers::{Bookings, Reviews},
        models::reviews::ReviewCreateDBRequest,
    },
    errors::{Error, Result},
    types::{BookingId, LawyerId},
    AppState,
};

/// Review a completed booking (its client, once)
#[utoipa::path(
    post,
    path = "/bookings/{id}/review",
    tag = "reviews",
    request_body = ReviewCreate,
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 201, description = "Review created", body = ReviewResponse),
        (status = 400, description = "Invalid rating or booking not completed"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Not found"),
        (status = 409, description = "Booking already reviewed"),
    ),
    security(("BearerAuth" = []), ("CookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn create_review(
    State(state): State<AppState>,
    Path(id): Path<BookingId>,
    perm: RequiresPermission<resource::Reviews, operation::CreateOwn>,
    Json(request): Json<ReviewCreate>,
) -> Result<(StatusCode, Json<ReviewResponse>)> {
    let user = perm.user;

    if !(1..=5).contains(&request.rating) {
        return Err(Error::BadRequest {
            message: "Rating must be between 1 and 5".to_string(),
        });
    }

    let not_found = || Error::NotFound {
        resource: "Booking".to_string(),
        id: id.to_string(),
    };

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;

    let mut bookings = Bookings::new(&mut pool_conn);
    let booking = bookings.get_by_id(id).await?.ok_or_else(not_found)?;

    // Only the client who sat the consultation reviews it
    if booking.client_id != user.id {
        return Err(not_found());
    }
    if booking.status != BookingStatus::Completed {
        return Err(Error::BadRequest {
            message: "Only completed bookings can be reviewed".to_string(),
        });
    }

    // The unique constraint turns a double submit into a 409
    let mut reviews = Reviews::new(&mut pool_conn);
    let review = reviews
        .create(&ReviewCreateDBRequest {
            booking_id: id,
            client_id: user.id,
            lawyer_id: booking.lawyer_id,
            rating: request.rating,
            comment: request.comment,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(ReviewResponse::from(review))))
}

/// List a lawyer's reviews (public)
#[utoipa::path(
    get,
    path = "/lawyers/{id}/reviews",
    tag = "reviews",
    params(("id" = String, Path, description = "Lawyer ID"), ListReviewsQuery),
    responses(
        (status = 200, description = "Paginated reviews", body = PaginatedResponse<ReviewResponse>),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_lawyer_reviews(
    State(state): State<AppState>,
    Path(id): Path<LawyerId>,
    Query(query): Query<ListReviewsQuery>,
) -> Result<Json<PaginatedResponse<ReviewResponse>>> {
    let skip = query.pagination.skip();
    let limit = query.pagination.limit();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Reviews::new(&mut pool_conn);

    let reviews = repo.list_for_lawyer(id, skip, limit).await?;
    let total_count = repo.count_for_lawyer(id).await?;

    Ok(Json(PaginatedResponse::new(
        reviews.into_iter().map(ReviewResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}
