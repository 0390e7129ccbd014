use crate::error::AppError;

/// Users are not implemented yet; every user route answers with this error.
fn not_yet_defined() -> AppError {
    AppError::operational("This route is not yet defined!", 500)
}

/// GET /api/v1/users
pub async fn list_users_handler() -> AppError {
    not_yet_defined()
}

/// POST /api/v1/users
pub async fn create_user_handler() -> AppError {
    not_yet_defined()
}

/// GET /api/v1/users/{id}
pub async fn get_user_handler() -> AppError {
    not_yet_defined()
}

/// PATCH /api/v1/users/{id}
pub async fn update_user_handler() -> AppError {
    not_yet_defined()
}

/// DELETE /api/v1/users/{id}
pub async fn delete_user_handler() -> AppError {
    not_yet_defined()
}
