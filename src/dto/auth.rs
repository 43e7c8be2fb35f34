use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Customer, User};

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    /// `admin` or `staff`.
    pub role: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct CustomerRegisterRequest {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub password: String,
}

/// Customers sign in with either their phone or email.
#[derive(Deserialize, Debug, ToSchema)]
pub struct CustomerLoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    /// Mirrors the client-side `userType` storage key: `admin`, `staff` or `customer`.
    pub user_type: String,
    pub user: Option<User>,
    pub customer: Option<Customer>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserList {
    pub items: Vec<User>,
}
