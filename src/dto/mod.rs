pub mod analytics;
pub mod auth;
pub mod content;
pub mod customers;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod search;
