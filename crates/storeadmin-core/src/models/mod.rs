//! Data models for the store API resources.
//!
//! - `Product`, `ProductFilter`: catalogue entries and list filtering
//! - `Category`: product categories
//! - `User`: accounts, including the logged-in profile

pub mod category;
pub mod product;
pub mod user;

pub use category::{Category, CategoryChanges, NewCategory};
pub use product::{NewProduct, Product, ProductChanges, ProductFilter};
pub use user::{NewUser, User, UserChanges};
