pub mod audit_logs;
pub mod banners;
pub mod categories;
pub mod customers;
pub mod globals;
pub mod order_items;
pub mod orders;
pub mod pages;
pub mod payments;
pub mod product_embeddings;
pub mod products;
pub mod reviews;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use banners::Entity as Banners;
pub use categories::Entity as Categories;
pub use customers::Entity as Customers;
pub use globals::Entity as Globals;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use pages::Entity as Pages;
pub use payments::Entity as Payments;
pub use product_embeddings::Entity as ProductEmbeddings;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use users::Entity as Users;
