pub mod audit_logs;
pub mod cart_items;
pub mod carts;
pub mod collections;
pub mod customers;
pub mod order_items;
pub mod orders;
pub mod product_images;
pub mod products;
pub mod reviews;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use carts::Entity as Carts;
pub use collections::Entity as Collections;
pub use customers::Entity as Customers;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_images::Entity as ProductImages;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
