// Catalog services
pub mod categories;
pub mod products;
pub mod suppliers;

// Parent aggregates and their line items
pub mod purchases;
pub mod sales;

// Financial services
pub mod expenses;
pub mod reports;
