pub mod category;
pub mod expense;
pub mod product;
pub mod purchase;
pub mod purchase_line;
pub mod sale;
pub mod sale_line;
pub mod supplier;
