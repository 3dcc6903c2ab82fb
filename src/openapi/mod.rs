use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shopkeeper API",
        version = "0.1.0",
        description = r#"
# Shopkeeper retail management API

CRUD endpoints for products, categories, suppliers, purchases, sales, and
expenses. Purchases and sales own line items; every line mutation keeps the
parent's `total` equal to the sum of its line subtotals inside a single
database transaction.

## Error handling

Every response uses the same envelope with appropriate HTTP status codes:

```json
{
  "success": false,
  "error": "Not Found",
  "message": "Purchase 7f8a... not found",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept the query parameters:
- `page`: Page number (default: 1)
- `per_page`: Items per page (default: 20)
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "categories", description = "Product category endpoints"),
        (name = "suppliers", description = "Supplier endpoints"),
        (name = "products", description = "Product catalog endpoints"),
        (name = "purchases", description = "Purchase and purchase line endpoints"),
        (name = "sales", description = "Sale and sale line endpoints"),
        (name = "expenses", description = "Expense endpoints"),
        (name = "reports", description = "Financial summary endpoints")
    ),
    paths(
        // Categories
        crate::handlers::categories::create_category,
        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,

        // Suppliers
        crate::handlers::suppliers::create_supplier,
        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::get_supplier,
        crate::handlers::suppliers::update_supplier,
        crate::handlers::suppliers::delete_supplier,

        // Products
        crate::handlers::products::create_product,
        crate::handlers::products::list_products,
        crate::handlers::products::list_low_stock_products,
        crate::handlers::products::get_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        // Purchases and purchase lines
        crate::handlers::purchases::create_purchase,
        crate::handlers::purchases::list_purchases,
        crate::handlers::purchases::get_purchase,
        crate::handlers::purchases::delete_purchase,
        crate::handlers::purchases::create_purchase_line,
        crate::handlers::purchases::list_purchase_lines,
        crate::handlers::purchases::update_purchase_line,
        crate::handlers::purchases::delete_purchase_line,

        // Sales and sale lines
        crate::handlers::sales::create_sale,
        crate::handlers::sales::list_sales,
        crate::handlers::sales::get_sale,
        crate::handlers::sales::delete_sale,
        crate::handlers::sales::create_sale_line,
        crate::handlers::sales::list_sale_lines,
        crate::handlers::sales::update_sale_line,
        crate::handlers::sales::delete_sale_line,

        // Expenses
        crate::handlers::expenses::create_expense,
        crate::handlers::expenses::list_expenses,
        crate::handlers::expenses::get_expense,
        crate::handlers::expenses::update_expense,
        crate::handlers::expenses::delete_expense,

        // Reports
        crate::handlers::reports::summary_report,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::handlers::common::PaginatedResponse<serde_json::Value>,
            crate::handlers::common::PaginationMeta,

            // Request types
            crate::handlers::categories::CategoryRequest,
            crate::handlers::suppliers::SupplierRequest,
            crate::handlers::products::ProductRequest,
            crate::handlers::purchases::CreatePurchaseRequest,
            crate::handlers::purchases::PurchaseLineRequest,
            crate::handlers::sales::CreateSaleRequest,
            crate::handlers::sales::SaleLineRequest,
            crate::handlers::expenses::ExpenseRequest,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_includes_core_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Shopkeeper API"));
        assert!(json.contains("/api/v1/purchases/{id}/lines"));
        assert!(json.contains("/api/v1/sales/lines/{line_id}"));
        assert!(json.contains("/api/v1/reports/summary"));
        assert!(json.contains("/api/v1/products/low-stock"));
    }
}
