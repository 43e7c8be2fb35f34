use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    ai::chat::{CartLine, ChatRequest, ChatRole, ChatTurn, PageContext, ProductCard},
    dto::{
        analytics::{AnalyticsSummary, DailyRevenue, StatusCount, TopProduct},
        auth::{
            CreateUserRequest, CustomerLoginRequest, CustomerRegisterRequest, LoginRequest,
            LoginResponse, UserList,
        },
        content::{BannerList, BannerRequest, GlobalRequest, LocalizedPage, PageRequest},
        customers::{CustomerList, CustomerSummary},
        orders::{
            CreateOrderRequest, OrderLineRequest, OrderList, OrderLookup, OrderWithItems,
            TrackedItem, TrackedOrder, UpdateOrderStatusRequest,
        },
        payments::{PaymentList, UpdatePaymentRequest},
        products::{
            CategoryList, CreateCategoryRequest, CreateProductRequest, InventoryAdjustRequest,
            ProductList, UpdateProductRequest,
        },
        reviews::{CreateReviewRequest, ModerateReviewRequest, ReviewList},
        search::{IndexReport, IndexRequest, IndexStatus, SearchHit, SearchMode, SearchResults},
    },
    locale::Locale,
    models::{
        Banner, Category, Customer, GlobalDoc, Order, OrderItem, OrderStatus, Page, PageKind,
        Payment, PaymentMethod, PaymentStatus, Product, Review, ReviewStatus, Role,
        ShippingAddress, User,
    },
    response::{ApiResponse, Meta},
    routes::{
        admin, ai, analytics, auth, content, customers, health, orders, params, payments,
        products, reviews, search,
    },
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Holding Portal API",
        description = "Storefront, dashboard, content and shopping assistant for the holding group portal"
    ),
    paths(
        health::health_check,
        health::readiness,
        auth::login,
        customers::register,
        customers::login,
        customers::me,
        customers::list_customers,
        customers::get_customer,
        products::list_products,
        products::get_product,
        products::get_product_by_slug,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::list_product_reviews,
        products::create_review,
        products::list_categories,
        products::create_category,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::update_order_status,
        payments::list_payments,
        payments::update_payment,
        reviews::list_reviews,
        reviews::moderate_review,
        admin::list_low_stock,
        admin::adjust_inventory,
        admin::list_users,
        admin::create_user,
        analytics::summary,
        content::list_banners,
        content::list_all_banners,
        content::create_banner,
        content::update_banner,
        content::delete_banner,
        content::get_page,
        content::upsert_page,
        content::get_global,
        content::put_global,
        search::search,
        ai::chat,
        ai::index_embeddings,
        ai::index_status
    ),
    components(
        schemas(
            Locale,
            Role,
            OrderStatus,
            PaymentMethod,
            PaymentStatus,
            ReviewStatus,
            PageKind,
            User,
            Customer,
            Category,
            Product,
            ShippingAddress,
            Order,
            OrderItem,
            Payment,
            Review,
            Banner,
            Page,
            GlobalDoc,
            LoginRequest,
            LoginResponse,
            CreateUserRequest,
            CustomerRegisterRequest,
            CustomerLoginRequest,
            UserList,
            CustomerSummary,
            CustomerList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            CreateCategoryRequest,
            CategoryList,
            InventoryAdjustRequest,
            OrderLineRequest,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            OrderWithItems,
            OrderList,
            OrderLookup,
            TrackedOrder,
            TrackedItem,
            UpdatePaymentRequest,
            PaymentList,
            CreateReviewRequest,
            ModerateReviewRequest,
            ReviewList,
            AnalyticsSummary,
            StatusCount,
            TopProduct,
            DailyRevenue,
            BannerRequest,
            BannerList,
            PageRequest,
            LocalizedPage,
            GlobalRequest,
            IndexRequest,
            IndexReport,
            IndexStatus,
            SearchMode,
            SearchHit,
            SearchResults,
            ChatRequest,
            ChatRole,
            ChatTurn,
            CartLine,
            PageContext,
            ProductCard,
            health::HealthData,
            params::Pagination,
            params::SortOrder,
            params::ProductSortBy,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderLookup>,
            ApiResponse<LoginResponse>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness"),
        (name = "Auth", description = "Dashboard authentication"),
        (name = "Customers", description = "Customer accounts"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Reviews", description = "Product reviews and moderation"),
        (name = "Orders", description = "Checkout, listing and tracking"),
        (name = "Payments", description = "Payment records"),
        (name = "Admin", description = "Inventory and dashboard users"),
        (name = "Analytics", description = "Sales reporting"),
        (name = "Content", description = "Banners, pages and site-wide documents"),
        (name = "Search", description = "Product search"),
        (name = "AI", description = "Shopping assistant and embeddings"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_public_and_protected_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/orders"));
        assert!(paths.contains_key("/api/ai/chat"));
        assert!(paths.contains_key("/api/content/globals/{key}"));
        let schemes = doc.components.as_ref().map(|c| &c.security_schemes);
        assert!(schemes.is_some_and(|s| s.contains_key("bearer_auth")));
    }
}
