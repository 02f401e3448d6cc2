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
    dto::{
        auth::{ChangePasswordRequest, LoginRequest, LoginResponse, RegisterRequest},
        cart::{
            AddCartItemRequest, CartItemDetail, CartValidation, CartWithItems, CheckoutRequest,
            CheckoutResponse, CheckoutSummary, SummaryLine, UpdateCartItemRequest,
        },
        categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
        dashboard::{
            AdminDashboard, CreateInvoiceRequest, InvoiceList, InvoiceWithItems, RecentOrder,
            RevenuePoint, SellerDashboard, TopProduct, TopSeller, UpdateInvoiceStatusRequest,
        },
        orders::{
            CreateOrderRequest, OrderLineRequest, OrderList, OrderWithItems,
            UpdateOrderStatusRequest, UpdatePaymentStatusRequest,
        },
        payments::{
            ConfirmPaymentRequest, CreateIntentRequest, CreateMethodRequest, CreateRefundRequest,
            IntentResponse, MethodList, PaymentList, RefundList, RefundResponse,
            UpdateMethodRequest,
        },
        products::{CreateProductRequest, InventoryAdjustRequest, ProductList, UpdateProductRequest},
        users::{UpdateUserRequest, UserList},
    },
    models::{
        Cart, CartItem, Category, Invoice, InvoiceItem, Order, OrderItem, Payment, PaymentMethod,
        PaymentRefund, Product, User,
    },
    response::{ApiResponse, Meta},
    routes::{auth, cart, categories, dashboard, health, orders, payments, products, users},
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
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::change_password,
        users::list_users,
        users::list_sellers,
        users::get_user,
        users::update_user,
        users::delete_user,
        categories::list_categories,
        categories::get_category,
        categories::create_category,
        categories::update_category,
        categories::delete_category,
        products::list_products,
        products::list_my_products,
        products::list_low_stock,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::adjust_inventory,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        cart::checkout_summary,
        cart::validate_cart,
        cart::checkout,
        orders::list_orders,
        orders::get_order,
        orders::create_order,
        orders::cancel_order,
        orders::update_status,
        orders::update_payment_status,
        payments::list_payments,
        payments::create_intent,
        payments::confirm_payment,
        payments::get_payment,
        payments::create_refund,
        payments::list_refunds,
        payments::list_methods,
        payments::create_method,
        payments::update_method,
        payments::delete_method,
        payments::webhook,
        dashboard::seller_dashboard,
        dashboard::admin_dashboard,
        dashboard::create_invoice,
        dashboard::list_invoices,
        dashboard::get_invoice,
        dashboard::update_invoice_status,
    ),
    components(
        schemas(
            User,
            Category,
            Product,
            Cart,
            CartItem,
            Order,
            OrderItem,
            Payment,
            PaymentRefund,
            PaymentMethod,
            Invoice,
            InvoiceItem,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            ChangePasswordRequest,
            UpdateUserRequest,
            UserList,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            CategoryList,
            CreateProductRequest,
            UpdateProductRequest,
            InventoryAdjustRequest,
            ProductList,
            AddCartItemRequest,
            UpdateCartItemRequest,
            CartItemDetail,
            CartWithItems,
            CheckoutRequest,
            CheckoutResponse,
            SummaryLine,
            CheckoutSummary,
            CartValidation,
            OrderLineRequest,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            UpdatePaymentStatusRequest,
            OrderWithItems,
            OrderList,
            CreateIntentRequest,
            ConfirmPaymentRequest,
            CreateRefundRequest,
            CreateMethodRequest,
            UpdateMethodRequest,
            IntentResponse,
            PaymentList,
            MethodList,
            RefundList,
            RefundResponse,
            RecentOrder,
            TopProduct,
            TopSeller,
            RevenuePoint,
            SellerDashboard,
            AdminDashboard,
            CreateInvoiceRequest,
            UpdateInvoiceStatusRequest,
            InvoiceWithItems,
            InvoiceList,
            Meta,
            ApiResponse<User>,
            ApiResponse<Product>,
            ApiResponse<Order>,
            ApiResponse<Payment>,
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Users", description = "Account administration"),
        (name = "Categories", description = "Catalog categories"),
        (name = "Products", description = "Product endpoints"),
        (name = "Cart", description = "Cart and checkout endpoints"),
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "Payments", description = "Payments, refunds, and saved methods"),
        (name = "Dashboard", description = "Analytics and invoices"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
