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
        cart::{AddCartItemRequest, CartItemList, UpdateCartItemRequest},
        collections::{CollectionList, CollectionRequest},
        customers::{CustomerList, UpdateCustomerRequest},
        orders::{CreateOrderRequest, OrderList, UpdateOrderRequest},
        products::{
            AddImageRequest, ClearInventoryRequest, ClearInventoryResult, CreateProductRequest,
            CreateReviewRequest, ImageList, InventoryProduct, InventoryProductList, ProductList,
            ReviewList, UpdateProductRequest,
        },
    },
    models::{
        Cart, CartItem, Collection, Customer, Membership, Order, OrderItem, PaymentStatus,
        Product, ProductImage, Review, SimpleProduct,
    },
    response::{ApiResponse, Meta},
    routes::{admin, carts, collections, customers, health, orders, params, products},
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
        collections::list_collections,
        collections::get_collection,
        collections::create_collection,
        collections::update_collection,
        collections::delete_collection,
        products::list_products,
        products::get_product,
        products::create_product,
        products::update_product,
        products::delete_product,
        products::list_images,
        products::add_image,
        products::delete_image,
        products::list_reviews,
        products::create_review,
        products::get_review,
        products::delete_review,
        carts::create_cart,
        carts::get_cart,
        carts::delete_cart,
        carts::list_items,
        carts::add_item,
        carts::update_item,
        carts::remove_item,
        customers::get_me,
        customers::update_me,
        customers::list_customers,
        customers::get_customer,
        orders::list_orders,
        orders::create_order,
        orders::get_order,
        orders::update_order,
        orders::delete_order,
        admin::list_low_inventory,
        admin::clear_inventory
    ),
    components(
        schemas(
            Collection,
            Product,
            ProductImage,
            SimpleProduct,
            Review,
            Cart,
            CartItem,
            Customer,
            Membership,
            Order,
            OrderItem,
            PaymentStatus,
            CollectionRequest,
            CollectionList,
            CreateProductRequest,
            UpdateProductRequest,
            ProductList,
            AddImageRequest,
            ImageList,
            CreateReviewRequest,
            ReviewList,
            AddCartItemRequest,
            UpdateCartItemRequest,
            CartItemList,
            UpdateCustomerRequest,
            CustomerList,
            CreateOrderRequest,
            UpdateOrderRequest,
            OrderList,
            InventoryProduct,
            InventoryProductList,
            ClearInventoryRequest,
            ClearInventoryResult,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::LowInventoryQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<Cart>,
            ApiResponse<Order>,
            ApiResponse<OrderList>
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Collections", description = "Collection endpoints"),
        (name = "Products", description = "Product and image endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Carts", description = "Anonymous cart endpoints"),
        (name = "Customers", description = "Customer profile endpoints"),
        (name = "Orders", description = "Order placement and management"),
        (name = "Admin", description = "Inventory administration"),
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
    fn order_placement_is_documented() {
        let spec = ApiDoc::openapi();
        let orders = spec.paths.paths.get("/api/orders").expect("orders path");
        assert!(orders.post.is_some());
        assert!(spec.paths.paths.contains_key("/api/carts/{id}/items/{item_id}"));
    }
}
