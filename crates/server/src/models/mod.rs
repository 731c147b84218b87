//! Row types and request/response payloads.

pub mod address;
pub mod order;
pub mod product;
pub mod user;

pub use address::{Address, AddressPatch, NewAddress};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderPatch, OrderWithItems};
pub use product::{NewProduct, Product, ProductPatch};
pub use user::{NewUser, User, UserPatch};

use serde::Serialize;

use crate::filters::Page;

/// Envelope for paginated list responses.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total_count: i64,
    pub page: u32,
    pub count: u32,
}

impl<T> ListResponse<T> {
    /// Wrap a page of items together with the unpaginated total.
    #[must_use]
    pub const fn new(items: Vec<T>, total_count: i64, page: Page) -> Self {
        Self {
            items,
            total_count,
            page: page.page(),
            count: page.count(),
        }
    }
}
