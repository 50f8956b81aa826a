//! Domain models and request payloads.

pub mod catalog;
pub mod order;
pub mod pagination;
pub mod user;

pub use catalog::{
    Category, CategoryRef, Image, NewCategory, NewImage, NewProduct, Product, ProductFilter,
    ProductUpdate,
};
pub use order::{
    NewOrder, NewOrderLine, Order, OrderFilter, OrderLine, OrderLineRequest, OrderUpdate,
    PlaceOrderRequest, ProductRef, TransferSlip,
};
pub use pagination::{PageRequest, Paginated};
pub use user::{
    Passport, RefreshRequest, RegisterRequest, SignInRequest, SignOutRequest, User, UserClaims,
    UserCredentialCheck, UserToken,
};
