pub mod cart;
pub mod destination;
pub mod estimate;
pub mod product;
pub mod shipping;
pub mod tax;
