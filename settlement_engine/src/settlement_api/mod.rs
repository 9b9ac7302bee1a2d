pub mod commission_api;
pub mod commission_objects;
pub mod conversion_api;
pub mod errors;
pub mod order_flow_api;
pub mod order_objects;
pub mod swap_api;
