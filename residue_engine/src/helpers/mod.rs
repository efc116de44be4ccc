mod record_numbers;

pub use record_numbers::{new_delivery_number, new_order_number, new_receipt};
