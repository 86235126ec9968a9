pub mod in_memory;
pub mod mercadopago;
pub mod multipart;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
pub mod smtp;
pub mod stability;
