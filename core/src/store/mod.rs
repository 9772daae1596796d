// orderpay/src/store/mod.rs

pub mod memory;

pub use memory::InMemoryOrderStore;
