//! Traits layered over the instance factory.

mod module;

pub use module::FactoryModule;
