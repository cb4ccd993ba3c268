pub mod edge_handlers;
pub mod health_handlers;
