//! Edge request routing and the function artifact that carries it.

pub mod artifact;
pub mod router;
