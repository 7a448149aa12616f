pub mod forward;
pub mod jwks;
pub mod tenant;
pub mod verify;
