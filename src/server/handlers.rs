pub mod events;
pub mod health;
pub mod revocations;
pub mod trusted_cas;
