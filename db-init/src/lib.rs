//! The db-init custom resource handler
//!
//! Initializes the mesh database: one schema and one principal per service,
//! with statements that converge when the event is delivered again.
//! [`init::Initializer`] carries the logic behind the
//! [`composer::provisioner::ResourceHandler`] seam; the binary wires it to
//! AWS Secrets Manager and a MySQL connection built from the master secret.

pub mod init;
pub mod secrets;
pub mod sql;
