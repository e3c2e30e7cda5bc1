//! Bearer token authentication.
//!
//! Tokens are issued by the account service that shares `JWT_SECRET` with
//! this process; here they are only validated.

pub mod jwt;
