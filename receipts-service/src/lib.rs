//! Receipts Service - receipt recording and rolling revenue analytics for
//! agricultural market committees.
//!
//! The write path keeps six denormalized aggregate tables exactly consistent
//! with the set of non-cancelled receipts, inside one database transaction
//! per mutation.

pub mod config;
pub mod models;
pub mod services;
