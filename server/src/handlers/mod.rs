//! Route handlers. Each one turns a request into at most one repository
//! call and shapes the response; none of them keep state of their own.

pub mod health;
pub mod metrics;
pub mod todos;
