//! Concrete [`Driver`](crate::driver::Driver) backends.

pub mod chromiumoxide;
