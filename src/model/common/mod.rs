//! Types shared between the API and the database, serialised the same way in both.

pub mod poll;
