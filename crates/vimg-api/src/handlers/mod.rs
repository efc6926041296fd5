//! HTTP request handlers

pub mod accounts;
pub mod services;
pub mod vehicles;
