//! PHC portal - session and access gate for a healthcare portal
//!
//! This library provides the portal's HTTP surface: signed session
//! credentials pinned to the login IP, role policy, accounts and admin
//! image uploads.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
