//! Mentora - A lightweight mentorship session booking service
//!
//! This library provides the core functionality for the Mentora booking system:
//! account signup with email verification, mentorship session bookings, and the
//! asynchronous notification workflow around them (confirmation emails, mentor
//! invites, reminders, completion prompts).

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod tasks;
