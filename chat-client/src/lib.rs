pub mod config;
pub mod controller;
pub mod models;
pub mod services;
pub mod startup;
pub mod view;
