#![allow(dead_code)]

pub mod models;
pub mod temp_db;
