pub mod cli;
mod page;
pub mod web;
