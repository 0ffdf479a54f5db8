pub mod gallery_handlers;
pub mod pages;
