//! Memory inspection.
//!
//! - [`page_table`]: the page-table entries and the walker over them.
//! - [`inspect`]: `showmp` and `setperm`, reporting and flipping the
//!   protection bits of individual pages.
//! - [`dump`]: `showvm`, printing raw machine words.
pub mod dump;
pub mod inspect;
pub mod page_table;
