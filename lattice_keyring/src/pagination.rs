use serde::{Deserialize, Serialize};

use crate::consts::PAGE_SIZE;

/// An address shown in an account selection page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageEntry {
    pub address: String,
    pub index: u32,
}

/// Cursor over pages of [`PAGE_SIZE`] derivation indices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
}

impl Pagination {
    pub fn new(page: u32) -> Self {
        Self { page }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    /// Move by `delta` pages, never before the first one.
    pub fn move_by(&mut self, delta: i64) {
        let page = (i64::from(self.page) + delta).clamp(0, i64::from(u32::MAX));
        self.page = page as u32;
    }

    pub fn reset(&mut self) {
        self.page = 0;
    }

    /// First derivation index of the current page, `None` on overflow.
    pub fn start_index(&self) -> Option<u32> {
        self.page.checked_mul(PAGE_SIZE)
    }
}
