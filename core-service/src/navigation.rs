//! Page-stack navigation
//!
//! The current page is held apart from the back stack. Every effective
//! transition bumps a visit id; page fetches are tagged with it so a response
//! for a page the user already left can be recognised and dropped.

use core_catalog::AlbumRef;
use serde::{Deserialize, Serialize};

/// A browsable page.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "page", content = "target", rename_all = "snake_case")]
pub enum Page {
    #[default]
    Home,
    Search,
    /// Carries the album summary so the header renders before the fetch.
    Album(AlbumRef),
    /// Artist id
    Artist(String),
}

impl Page {
    /// Stable label used in logs and events.
    pub fn label(&self) -> String {
        match self {
            Page::Home => "home".to_string(),
            Page::Search => "search".to_string(),
            Page::Album(album) => format!("album:{}", album.id),
            Page::Artist(id) => format!("artist:{}", id),
        }
    }
}

#[derive(Debug, Default)]
pub struct NavigationController {
    stack: Vec<Page>,
    current: Page,
    visit: u64,
}

impl NavigationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes the current page and makes `next` current. Returns the new
    /// visit id. Duplicates are allowed.
    pub fn navigate(&mut self, next: Page) -> u64 {
        let previous = std::mem::replace(&mut self.current, next);
        self.stack.push(previous);
        self.visit += 1;
        self.visit
    }

    /// Restores the most recent page. Returns `false` on an empty stack.
    pub fn go_back(&mut self) -> bool {
        match self.stack.pop() {
            Some(previous) => {
                self.current = previous;
                self.visit += 1;
                true
            }
            None => false,
        }
    }

    pub fn current_page(&self) -> &Page {
        &self.current
    }

    pub fn can_go_back(&self) -> bool {
        !self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Previous pages, oldest first.
    pub fn history(&self) -> &[Page] {
        &self.stack
    }

    pub fn visit(&self) -> u64 {
        self.visit
    }
}
