use anyhow::Result;
use tracing::{debug, info};

use crate::bookmarks::{Bookmark, BookmarkStore};
use crate::news::{Article, NewsClient, NewsQuery};
use crate::opener::UrlOpener;
use crate::surface::{palette_for, Surface};

/// Mutable application state owned by the event loop.
pub struct AppState {
    /// Articles in display order; index `i` is surface row `i`.
    pub articles: Vec<Article>,
    pub dark: bool,
    pub filters: NewsQuery,
}

impl AppState {
    pub fn new(filters: NewsQuery) -> Self {
        Self {
            articles: Vec::new(),
            dark: false,
            filters,
        }
    }
}

/// A user (or timer) action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Fetch,
    SetCategory(String),
    SetSource(String),
    /// Set the free-text filter, then fetch
    Search(String),
    Select(usize),
    /// Open the given row, or the selected one
    Open(Option<usize>),
    /// Bookmark the given row, or the selected one
    Bookmark(Option<usize>),
    ListBookmarks,
    ToggleTheme,
}

/// What a handled command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Fetched(usize),
    FiltersUpdated,
    Selected(usize),
    NoSuchRow(usize),
    /// Open or Bookmark without a selected row; nothing happened
    NoSelection,
    Opened(String),
    Bookmarked(Bookmark),
    Bookmarks(Vec<Bookmark>),
    ThemeChanged { dark: bool, recolored: usize },
}

pub struct App<S: Surface> {
    state: AppState,
    surface: S,
    news: NewsClient,
    bookmarks: BookmarkStore,
    opener: Box<dyn UrlOpener>,
}

impl<S: Surface> App<S> {
    pub fn new(
        state: AppState,
        surface: S,
        news: NewsClient,
        bookmarks: BookmarkStore,
        opener: Box<dyn UrlOpener>,
    ) -> Self {
        let mut app = Self {
            state,
            surface,
            news,
            bookmarks,
            opener,
        };
        app.show_filters();
        app
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn bookmarks(&self) -> &BookmarkStore {
        &self.bookmarks
    }

    pub async fn handle(&mut self, command: Command) -> Result<CommandOutcome> {
        debug!(?command, "handling command");
        match command {
            Command::Fetch => self.fetch().await,
            Command::SetCategory(category) => {
                self.state.filters.category = category;
                self.show_filters();
                Ok(CommandOutcome::FiltersUpdated)
            }
            Command::SetSource(source) => {
                self.state.filters.source = source;
                self.show_filters();
                Ok(CommandOutcome::FiltersUpdated)
            }
            Command::Search(text) => {
                self.state.filters.search = text;
                self.show_filters();
                self.fetch().await
            }
            Command::Select(row) => Ok(self.select(row)),
            Command::Open(row) => self.open(row),
            Command::Bookmark(row) => self.bookmark(row).await,
            Command::ListBookmarks => Ok(CommandOutcome::Bookmarks(self.bookmarks.list().await?)),
            Command::ToggleTheme => Ok(self.toggle_theme()),
        }
    }

    /// Replace the article list and the displayed rows with a fresh fetch.
    /// On error both are left untouched.
    async fn fetch(&mut self) -> Result<CommandOutcome> {
        let articles = self.news.top_headlines(&self.state.filters).await?;

        let rows = articles.iter().map(|a| a.title.clone()).collect();
        self.surface.set_rows(rows);
        self.state.articles = articles;
        debug_assert_eq!(self.surface.row_count(), self.state.articles.len());

        info!(count = self.state.articles.len(), category = %self.state.filters.category, "headlines refreshed");
        Ok(CommandOutcome::Fetched(self.state.articles.len()))
    }

    fn select(&mut self, row: usize) -> CommandOutcome {
        if self.surface.select(row) {
            CommandOutcome::Selected(row)
        } else {
            CommandOutcome::NoSuchRow(row)
        }
    }

    /// Resolve an explicit row (selecting it) or the current selection.
    fn resolve(&mut self, row: Option<usize>) -> Result<&Article, CommandOutcome> {
        if let Some(row) = row {
            if !self.surface.select(row) {
                return Err(CommandOutcome::NoSuchRow(row));
            }
        }
        let selected = self.surface.selection().ok_or(CommandOutcome::NoSelection)?;
        self.state
            .articles
            .get(selected)
            .ok_or(CommandOutcome::NoSuchRow(selected))
    }

    fn open(&mut self, row: Option<usize>) -> Result<CommandOutcome> {
        let url = match self.resolve(row) {
            Ok(article) => article.url.clone(),
            Err(outcome) => {
                debug!(?outcome, "open skipped");
                return Ok(outcome);
            }
        };
        self.opener.open(&url)?;
        info!(%url, "article opened");
        Ok(CommandOutcome::Opened(url))
    }

    async fn bookmark(&mut self, row: Option<usize>) -> Result<CommandOutcome> {
        let (title, url) = match self.resolve(row) {
            Ok(article) => (article.title.clone(), article.url.clone()),
            Err(outcome) => {
                debug!(?outcome, "bookmark skipped");
                return Ok(outcome);
            }
        };
        let saved = self.bookmarks.add(&title, &url).await?;
        self.surface.notify("Saved", "Article bookmarked!");
        Ok(CommandOutcome::Bookmarked(saved))
    }

    /// Flip the theme and recolor every pane that accepts it.
    fn toggle_theme(&mut self) -> CommandOutcome {
        self.state.dark = !self.state.dark;
        let palette = palette_for(self.state.dark);

        let mut recolored = 0;
        for pane in self.surface.panes_mut() {
            match pane.recolor(palette) {
                Ok(()) => recolored += 1,
                Err(e) => debug!(pane = pane.name(), "recolor skipped: {}", e),
            }
        }
        self.surface.redraw();

        CommandOutcome::ThemeChanged {
            dark: self.state.dark,
            recolored,
        }
    }

    fn show_filters(&mut self) {
        let f = &self.state.filters;
        let source = if f.source.is_empty() { "any" } else { f.source.as_str() };
        let header = format!(
            "Category: {} | Source: {} | Search: {}",
            f.category, source, f.search
        );
        self.surface.set_header(header);
    }
}
