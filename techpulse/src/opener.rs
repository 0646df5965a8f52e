use anyhow::{Context, Result};

/// Hands a URL to something that can show it.
pub trait UrlOpener {
    fn open(&self, url: &str) -> Result<()>;
}

/// Opens URLs with the operating system's default browser.
pub struct SystemOpener;

impl UrlOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<()> {
        webbrowser::open(url).with_context(|| format!("failed to open {} in browser", url))
    }
}
