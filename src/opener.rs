use anyhow::Result;

/// URL scheme registered by the Obsidian desktop app.
pub const OBSIDIAN_SCHEME: &str = "obsidian";

/// Build the deep link that opens `path` inside `vault`.
pub fn obsidian_url(vault: &str, path: &str) -> String {
    format!(
        "{OBSIDIAN_SCHEME}://open?vault={}&file={}",
        urlencoding::encode(vault),
        urlencoding::encode(path)
    )
}

/// Hands a URL to whatever is registered for its scheme.
pub trait NoteOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<()>;
}

/// Opens URLs through the OS protocol handler.
/// Works on Linux (xdg-open), Windows (ShellExecute), macOS (open).
/// Fire-and-forget: the handler is detached and never awaited.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl NoteOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<()> {
        open::that_detached(url)?;
        Ok(())
    }
}
