//! Interactive recipe list with scroll-driven paging.
//!
//! One foreground loop owns the filter, the paginator and the visible list.
//! Page fetches run on a blocking worker and report back over a channel;
//! store change notifications trigger recomposition.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use recipebox_core::filter::FilterState;
use recipebox_core::models::RecipeListItem;
use recipebox_core::pagination::{Paginator, Viewport};
use recipebox_core::pipeline::{self, PageOutcome};
use recipebox_core::service::{RecipeService, RecipeSource};

use super::helpers::{parse_tag_ids, recipe_detail_text, recipe_table};

const HELP: &str = "\
Commands:
  <enter> | more     scroll down (loads the next page at the end of the list)
  top                back to the first row
  /TEXT              search titles (case-insensitive)
  /                  clear search
  tag ID [ID...]     show recipes with any of these tags
  toggle ID          add or remove one tag
  clear              clear tag filter
  show ID            recipe details
  help               this text
  quit | q           leave";

pub(crate) struct FetchDone {
    offset: usize,
    result: Result<PageOutcome>,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub(crate) fn lock(svc: &Mutex<RecipeService>) -> MutexGuard<'_, RecipeService> {
    svc.lock().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) struct BrowseScreen {
    svc: Arc<Mutex<RecipeService>>,
    source: Arc<dyn RecipeSource>,
    filter: FilterState,
    paginator: Paginator,
    visible: Vec<RecipeListItem>,
    first_visible: usize,
    window: usize,
    inflight: Option<JoinHandle<bool>>,
    done_tx: mpsc::Sender<FetchDone>,
}

impl BrowseScreen {
    pub(crate) fn new(
        svc: Arc<Mutex<RecipeService>>,
        source: Arc<dyn RecipeSource>,
        filter: FilterState,
        window: usize,
    ) -> (Self, mpsc::Receiver<FetchDone>) {
        let (done_tx, done_rx) = mpsc::channel(4);
        let screen = Self {
            svc,
            source,
            filter,
            paginator: Paginator::new(),
            visible: Vec::new(),
            first_visible: 0,
            window: window.max(1),
            inflight: None,
            done_tx,
        };
        (screen, done_rx)
    }

    /// Show what is stored locally, then refresh the first page.
    pub(crate) fn open(&mut self, out: &mut impl Write) -> Result<()> {
        self.recompose()?;
        if let Some(req) = self.paginator.request_first_page() {
            self.spawn_fetch(req.offset);
        }
        self.render(out)
    }

    fn recompose(&mut self) -> Result<bool> {
        let visible = lock(&self.svc).visible_recipes(&self.filter)?;
        let changed = visible != self.visible;
        self.visible = visible;
        self.first_visible = self
            .first_visible
            .min(self.visible.len().saturating_sub(self.window));
        Ok(changed)
    }

    pub(crate) fn viewport(&self) -> Viewport {
        let total = self.visible.len();
        Viewport {
            first_visible: self.first_visible,
            visible_count: self.window.min(total - self.first_visible),
            total,
        }
    }

    fn spawn_fetch(&mut self, offset: usize) {
        let svc = Arc::clone(&self.svc);
        let source = Arc::clone(&self.source);
        let tx = self.done_tx.clone();
        self.inflight = Some(tokio::task::spawn_blocking(move || {
            let result = pipeline::fetch_page(source.as_ref(), offset)
                .and_then(|page| lock(&svc).commit_page(offset, &page));
            // Closed receiver: the screen is gone, drop the result
            tx.blocking_send(FetchDone { offset, result }).is_ok()
        }));
    }

    fn scroll(&mut self) {
        let req = if self.visible.is_empty() && !self.filter.blocks_fetch_more() {
            // Nothing stored yet: a failed first page is retried from offset 0
            self.paginator.request_first_page()
        } else {
            self.paginator.on_scroll(self.viewport(), &self.filter)
        };
        if let Some(req) = req {
            self.spawn_fetch(req.offset);
        }
    }

    fn scroll_down(&mut self, out: &mut impl Write) -> Result<()> {
        let max_first = self.visible.len().saturating_sub(self.window);
        self.first_visible = (self.first_visible + self.window).min(max_first);
        self.scroll();
        self.render(out)
    }

    pub(crate) fn on_fetch_done(&mut self, done: FetchDone, out: &mut impl Write) -> Result<()> {
        self.inflight = None;
        match done.result {
            Ok(outcome) => {
                self.recompose()?;
                self.paginator.on_page_loaded(outcome.total_after);
                self.render(out)
            }
            Err(e) => {
                self.paginator.on_page_failed();
                tracing::warn!(offset = done.offset, error = %format!("{e:#}"), "page fetch failed");
                writeln!(
                    out,
                    "Couldn't load more recipes: {e:#}. Scroll to the end again to retry."
                )?;
                Ok(())
            }
        }
    }

    pub(crate) fn on_store_changed(&mut self, out: &mut impl Write) -> Result<()> {
        if self.recompose()? {
            self.render(out)?;
        }
        Ok(())
    }

    fn reapply(&mut self, out: &mut impl Write) -> Result<()> {
        self.first_visible = 0;
        self.recompose()?;
        self.render(out)
    }

    pub(crate) fn handle_command(&mut self, line: &str, out: &mut impl Write) -> Result<Flow> {
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));

        match cmd {
            "" | "more" | "n" => self.scroll_down(out)?,
            "top" => {
                self.first_visible = 0;
                self.render(out)?;
            }
            "q" | "quit" | "exit" => return Ok(Flow::Quit),
            "help" | "?" => writeln!(out, "{HELP}")?,
            "tag" => match parse_tag_ids(rest) {
                Ok(ids) => {
                    self.filter.select_tags(ids);
                    self.reapply(out)?;
                }
                Err(e) => writeln!(out, "{e}")?,
            },
            "toggle" => match rest.trim().parse::<i64>() {
                Ok(id) => {
                    self.filter.toggle_tag(id);
                    self.reapply(out)?;
                }
                Err(_) => writeln!(out, "Usage: toggle ID")?,
            },
            "clear" => {
                self.filter.clear_tags();
                self.reapply(out)?;
            }
            "show" => match rest.trim().parse::<i64>() {
                Ok(id) => {
                    let detail = lock(&self.svc).recipe_detail(id);
                    match detail {
                        Ok(d) => write!(out, "{}", recipe_detail_text(&d))?,
                        Err(e) => writeln!(out, "{e:#}")?,
                    }
                    // Back on the list: filters and search stay as they were
                    self.recompose()?;
                    self.render(out)?;
                }
                Err(_) => writeln!(out, "Usage: show ID")?,
            },
            _ if cmd.starts_with('/') => {
                let text = line[1..].trim();
                self.filter.set_search(Some(text));
                self.reapply(out)?;
            }
            _ => writeln!(out, "Unknown command '{cmd}'. Type 'help' for commands.")?,
        }
        Ok(Flow::Continue)
    }

    fn status_line(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.filter.is_filter_active() {
            let ids: Vec<String> = self
                .filter
                .selected_tags()
                .iter()
                .map(i64::to_string)
                .collect();
            parts.push(format!("tags: {}", ids.join(",")));
        }
        if let Some(s) = self.filter.search() {
            parts.push(format!("search: \"{s}\""));
        }
        if self.paginator.is_loading() {
            parts.push("Loading more recipes...".to_string());
        } else if self.paginator.is_exhausted() {
            parts.push("No more recipes.".to_string());
        }
        (!parts.is_empty()).then(|| parts.join(" | "))
    }

    fn render(&self, out: &mut impl Write) -> Result<()> {
        if self.visible.is_empty() {
            writeln!(out, "No recipes match.")?;
        } else {
            let vp = self.viewport();
            let end = vp.first_visible + vp.visible_count;
            let rows = &self.visible[vp.first_visible..end];
            writeln!(out, "{}", recipe_table(rows, vp.first_visible))?;
            writeln!(out, "Showing {}-{end} of {}", vp.first_visible + 1, vp.total)?;
        }
        if let Some(status) = self.status_line() {
            writeln!(out, "{status}")?;
        }
        Ok(())
    }

    /// Drop any outstanding fetch. A commit already under way still lands
    /// atomically, but its completion is never delivered once the receiver
    /// is gone. Returns the aborted worker, which resolves to whether its
    /// completion was handed over.
    pub(crate) fn teardown(&mut self) -> Option<JoinHandle<bool>> {
        let handle = self.inflight.take()?;
        handle.abort();
        Some(handle)
    }
}

pub(crate) async fn cmd_browse(
    svc: Arc<Mutex<RecipeService>>,
    source: Arc<dyn RecipeSource>,
    filter: FilterState,
    window: usize,
) -> Result<()> {
    let mut changes = lock(&svc).subscribe();
    let (mut screen, mut done_rx) = BrowseScreen::new(svc, source, filter, window);
    let mut out = std::io::stdout();

    screen.open(&mut out)?;
    writeln!(out, "Type 'help' for commands.")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let result = loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break Ok(()),
                    Err(e) => break Err(e.into()),
                };
                match screen.handle_command(&line, &mut out) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Quit) => break Ok(()),
                    Err(e) => break Err(e),
                }
            }
            Some(done) = done_rx.recv() => {
                if let Err(e) = screen.on_fetch_done(done, &mut out) {
                    break Err(e);
                }
            }
            Ok(()) = changes.changed() => {
                if let Err(e) = screen.on_store_changed(&mut out) {
                    break Err(e);
                }
            }
        }
    };

    screen.teardown();
    drop(done_rx);
    result
}
