//! Relay session state and the render boundary.
//!
//! A session owns the current inputs and derived settings. Every input
//! change runs a complete recompute and hands a fresh [`TccView`] to the
//! renderer before the next input is accepted.

mod relay_session;

pub use relay_session::{RelayInput, RelaySession};

use std::io::Write;

use crate::error::{RelayError, Result};
use crate::tcc::TccView;

/// Consumer of recomputed views (chart, terminal panel, test recorder).
pub trait TccRenderer {
    fn render(&mut self, view: &TccView) -> Result<()>;
}

impl<F> TccRenderer for F
where
    F: FnMut(&TccView) -> Result<()>,
{
    fn render(&mut self, view: &TccView) -> Result<()> {
        self(view)
    }
}

/// Fans one view out to several renderers, in order.
#[derive(Default)]
pub struct RenderChain<'a> {
    renderers: Vec<&'a mut dyn TccRenderer>,
}

impl<'a> RenderChain<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, renderer: &'a mut dyn TccRenderer) -> Self {
        self.renderers.push(renderer);
        self
    }
}

impl TccRenderer for RenderChain<'_> {
    fn render(&mut self, view: &TccView) -> Result<()> {
        for renderer in self.renderers.iter_mut() {
            renderer.render(view)?;
        }
        Ok(())
    }
}

/// Writes each view as a text panel.
#[derive(Debug)]
pub struct TextRenderer<W: Write> {
    out: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> TccRenderer for TextRenderer<W> {
    fn render(&mut self, view: &TccView) -> Result<()> {
        write!(self.out, "{}", view)
            .and_then(|_| self.out.flush())
            .map_err(|e| RelayError::Render(format!("Failed to write view: {}", e)))
    }
}
