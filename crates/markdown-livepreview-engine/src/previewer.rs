//! A live preview session: one synchronous pass per edit, then diagram
//! typesetting in the background.
//!
//! Everything runs on one thread. Diagram tasks are spawned with
//! [`tokio::task::spawn_local`], so [`Previewer::on_change`] must be called
//! from inside a [`tokio::task::LocalSet`]. A newer edit does not cancel the
//! tasks of an older one; their results are dropped when they arrive because
//! the surface has moved on to a newer generation.

use crate::pipeline::{PassState, Pipeline, RenderContext, RenderedDocument};
use crate::surface::{Resolution, Surface};
use crate::typeset::{DiagramTheme, DiagramTypesetter};
use std::cell::{Ref, RefCell};
use std::rc::Rc;
use tokio::task::JoinHandle;

/// Called with the surface after every commit and every applied diagram.
pub type Listener = Rc<dyn Fn(&Surface)>;

/// What one call to [`Previewer::on_change`] started.
#[derive(Debug)]
pub struct PassOutcome {
    pub generation: u64,
    pub document: RenderedDocument,
    /// One task per diagram. Awaiting them is optional.
    pub tasks: Vec<JoinHandle<()>>,
}

pub struct Previewer {
    pipeline: Pipeline,
    surface: Rc<RefCell<Surface>>,
    generation: u64,
    typesetter: Option<Rc<dyn DiagramTypesetter>>,
    listener: Option<Listener>,
}

impl Previewer {
    pub fn new(cx: RenderContext) -> Self {
        Self {
            pipeline: Pipeline::new(cx),
            surface: Rc::new(RefCell::new(Surface::new())),
            generation: 0,
            typesetter: None,
            listener: None,
        }
    }

    pub fn with_typesetter(mut self, typesetter: impl DiagramTypesetter + 'static) -> Self {
        self.typesetter = Some(Rc::new(typesetter));
        self
    }

    pub fn with_listener(mut self, listener: impl Fn(&Surface) + 'static) -> Self {
        self.listener = Some(Rc::new(listener));
        self
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn surface(&self) -> Ref<'_, Surface> {
        self.surface.borrow()
    }

    /// Current surface content.
    pub fn html(&self) -> String {
        self.surface.borrow().html()
    }

    pub fn state(&self) -> PassState {
        if self.typesetter.is_some() && self.surface.borrow().has_pending() {
            PassState::TypesettingDiagrams
        } else {
            PassState::Idle
        }
    }

    fn notify(&self) {
        if let Some(listener) = &self.listener {
            listener(&*self.surface.borrow());
        }
    }

    /// Render `source`, commit it, and start typesetting its diagrams.
    pub fn on_change(&mut self, source: &str) -> PassOutcome {
        self.generation += 1;
        let generation = self.generation;

        let document = self.pipeline.render(source);
        self.surface.borrow_mut().commit(generation, &document.html);
        log::trace!("pass {generation} state -> {:?}", PassState::Committed);
        self.notify();

        let tasks = match &self.typesetter {
            Some(typesetter) => self.spawn_diagrams(generation, Rc::clone(typesetter)),
            None => Vec::new(),
        };
        if !tasks.is_empty() {
            log::trace!(
                "pass {generation} state -> {:?} ({} diagrams)",
                PassState::TypesettingDiagrams,
                tasks.len()
            );
        }

        PassOutcome {
            generation,
            document,
            tasks,
        }
    }

    fn spawn_diagrams(
        &self,
        generation: u64,
        typesetter: Rc<dyn DiagramTypesetter>,
    ) -> Vec<JoinHandle<()>> {
        let pending = self.surface.borrow().pending_diagrams();
        let theme = DiagramTheme::from_dark_mode(self.pipeline.context().options.dark_mode);
        pending
            .into_iter()
            .map(|node| {
                let surface = Rc::clone(&self.surface);
                let typesetter = Rc::clone(&typesetter);
                let listener = self.listener.clone();
                tokio::task::spawn_local(async move {
                    let outcome = typesetter.typeset(&node.id, &node.source_text, theme).await;
                    let failure = outcome.as_ref().err().map(ToString::to_string);

                    let resolution = surface.borrow_mut().resolve(generation, &node.id, outcome);
                    match resolution {
                        Resolution::Applied => {
                            if let Some(message) = failure {
                                log::warn!("diagram {} failed: {message}", node.id);
                            }
                            if let Some(listener) = &listener {
                                listener(&*surface.borrow());
                            }
                        }
                        Resolution::Stale => {
                            log::debug!(
                                "discarding stale result for diagram {} from pass {generation}",
                                node.id
                            );
                        }
                    }
                })
            })
            .collect()
    }
}
