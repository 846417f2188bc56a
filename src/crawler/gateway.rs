//! Gateway templates and their rotator
//!
//! Every fetch goes through one of an ordered list of gateway templates.
//! The rotator points at the template to use next and moves on, wrapping,
//! each time an attempt fails. Successful attempts leave it where it is.

use crate::config::{EnvelopeKind, GatewayEntry};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Placeholder replaced by the percent-encoded target URL
const ENCODED_PLACEHOLDER: &str = "{url}";

/// Placeholder replaced by the target URL verbatim
const RAW_PLACEHOLDER: &str = "{raw}";

/// Maps a raw target URL to the URL actually requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayTemplate {
    template: String,
    envelope: EnvelopeKind,
}

impl GatewayTemplate {
    pub fn new(template: impl Into<String>, envelope: EnvelopeKind) -> Self {
        Self {
            template: template.into(),
            envelope,
        }
    }

    /// A template that requests the target directly
    pub fn direct() -> Self {
        Self::new(RAW_PLACEHOLDER, EnvelopeKind::Raw)
    }

    /// Builds the request URL for `target`
    pub fn apply(&self, target: &str) -> String {
        self.template
            .replace(ENCODED_PLACEHOLDER, &urlencoding::encode(target))
            .replace(RAW_PLACEHOLDER, target)
    }

    pub fn envelope(&self) -> EnvelopeKind {
        self.envelope
    }
}

impl From<&GatewayEntry> for GatewayTemplate {
    fn from(entry: &GatewayEntry) -> Self {
        Self::new(entry.template.clone(), entry.envelope)
    }
}

/// Ordered, wrapping list of gateway templates
#[derive(Debug)]
pub struct GatewayRotator {
    templates: Vec<GatewayTemplate>,
    index: AtomicUsize,
}

impl GatewayRotator {
    /// Creates a rotator starting at the first template
    ///
    /// Returns `None` for an empty list.
    pub fn new(templates: Vec<GatewayTemplate>) -> Option<Self> {
        if templates.is_empty() {
            return None;
        }
        Some(Self {
            templates,
            index: AtomicUsize::new(0),
        })
    }

    pub fn from_entries(entries: &[GatewayEntry]) -> Option<Self> {
        Self::new(entries.iter().map(GatewayTemplate::from).collect())
    }

    /// Position of the current template
    pub fn index(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// The template the next request will use
    pub fn current(&self) -> &GatewayTemplate {
        let index = self.index() % self.templates.len();
        &self.templates[index]
    }

    /// Diagnostic label of the current template, e.g. `GW-1`
    pub fn name(&self) -> String {
        format!("GW-{}", self.index() + 1)
    }

    /// Moves to the next template, wrapping after the last one
    ///
    /// Returns the new index.
    pub fn advance(&self) -> usize {
        let len = self.templates.len();
        let previous = self
            .index
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| Some((i + 1) % len))
            .unwrap_or_else(|i| i);
        (previous + 1) % len
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
