//! Runtime capability probes
//!
//! Capabilities are probed when an [`Environment`] is built, never inferred
//! from build flags, so one compiled core behaves correctly whichever host it
//! is embedded in.

use crate::surface::{GraphicsGlobals, HostDocument};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Browser,
    Server,
    Unknown,
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Runtime::Browser => "browser",
            Runtime::Server => "server",
            Runtime::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[derive(Clone)]
pub struct Environment {
    host_document: Option<Arc<dyn HostDocument>>,
    server_process: bool,
    globals: Arc<GraphicsGlobals>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("runtime", &self.runtime())
            .field("globals", &self.globals)
            .finish()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::detect()
    }
}

impl Environment {
    /// Probes the current process
    ///
    /// A process that can describe its own executable counts as a server
    /// process; sandboxed workers cannot.
    pub fn detect() -> Self {
        Self {
            host_document: None,
            server_process: std::env::current_exe().is_ok(),
            globals: Arc::new(GraphicsGlobals::new()),
        }
    }

    /// An environment where every probe fails
    pub fn unknown() -> Self {
        Self {
            host_document: None,
            server_process: false,
            globals: Arc::new(GraphicsGlobals::new()),
        }
    }

    /// Registers a window-like host document. Constructors the host offers
    /// are installed unless already present.
    pub fn with_host_document(mut self, document: Arc<dyn HostDocument>) -> Self {
        self.globals.inject_missing(&document.constructors());
        self.host_document = Some(document);
        self
    }

    pub fn is_browser_like(&self) -> bool {
        self.host_document.is_some()
    }

    pub fn is_server_process(&self) -> bool {
        self.server_process
    }

    /// Browser wins when both probes succeed
    pub fn runtime(&self) -> Runtime {
        if self.is_browser_like() {
            Runtime::Browser
        } else if self.is_server_process() {
            Runtime::Server
        } else {
            Runtime::Unknown
        }
    }

    pub fn host_document(&self) -> Option<Arc<dyn HostDocument>> {
        self.host_document.clone()
    }

    pub fn globals(&self) -> Arc<GraphicsGlobals> {
        Arc::clone(&self.globals)
    }
}
