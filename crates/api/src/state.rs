use std::sync::Arc;

use querygraph_core::Renderer;

use crate::config::AppConfig;

/// Shared application state, passed to all handlers via Axum's `State` extractor.
/// Wrapped in `Arc` so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    config: AppConfig,
    renderer: Renderer,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let mut renderer = Renderer::new(config.d2_bin.clone());
        if let Some(layout) = &config.d2_layout {
            renderer = renderer.with_layout(layout.clone());
        }
        if let Some(theme) = config.d2_theme {
            renderer = renderer.with_theme(theme);
        }
        Self {
            inner: Arc::new(InnerState { config, renderer }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn renderer(&self) -> &Renderer {
        &self.inner.renderer
    }
}
