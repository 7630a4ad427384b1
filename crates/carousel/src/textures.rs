use std::collections::HashMap;

use crate::engine::{AssetEvent, EngineError, RenderEngine, TextureInfo};
use crate::ledger::ResourceLedger;
use crate::types::TextureId;

/// Immediate answer to [`TextureCache::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Already resident; one more reference was taken.
    Ready(TextureId),
    /// Resolves through a later [`TextureCache::complete`].
    Pending,
}

/// What a finished asset request turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum TextureOutcome {
    Ready {
        url: String,
        texture: TextureInfo,
        /// References taken on behalf of callers that were waiting.
        references: usize,
    },
    Failed {
        url: String,
        error: EngineError,
    },
    /// Nobody wanted the texture any more; it was destroyed on arrival.
    Discarded { url: String },
}

/// Deduplicates texture loads by URL.
///
/// While a load is in flight the cache counts waiters. Once it lands, the
/// [`ResourceLedger`] owns the reference count.
#[derive(Debug, Default)]
pub struct TextureCache {
    pending: HashMap<String, usize>,
    failures: HashMap<String, EngineError>,
    requests: usize,
}

impl TextureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load<C>(
        &mut self,
        render: &mut dyn RenderEngine,
        ledger: &mut ResourceLedger<C>,
        url: &str,
    ) -> Result<LoadStatus, EngineError> {
        if let Some(texture) = ledger.retain_texture(url) {
            return Ok(LoadStatus::Ready(texture));
        }
        if ledger.is_unmounting() {
            return Err(EngineError::Unavailable(format!(
                "refusing to load '{url}' while unmounting"
            )));
        }
        if let Some(waiters) = self.pending.get_mut(url) {
            *waiters += 1;
            return Ok(LoadStatus::Pending);
        }
        render.request_asset(url)?;
        self.failures.remove(url);
        self.pending.insert(url.to_string(), 1);
        self.requests += 1;
        tracing::debug!(url, "texture requested");
        Ok(LoadStatus::Pending)
    }

    /// Settles an asset event coming out of [`RenderEngine::poll_assets`].
    pub fn complete<C>(
        &mut self,
        render: &mut dyn RenderEngine,
        ledger: &mut ResourceLedger<C>,
        event: AssetEvent,
    ) -> TextureOutcome {
        match event {
            AssetEvent::Loaded { url, texture } => {
                let waiters = self.pending.remove(&url).unwrap_or(0);
                if waiters == 0 {
                    if let Err(error) = render.destroy_texture(texture.id) {
                        tracing::warn!(url = %url, error = %error, "failed to destroy unwanted texture");
                    }
                    return TextureOutcome::Discarded { url };
                }
                if ledger.track_texture(render, &url, texture.id).is_none() {
                    return TextureOutcome::Discarded { url };
                }
                for _ in 1..waiters {
                    ledger.retain_texture(&url);
                }
                TextureOutcome::Ready {
                    url,
                    texture,
                    references: waiters,
                }
            }
            AssetEvent::Failed { url, error } => {
                self.pending.remove(&url);
                tracing::warn!(url = %url, error = %error, "texture failed to load");
                self.failures.insert(url.clone(), error.clone());
                TextureOutcome::Failed { url, error }
            }
        }
    }

    /// Drops one reference to `url`, or every reference when `force` is set.
    /// Returns `true` when the texture was destroyed.
    pub fn release<C>(
        &mut self,
        render: &mut dyn RenderEngine,
        ledger: &mut ResourceLedger<C>,
        url: &str,
        force: bool,
    ) -> bool {
        if let Some(waiters) = self.pending.get_mut(url) {
            // At zero the entry stays so the late result is destroyed when it lands.
            *waiters = if force { 0 } else { waiters.saturating_sub(1) };
            return false;
        }
        if force {
            ledger.force_release_texture(render, url)
        } else {
            ledger.release_texture(render, url)
        }
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.pending.get(url).is_some_and(|waiters| *waiters > 0)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.values().filter(|waiters| **waiters > 0).count()
    }

    pub fn failure(&self, url: &str) -> Option<&EngineError> {
        self.failures.get(url)
    }

    /// Engine requests issued so far.
    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Forgets every waiter; results still in flight are destroyed on arrival.
    pub fn abandon_pending(&mut self) {
        for waiters in self.pending.values_mut() {
            *waiters = 0;
        }
    }
}
