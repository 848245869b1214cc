use crate::core::{ExtractError, ResolvedMedia, Result};
use crate::extractors::{
    GlomexChannelExtractor, GlomexEmbedExtractor, GlomexExtractor, GlomexMovieExtractor,
    GlomexPersonExtractor, GlomexPlaylistExtractor,
};
use async_trait::async_trait;
use tracing::debug;

#[async_trait]
pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn suitable(&self, url: &str) -> bool;
    async fn extract(&self, url: &str) -> Result<ResolvedMedia>;
}

/// Dispatches URLs to the first suitable extractor. Extractors are consulted
/// in registration order, so more specific patterns must be registered before
/// generic ones.
pub struct ExtractorEngine {
    pub extractors: Vec<Box<dyn Extractor>>,
}

impl ExtractorEngine {
    pub fn new() -> Self {
        Self {
            extractors: Vec::new(),
        }
    }

    /// Engine with the whole glomex family registered, most specific first:
    /// the query-parameter playlist extractor outranks the listing pages,
    /// which outrank the embed player and the plain video page.
    pub fn with_builtin_extractors() -> Self {
        let mut engine = Self::new();
        engine.register_extractor(Box::new(GlomexPlaylistExtractor::new()));
        engine.register_extractor(Box::new(GlomexChannelExtractor::new()));
        engine.register_extractor(Box::new(GlomexMovieExtractor::new()));
        engine.register_extractor(Box::new(GlomexPersonExtractor::new()));
        engine.register_extractor(Box::new(GlomexEmbedExtractor::new()));
        engine.register_extractor(Box::new(GlomexExtractor::new()));
        engine
    }

    pub fn register_extractor(&mut self, extractor: Box<dyn Extractor>) {
        self.extractors.push(extractor);
    }

    pub async fn extract(&self, url: &str) -> Result<ResolvedMedia> {
        for extractor in &self.extractors {
            if extractor.suitable(url) {
                debug!("dispatching {} to {}", url, extractor.name());
                return extractor.extract(url).await;
            }
        }

        Err(ExtractError::UnsupportedUrl(url.to_owned()))
    }
}
