pub mod core;
pub mod extractors;
pub mod utils;

pub use crate::core::{
    ExtractError, Extractor, ExtractorEngine, MediaFormat, MediaKind, MediaReference,
    PlaylistResult, ResolvedMedia, Result,
};
pub use crate::extractors::{
    GlomexChannelExtractor, GlomexEmbedExtractor, GlomexExtractor, GlomexMovieExtractor,
    GlomexPersonExtractor, GlomexPlaylistExtractor,
};
