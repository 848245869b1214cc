pub mod glomex;
pub mod glomex_listings;

pub use glomex::{GlomexEmbedExtractor, GlomexExtractor};
pub use glomex_listings::{
    GlomexChannelExtractor, GlomexMovieExtractor, GlomexPersonExtractor, GlomexPlaylistExtractor,
};
