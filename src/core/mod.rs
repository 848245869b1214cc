pub mod error;
pub mod extractor;
pub mod metadata;

pub use error::{ExtractError, Result};
pub use extractor::{Extractor, ExtractorEngine};
pub use metadata::{MediaFormat, MediaKind, MediaReference, PlaylistResult, ResolvedMedia};
