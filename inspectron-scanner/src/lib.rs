pub mod canonical;
pub mod engine;
pub mod error;
pub mod frontier;
pub mod html;
pub mod http;
pub mod page;
pub mod result;

pub use canonical::{CanonicalUrl, DEFAULT_SCHEME, canonicalize, resolve, resolve_on_site};
pub use engine::{CrawlEvent, EngineState, ProgressCallback, TraversalEngine};
pub use error::CrawlError;
pub use frontier::Frontier;
pub use html::{HtmlLinkExtractor, PaletteLabeler};
pub use http::HttpPageLoader;
pub use page::{ElementLabeler, LinkExtractor, LoadedPage, PageElement, PageLoader};
pub use result::{CrawlOutcome, CrawlStats, FailedPage, InteractableElement};
