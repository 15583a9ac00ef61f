pub mod compiler;
pub mod deploy;
pub mod extractor;
pub mod ocr;
pub mod scraper;

pub use compiler::{CompileReport, CompilerAdapter, NullCompiler};
pub use deploy::{DeployAdapter, NullDeployer};
pub use extractor::{ExtractReport, ExtractorAdapter, NullExtractor};
pub use ocr::{FakeOcrBackend, OcrBackend, OcrBackendRegistry};
pub use scraper::{FetchOptions, FetchedDocument, FetchedDocuments, NullScraper, ScraperAdapter};
