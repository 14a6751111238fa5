#[cfg(feature = "browser")]
pub mod browser;
pub mod credentials;
pub mod renderer;
pub mod sites;

#[cfg(feature = "browser")]
pub use browser::BrowserRenderClient;
pub use credentials::FileCredentialProvider;
pub use renderer::HttpRenderClient;
pub use sites::{CapterraExtractor, TrustpilotExtractor};
