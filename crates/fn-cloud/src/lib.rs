//! Remote side of the fn CLI: the functions API, the create-or-update
//! reconciler on top of it, and credential providers that sign requests.

pub mod api;
pub mod client;
pub mod error;
pub mod executor;
pub mod http;
pub mod inspect;
pub mod models;
pub mod provider;
pub mod signer;

pub use api::{FnApi, InvokeRequest, InvokeResponse};
pub use client::{AppChange, AppContents, FnChange, FnClient, Upsert};
pub use error::{Error, Result, ToolError};
pub use executor::{RealExecutor, SignerExecutor};
pub use http::HttpApi;
pub use models::{App, Function, ListQuery, Page, Tagged, Trigger};
pub use provider::{NoPassphrase, PassphraseSource, Provider, ProviderConfig, ProviderKind};
pub use signer::{BearerToken, HttpSignature, RequestSigner};
