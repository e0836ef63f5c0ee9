//! Session-aware request gateway: bearer and CSRF attachment, single-flight token refresh,
//! deduplicated sign-out, and one-shot CSRF recovery over any async HTTP transport.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod csrf;
pub mod error;
pub mod flows;
pub mod gateway;
pub mod http;
pub mod obs;
pub mod request;
pub mod session;

mod _prelude {
	pub use std::{
		borrow::Cow,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::OffsetDateTime;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(all(test, feature = "reqwest"))] use {color_eyre as _, httpmock as _};
