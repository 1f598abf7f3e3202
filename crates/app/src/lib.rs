//! Astro Dozi client library.
//!
//! Everything between the zodiac types in `astro-dozi-core` and a front end:
//!
//! - [`session`] - who is using the app, their coins, premium flag and sign
//! - [`resolver`] - tiered horoscope and feature resolution with write-back
//! - [`ledger`] - the coin gate in front of paid features
//! - [`view`] - payloads projected into view models and HTML
//! - [`app`] - the [`AstroApp`] facade tying them together
//!
//! Collaborators sit behind traits: [`store::DocumentStore`],
//! [`local::LocalStore`], [`identity::IdentityProvider`] and
//! [`gemini::TextGenerator`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod error;
pub mod gemini;
pub mod identity;
pub mod ledger;
pub mod local;
pub mod notice;
pub mod prompts;
pub mod resolver;
pub mod session;
pub mod store;
pub mod view;

pub use app::{AstroApp, Collaborators, FeatureFlow, Rendered};
pub use config::AppConfig;
pub use error::{AppError, Result};
pub use ledger::Gate;
pub use notice::Notice;
pub use view::Presentation;
