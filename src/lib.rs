pub mod api;
pub mod client;
pub mod config;
pub mod crud;
pub mod form;
pub mod models;
pub mod proxy;
pub mod services;
pub mod session;

use config::Config;

pub struct AppState {
    pub config: Config,
    /// Outbound client for the upstream API. Redirects are never
    /// followed; upstream 3xx responses pass through to the browser.
    pub upstream: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let upstream = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { config, upstream })
    }
}
