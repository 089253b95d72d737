use std::sync::Arc;

use anyhow::Context;
use specsheet_core::config::{Config, StoreBackend};
use specsheet_core::drive::{DriveClient, DriveUploader, FileStorage};
use specsheet_core::identity::{FirebaseVerifier, IdentityVerifier};
use specsheet_core::index::{AlgoliaIndex, LocalIndex, SearchIndex};
use specsheet_core::mail::{GmailMailer, Mailer, NotificationGateway};
use specsheet_core::oauth::{GoogleOAuth, OAuthProvider};
use specsheet_core::records::RecordGateway;
use specsheet_core::search::SearchGateway;
use specsheet_core::store::{MemoryStore, RecordStore, RedbStore};
use specsheet_core::sync::IndexSync;
use tracing::info;

use crate::generator::{agent_from_settings, SpecGenerator};

/// Concrete implementations behind every provider seam.
pub struct Providers {
    pub identity: Arc<dyn IdentityVerifier>,
    pub generator: Arc<dyn SpecGenerator>,
    pub store: Arc<dyn RecordStore>,
    pub index: Arc<dyn SearchIndex>,
    pub mailer: Arc<dyn Mailer>,
    pub oauth: Option<Arc<dyn OAuthProvider>>,
    pub storage: Arc<dyn FileStorage>,
}

impl Providers {
    /// Wire the production providers described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store: Arc<dyn RecordStore> = match config.store.backend {
            StoreBackend::Memory => Arc::new(MemoryStore::new()),
            StoreBackend::Redb => {
                let path = config.store.redb_path()?;
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("cannot create {}", parent.display()))?;
                }
                info!(path = %path.display(), "opening record store");
                Arc::new(RedbStore::open(&path)?)
            }
        };

        let index: Arc<dyn SearchIndex> = match (&config.search.app_id, &config.search.api_key) {
            (Some(app_id), Some(api_key)) if config.search.algolia_enabled() => {
                info!(index = %config.search.index_name, "using hosted search index");
                Arc::new(AlgoliaIndex::new(
                    app_id,
                    api_key,
                    &config.search.index_name,
                ))
            }
            _ => {
                info!("search credentials not set, using in-process index");
                Arc::new(LocalIndex::new()?)
            }
        };

        let oauth: Option<Arc<dyn OAuthProvider>> =
            match (&config.email.client_id, &config.email.client_secret) {
                (Some(id), Some(secret)) if config.email.oauth_enabled() => {
                    let public_url = config.server.public_url();
                    Some(Arc::new(GoogleOAuth::new(
                        id,
                        secret,
                        config.email.redirect_uri(&public_url),
                        config.drive.redirect_uri(&public_url),
                    )))
                }
                _ => None,
            };

        Ok(Self {
            identity: Arc::new(FirebaseVerifier::new(config.identity.api_key.clone())),
            generator: Arc::new(agent_from_settings(&config.generation)),
            store,
            index,
            mailer: Arc::new(GmailMailer::new()),
            oauth,
            storage: Arc::new(DriveClient::new()),
        })
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityVerifier>,
    pub generator: Arc<dyn SpecGenerator>,
    pub records: Arc<RecordGateway>,
    pub search: Arc<SearchGateway>,
    pub notifier: Arc<NotificationGateway>,
    pub oauth: Option<Arc<dyn OAuthProvider>>,
    pub drive: Arc<DriveUploader>,
}

impl AppState {
    pub fn new(config: Config, providers: Providers) -> Self {
        let records = Arc::new(RecordGateway::new(
            providers.store.clone(),
            IndexSync::new(providers.index.clone()),
        ));
        let search = Arc::new(
            SearchGateway::new(providers.index, records.clone())
                .with_hits_per_page(config.search.hits_per_page),
        );
        let drive = Arc::new(DriveUploader::new(
            providers.storage,
            providers.store,
            config.drive.folder_name.clone(),
            config.drive.public,
        ));
        Self {
            identity: providers.identity,
            generator: providers.generator,
            records,
            search,
            notifier: Arc::new(NotificationGateway::new(providers.mailer)),
            oauth: providers.oauth,
            drive,
            config: Arc::new(config),
        }
    }

    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let providers = Providers::from_config(&config)?;
        Ok(Self::new(config, providers))
    }

    /// Cookies get the `Secure` attribute when served over https.
    pub fn secure_cookies(&self) -> bool {
        self.config.server.public_url().starts_with("https://")
    }
}
